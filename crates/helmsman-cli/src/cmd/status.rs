use crate::output::{print_json, print_table};
use anyhow::Context;
use helmsman_core::config::Config;
use helmsman_core::probe::{HttpProber, Prober};
use helmsman_core::process::Role;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct RoleStatus {
    role: Role,
    url: String,
    reachable: bool,
}

/// Single-shot probe of every role. Down services are reported, not errors.
pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let timeout = config.supervisor.policy().probe_timeout;

    let targets = [
        (
            Role::ActionService,
            config.service_url(config.action.port, &config.action.ready_path),
        ),
        (
            Role::DialogueService,
            config.service_url(config.dialogue.port, &config.dialogue.ready_path),
        ),
        (Role::UiService, config.service_url(config.ui.port, "/")),
    ];

    let prober = HttpProber::default();
    let statuses: Vec<RoleStatus> = super::runtime()?.block_on(async {
        let mut out = Vec::with_capacity(targets.len());
        for (role, url) in targets {
            let reachable = prober.is_healthy(&url, timeout).await;
            out.push(RoleStatus {
                role,
                url,
                reachable,
            });
        }
        out
    });

    if json {
        print_json(&statuses)?;
    } else {
        let rows: Vec<Vec<String>> = statuses
            .iter()
            .map(|s| {
                vec![
                    s.role.to_string(),
                    if s.reachable { "up" } else { "down" }.to_string(),
                    s.url.clone(),
                ]
            })
            .collect();
        print_table(&["ROLE", "STATE", "URL"], &rows);
    }
    Ok(())
}
