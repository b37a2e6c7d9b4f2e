use anyhow::Context;
use helmsman_core::artifact::ArtifactResolver;
use helmsman_core::config::{Config, WarnLevel};
use helmsman_core::launcher::{ServiceLaunchers, SystemBrowser};
use helmsman_core::probe::{HttpProber, Prober};
use helmsman_core::supervisor::{orchestrate, Supervisor};
use std::path::Path;
use std::sync::Arc;

pub fn run(root: &Path, no_open: bool) -> anyhow::Result<()> {
    let mut config = Config::load(root).context("failed to load config")?;
    if no_open {
        config.ui.open_browser = false;
    }

    let warnings = config.validate();
    for w in &warnings {
        match w.level {
            WarnLevel::Warning => tracing::warn!("{}", w.message),
            WarnLevel::Error => tracing::error!("{}", w.message),
        }
    }
    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("refusing to start: fix the config errors above (helmsman config validate)");
    }

    let prober: Arc<dyn Prober> = Arc::new(HttpProber::new(config.supervisor.ready_poll()));
    let launchers =
        ServiceLaunchers::from_config(root, &config, prober.clone(), Box::new(SystemBrowser));
    let resolver = ArtifactResolver::from_config(root, &config.models);
    let mut supervisor = Supervisor::new(launchers, prober, config.supervisor.policy());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
        };
        orchestrate(&resolver, &mut supervisor, interrupt).await
    })?;

    println!("All services stopped.");
    Ok(())
}
