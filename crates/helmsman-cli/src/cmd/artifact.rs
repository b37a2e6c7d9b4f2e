use crate::output::print_json;
use anyhow::Context;
use helmsman_core::artifact::ArtifactResolver;
use helmsman_core::config::Config;
use std::path::Path;

pub fn run(root: &Path, no_build: bool, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let resolver = ArtifactResolver::from_config(root, &config.models);

    let artifact = if no_build {
        resolver.latest()?
    } else {
        Some(super::runtime()?.block_on(resolver.resolve())?)
    };

    let Some(artifact) = artifact else {
        anyhow::bail!(
            "no *{} files in {}",
            config.models.suffix,
            config.models_dir(root).display()
        );
    };

    if json {
        print_json(&artifact)?;
    } else {
        println!("{}", artifact.path.display());
        println!(
            "modified: {}",
            artifact.modified.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}
