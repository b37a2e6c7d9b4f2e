use helmsman_core::paths::CONFIG_FILE;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `HELMSMAN_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from cwd looking for `helmsman.yaml`
/// 3. Walk upward from cwd looking for `.git/`
/// 4. Fall back to cwd
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_root(&cwd)
}

fn find_root(start: &Path) -> PathBuf {
    let has_config = |d: &Path| d.join(CONFIG_FILE).is_file();
    let has_git = |d: &Path| d.join(".git").is_dir();
    start
        .ancestors()
        .find(|d| has_config(d))
        .or_else(|| start.ancestors().find(|d| has_git(d)))
        .unwrap_or(start)
        .to_path_buf()
}
