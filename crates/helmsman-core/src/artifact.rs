//! Model artifact selection.
//!
//! The dialogue service always loads the fixed-name "current" artifact when
//! one exists. [`ArtifactResolver::resolve`] keeps that file in step with the
//! newest build output and, when the models directory is empty, runs the
//! build step first.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::{CommandSpec, ModelsConfig};
use crate::error::{HelmsmanError, Result};
use crate::io;

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

impl Artifact {
    fn from_path(path: PathBuf) -> std::io::Result<Self> {
        let modified = std::fs::metadata(&path)?.modified()?;
        Ok(Self {
            path,
            modified: DateTime::<Utc>::from(modified),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// BuildStep
// ---------------------------------------------------------------------------

/// Produces a fresh artifact in the models directory. Errors are reported as
/// [`HelmsmanError::BuildFailure`].
#[async_trait]
pub trait BuildStep: Send + Sync {
    async fn build(&self) -> Result<()>;
}

/// Runs a configured command (by default `python -m rasa train`) and waits
/// for it to finish.
#[derive(Debug, Clone)]
pub struct CommandBuild {
    spec: CommandSpec,
    cwd: PathBuf,
}

impl CommandBuild {
    pub fn new(spec: CommandSpec, cwd: impl Into<PathBuf>) -> Self {
        Self {
            spec,
            cwd: cwd.into(),
        }
    }
}

#[async_trait]
impl BuildStep for CommandBuild {
    async fn build(&self) -> Result<()> {
        info!(
            program = %self.spec.program,
            args = ?self.spec.args,
            "no model found, building one"
        );
        let status = Command::new(&self.spec.program)
            .args(&self.spec.args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| {
                HelmsmanError::BuildFailure(format!(
                    "failed to run '{}': {e}",
                    self.spec.program
                ))
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(HelmsmanError::BuildFailure(match status.code() {
                Some(code) => format!("'{}' exited with code {code}", self.spec.program),
                None => format!("'{}' was terminated by a signal", self.spec.program),
            }))
        }
    }
}

// ---------------------------------------------------------------------------
// ArtifactResolver
// ---------------------------------------------------------------------------

pub struct ArtifactResolver<B> {
    dir: PathBuf,
    suffix: String,
    current: String,
    build: B,
}

impl ArtifactResolver<CommandBuild> {
    /// Resolver wired to the configured build command, run from `root`.
    pub fn from_config(root: &Path, models: &ModelsConfig) -> Self {
        ArtifactResolver::new(
            crate::paths::resolve(root, &models.dir),
            models.suffix.clone(),
            models.current.clone(),
            CommandBuild::new(models.build.clone(), root),
        )
    }
}

impl<B: BuildStep> ArtifactResolver<B> {
    pub fn new(
        dir: impl Into<PathBuf>,
        suffix: impl Into<String>,
        current: impl Into<String>,
        build: B,
    ) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
            current: current.into(),
            build,
        }
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join(&self.current)
    }

    /// Newest candidate by modification time, without building or syncing.
    pub fn latest(&self) -> Result<Option<Artifact>> {
        if !self.dir.exists() {
            return Ok(None);
        }
        let mut best: Option<Artifact> = None;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if !name.to_string_lossy().ends_with(&self.suffix) {
                continue;
            }
            // A file vanishing mid-scan is not our problem.
            let Ok(candidate) = Artifact::from_path(entry.path()) else {
                continue;
            };
            if best
                .as_ref()
                .map_or(true, |b| candidate.modified > b.modified)
            {
                best = Some(candidate);
            }
        }
        Ok(best)
    }

    /// Select the newest artifact, building one if none exist, and bring the
    /// current artifact up to date with it.
    pub async fn resolve(&self) -> Result<Artifact> {
        io::ensure_dir(&self.dir)?;

        let latest = match self.latest()? {
            Some(a) => a,
            None => {
                self.build.build().await?;
                self.latest()?.ok_or_else(|| {
                    HelmsmanError::BuildFailure(format!(
                        "build finished but no *{} file appeared in {}",
                        self.suffix,
                        self.dir.display()
                    ))
                })?
            }
        };

        let current_path = self.current_path();
        if latest.path == current_path {
            return Ok(latest);
        }
        let stale = match Artifact::from_path(current_path.clone()) {
            Ok(current) => latest.modified > current.modified,
            Err(_) => true,
        };
        if stale {
            if let Err(e) = io::copy_file(&latest.path, &current_path) {
                warn!(
                    from = %latest.path.display(),
                    "could not update current artifact, using latest directly: {e}"
                );
                return Ok(latest);
            }
            info!(
                from = %latest.path.display(),
                to = %current_path.display(),
                "current artifact updated"
            );
        }

        match Artifact::from_path(current_path) {
            Ok(current) => Ok(current),
            Err(_) => Ok(latest),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// Build step that counts calls and optionally drops a file.
    struct FakeBuild {
        calls: AtomicU32,
        produce: Option<PathBuf>,
        fail: bool,
    }

    impl FakeBuild {
        fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                produce: None,
                fail: true,
            }
        }

        fn producing(path: PathBuf) -> Self {
            Self {
                calls: AtomicU32::new(0),
                produce: Some(path),
                fail: false,
            }
        }

        fn silent() -> Self {
            Self {
                calls: AtomicU32::new(0),
                produce: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl BuildStep for FakeBuild {
        async fn build(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HelmsmanError::BuildFailure("exit code 1".into()));
            }
            if let Some(p) = &self.produce {
                std::fs::write(p, b"trained").unwrap();
            }
            Ok(())
        }
    }

    fn write_with_age(path: &Path, body: &[u8], age: Duration) {
        std::fs::write(path, body).unwrap();
        let when = SystemTime::now() - age;
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    fn resolver<B: BuildStep>(dir: &Path, build: B) -> ArtifactResolver<B> {
        ArtifactResolver::new(dir, ".tar.gz", "production.tar.gz", build)
    }

    #[tokio::test]
    async fn picks_newest_and_syncs_current() {
        let dir = TempDir::new().unwrap();
        write_with_age(&dir.path().join("20240101.tar.gz"), b"old", Duration::from_secs(600));
        write_with_age(&dir.path().join("20240202.tar.gz"), b"new", Duration::from_secs(60));
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let r = resolver(dir.path(), FakeBuild::failing());
        let art = r.resolve().await.unwrap();

        assert_eq!(art.path, dir.path().join("production.tar.gz"));
        assert!(art.path.exists());
        assert_eq!(std::fs::read(&art.path).unwrap(), b"new");
        assert_eq!(r.build.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stale_current_is_overwritten() {
        let dir = TempDir::new().unwrap();
        write_with_age(
            &dir.path().join("production.tar.gz"),
            b"stale",
            Duration::from_secs(3600),
        );
        write_with_age(&dir.path().join("fresh.tar.gz"), b"fresh", Duration::from_secs(10));

        let art = resolver(dir.path(), FakeBuild::failing())
            .resolve()
            .await
            .unwrap();
        assert_eq!(std::fs::read(&art.path).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn newer_current_is_left_alone() {
        let dir = TempDir::new().unwrap();
        write_with_age(&dir.path().join("older.tar.gz"), b"older", Duration::from_secs(3600));
        write_with_age(
            &dir.path().join("production.tar.gz"),
            b"pinned",
            Duration::from_secs(10),
        );

        let art = resolver(dir.path(), FakeBuild::failing())
            .resolve()
            .await
            .unwrap();
        assert_eq!(art.path, dir.path().join("production.tar.gz"));
        assert_eq!(std::fs::read(&art.path).unwrap(), b"pinned");
    }

    #[tokio::test]
    async fn builds_when_empty() {
        let dir = TempDir::new().unwrap();
        let models = dir.path().join("models");
        let build = FakeBuild::producing(models.join("trained.tar.gz"));

        let r = resolver(&models, build);
        let art = r.resolve().await.unwrap();

        assert_eq!(r.build.calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(&art.path).unwrap(), b"trained");
    }

    #[tokio::test]
    async fn failing_build_writes_no_current() {
        let dir = TempDir::new().unwrap();
        let r = resolver(dir.path(), FakeBuild::failing());

        let err = r.resolve().await.unwrap_err();

        assert!(matches!(err, HelmsmanError::BuildFailure(_)));
        assert!(!r.current_path().exists());
    }

    #[tokio::test]
    async fn build_without_output_is_build_failure() {
        let dir = TempDir::new().unwrap();
        let r = resolver(dir.path(), FakeBuild::silent());

        let err = r.resolve().await.unwrap_err();

        assert!(matches!(err, HelmsmanError::BuildFailure(_)));
        assert!(!r.current_path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copy_failure_falls_back_to_latest() {
        let dir = TempDir::new().unwrap();
        // a directory squatting on the current name cannot be renamed over
        let current = dir.path().join("production.tar.gz");
        std::fs::create_dir(&current).unwrap();
        File::open(&current)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(3600))
            .unwrap();
        write_with_age(&dir.path().join("only.tar.gz"), b"m", Duration::from_secs(5));

        let art = resolver(dir.path(), FakeBuild::failing())
            .resolve()
            .await
            .unwrap();

        assert_eq!(art.path, dir.path().join("only.tar.gz"));
        assert!(current.is_dir());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 2, "temp file left behind: {leftovers:?}");
    }

    #[test]
    fn latest_on_missing_dir_is_none() {
        let dir = TempDir::new().unwrap();
        let r = resolver(&dir.path().join("absent"), FakeBuild::failing());
        assert!(r.latest().unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_build_reports_exit_code() {
        let dir = TempDir::new().unwrap();
        let build = CommandBuild::new(CommandSpec::new("sh", &["-c", "exit 3"]), dir.path());
        let err = build.build().await.unwrap_err();
        assert!(err.to_string().contains("code 3"), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_build_runs_in_project_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("models")).unwrap();
        let build = CommandBuild::new(
            CommandSpec::new("sh", &["-c", "echo m > models/cmd.tar.gz"]),
            dir.path(),
        );
        let r = resolver(&dir.path().join("models"), build);
        let art = r.resolve().await.unwrap();
        assert_eq!(art.file_name(), "production.tar.gz");
    }
}
