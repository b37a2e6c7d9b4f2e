//! Managed child processes.
//!
//! A [`ManagedProcess`] owns one spawned service. Children are spawned with
//! `kill_on_drop(true)`, so a handle that is dropped on an error path still
//! takes its process down with it. Orderly teardown goes through
//! [`ManagedProcess::terminate`]: SIGTERM, wait out the grace period, SIGKILL.

use std::fmt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::CommandSpec;
use crate::error::{HelmsmanError, Result};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// One of the three service roles the orchestrator manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    ActionService,
    DialogueService,
    UiService,
}

impl Role {
    /// Dependency order. Shutdown walks it backwards.
    pub const START_ORDER: [Role; 3] = [
        Role::ActionService,
        Role::DialogueService,
        Role::UiService,
    ];

    /// Position in [`Role::START_ORDER`].
    pub fn index(self) -> usize {
        match self {
            Role::ActionService => 0,
            Role::DialogueService => 1,
            Role::UiService => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::ActionService => "action-service",
            Role::DialogueService => "dialogue-service",
            Role::UiService => "ui-service",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Readiness / Termination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    TimedOut,
    /// No readiness contract (the UI).
    Unchecked,
}

/// How a process ended when we asked it to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Had already exited before we signalled it.
    AlreadyExited,
    /// Exited within the grace period after SIGTERM.
    Graceful,
    /// Needed SIGKILL.
    Killed,
}

// ---------------------------------------------------------------------------
// ManagedProcess
// ---------------------------------------------------------------------------

pub struct ManagedProcess {
    pub role: Role,
    pub port: u16,
    /// Readiness URL declared for the role, if it has one.
    pub ready_url: Option<String>,
    /// Full argv, program first.
    pub argv: Vec<String>,
    pub readiness: Readiness,
    child: Child,
}

impl fmt::Debug for ManagedProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedProcess")
            .field("role", &self.role)
            .field("pid", &self.pid())
            .field("port", &self.port)
            .field("ready_url", &self.ready_url)
            .field("readiness", &self.readiness)
            .finish()
    }
}

impl ManagedProcess {
    /// Spawn `spec` with `extra` args appended, from `cwd`. Output is inherited
    /// so the services log straight to the operator's terminal.
    pub fn spawn(
        role: Role,
        spec: &CommandSpec,
        extra: &[String],
        cwd: &Path,
        port: u16,
        ready_url: Option<String>,
    ) -> Result<Self> {
        let mut argv = Vec::with_capacity(1 + spec.args.len() + extra.len());
        argv.push(spec.program.clone());
        argv.extend(spec.args.iter().cloned());
        argv.extend(extra.iter().cloned());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&argv[1..])
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        Self::from_command(role, cmd, argv, port, ready_url)
    }

    fn from_command(
        role: Role,
        mut cmd: Command,
        argv: Vec<String>,
        port: u16,
        ready_url: Option<String>,
    ) -> Result<Self> {
        let child = cmd
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| HelmsmanError::Spawn { role, source })?;
        info!(%role, pid = child.id(), port, "spawned");
        Ok(Self {
            role,
            port,
            ready_url,
            argv,
            readiness: Readiness::Unchecked,
            child,
        })
    }

    /// OS pid, or `None` once the child has been reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// True while the child has not exited.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, wait up to `grace`, then SIGKILL. Consumes the handle.
    pub async fn terminate(mut self, grace: Duration) -> Result<Termination> {
        let role = self.role;
        if let Some(status) = self.child.try_wait()? {
            debug!(%role, ?status, "already exited");
            return Ok(Termination::AlreadyExited);
        }

        if !self.signal_term() {
            self.child.kill().await?;
            info!(%role, "killed");
            return Ok(Termination::Killed);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => {
                let status: ExitStatus = status?;
                info!(%role, ?status, "stopped");
                Ok(Termination::Graceful)
            }
            Err(_) => {
                warn!(
                    %role,
                    grace_secs = grace.as_secs_f64(),
                    "did not stop in time, killing"
                );
                self.child.kill().await?;
                Ok(Termination::Killed)
            }
        }
    }

    /// Send SIGTERM. Returns false when no graceful signal could be delivered.
    #[cfg(unix)]
    fn signal_term(&self) -> bool {
        let Some(pid) = self.child.id() else {
            return false;
        };
        // SAFETY: plain kill(2) on a pid we own and have not reaped yet.
        unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
    }

    #[cfg(not(unix))]
    fn signal_term(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
