//! Service launchers.
//!
//! Each launcher picks its arguments, spawns the process and then gates on
//! the prober. A readiness timeout is only a warning; the process handle is
//! returned either way so the supervisor can own (and later stop) it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::artifact::Artifact;
use crate::config::{CommandSpec, Config, ServiceConfig, UiConfig};
use crate::error::{HelmsmanError, Result};
use crate::probe::Prober;
use crate::process::{ManagedProcess, Readiness, Role};

// ---------------------------------------------------------------------------
// Opener
// ---------------------------------------------------------------------------

/// Opens a URL for the operator.
pub trait Opener: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// The platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl Opener for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}

// ---------------------------------------------------------------------------
// Launch
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Launch: Send + Sync {
    async fn start_action(&self) -> Result<ManagedProcess>;
    async fn start_dialogue(&self, artifact: &Artifact) -> Result<ManagedProcess>;
    async fn start_ui(&self) -> Result<ManagedProcess>;
}

// ---------------------------------------------------------------------------
// Shared spawn-then-probe
// ---------------------------------------------------------------------------

struct Gated<'a> {
    role: Role,
    spec: &'a CommandSpec,
    extra: Vec<String>,
    cwd: &'a Path,
    port: u16,
    ready_url: String,
    startup_timeout: Duration,
}

async fn spawn_gated(g: Gated<'_>, prober: &dyn Prober) -> Result<ManagedProcess> {
    info!(role = %g.role, port = g.port, "starting");
    let mut process = ManagedProcess::spawn(
        g.role,
        g.spec,
        &g.extra,
        g.cwd,
        g.port,
        Some(g.ready_url.clone()),
    )?;
    if prober.wait_ready(&g.ready_url, g.startup_timeout).await {
        info!(role = %g.role, url = %g.ready_url, "ready");
        process.readiness = Readiness::Ready;
    } else {
        let err = HelmsmanError::LaunchTimeout {
            role: g.role,
            secs: g.startup_timeout.as_secs(),
        };
        warn!(url = %g.ready_url, "{err}");
        process.readiness = Readiness::TimedOut;
    }
    Ok(process)
}

// ---------------------------------------------------------------------------
// ActionLauncher
// ---------------------------------------------------------------------------

/// Custom action handlers. Optional for some deployments, so an unhealthy
/// start is reported and tolerated.
#[derive(Debug, Clone)]
pub struct ActionLauncher {
    pub service: ServiceConfig,
    pub host: String,
    pub cwd: PathBuf,
}

impl ActionLauncher {
    pub fn args(&self) -> Vec<String> {
        vec!["-p".to_string(), self.service.port.to_string()]
    }

    pub fn ready_url(&self) -> String {
        service_url(&self.host, self.service.port, &self.service.ready_path)
    }

    pub async fn start(&self, prober: &dyn Prober) -> Result<ManagedProcess> {
        spawn_gated(
            Gated {
                role: Role::ActionService,
                spec: &self.service.command,
                extra: self.args(),
                cwd: &self.cwd,
                port: self.service.port,
                ready_url: self.ready_url(),
                startup_timeout: self.service.startup_timeout(),
            },
            prober,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// DialogueLauncher
// ---------------------------------------------------------------------------

/// The dialogue engine: HTTP API on, CORS open, REST connector, bound to one
/// model artifact. Model loading dominates its startup time.
#[derive(Debug, Clone)]
pub struct DialogueLauncher {
    pub service: ServiceConfig,
    pub host: String,
    pub cwd: PathBuf,
}

impl DialogueLauncher {
    pub fn args(&self, artifact: &Artifact) -> Vec<String> {
        vec![
            "--enable-api".to_string(),
            "-p".to_string(),
            self.service.port.to_string(),
            "--cors".to_string(),
            "*".to_string(),
            "--connector".to_string(),
            "rest".to_string(),
            "-m".to_string(),
            artifact.path.to_string_lossy().into_owned(),
        ]
    }

    pub fn ready_url(&self) -> String {
        service_url(&self.host, self.service.port, &self.service.ready_path)
    }

    pub async fn start(&self, artifact: &Artifact, prober: &dyn Prober) -> Result<ManagedProcess> {
        info!(model = %artifact.file_name(), "dialogue model");
        spawn_gated(
            Gated {
                role: Role::DialogueService,
                spec: &self.service.command,
                extra: self.args(artifact),
                cwd: &self.cwd,
                port: self.service.port,
                ready_url: self.ready_url(),
                startup_timeout: self.service.startup_timeout(),
            },
            prober,
        )
        .await
    }
}

// ---------------------------------------------------------------------------
// UiLauncher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UiLauncher {
    pub ui: UiConfig,
    pub host: String,
    pub cwd: PathBuf,
}

impl UiLauncher {
    pub fn args(&self, port: u16) -> Vec<String> {
        vec![
            "--server.port".to_string(),
            port.to_string(),
            "--server.headless".to_string(),
            "true".to_string(),
            "--browser.gatherUsageStats".to_string(),
            "false".to_string(),
        ]
    }

    /// The configured port, or the one after it if something already answers.
    pub async fn choose_port(&self) -> u16 {
        let preferred = self.ui.port;
        if !port_in_use(&self.host, preferred).await {
            return preferred;
        }
        match fallback_port(preferred) {
            Some(fallback) => {
                info!(preferred, fallback, "ui port busy");
                fallback
            }
            None => {
                warn!(preferred, "ui port busy and no higher port to fall back to");
                preferred
            }
        }
    }

    pub async fn start(&self, opener: &dyn Opener) -> Result<ManagedProcess> {
        let port = self.choose_port().await;
        let url = format!("http://{}:{port}/", self.host);
        info!(role = %Role::UiService, port, "starting");
        let process = ManagedProcess::spawn(
            Role::UiService,
            &self.ui.command,
            &self.args(port),
            &self.cwd,
            port,
            None,
        )?;

        sleep(Duration::from_millis(self.ui.open_delay_ms)).await;
        if self.ui.open_browser {
            if let Err(e) = opener.open(&url) {
                warn!(%url, "could not open browser: {e}");
            }
        }
        info!(%url, "ui launched");
        Ok(process)
    }
}

/// The port after `preferred`, if there is one.
fn fallback_port(preferred: u16) -> Option<u16> {
    preferred.checked_add(1)
}

/// Best-effort: a TCP connect that succeeds means the port is taken.
async fn port_in_use(host: &str, port: u16) -> bool {
    matches!(
        timeout(Duration::from_secs(1), TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

fn service_url(host: &str, port: u16, path: &str) -> String {
    format!("http://{host}:{port}{path}")
}

// ---------------------------------------------------------------------------
// ServiceLaunchers
// ---------------------------------------------------------------------------

/// The three launchers wired to one prober and opener.
pub struct ServiceLaunchers {
    pub action: ActionLauncher,
    pub dialogue: DialogueLauncher,
    pub ui: UiLauncher,
    prober: Arc<dyn Prober>,
    opener: Box<dyn Opener>,
}

impl ServiceLaunchers {
    pub fn from_config(
        root: &Path,
        config: &Config,
        prober: Arc<dyn Prober>,
        opener: Box<dyn Opener>,
    ) -> Self {
        Self {
            action: ActionLauncher {
                service: config.action.clone(),
                host: config.host.clone(),
                cwd: root.to_path_buf(),
            },
            dialogue: DialogueLauncher {
                service: config.dialogue.clone(),
                host: config.host.clone(),
                cwd: root.to_path_buf(),
            },
            ui: UiLauncher {
                ui: config.ui.clone(),
                host: config.host.clone(),
                cwd: root.to_path_buf(),
            },
            prober,
            opener,
        }
    }
}

#[async_trait]
impl Launch for ServiceLaunchers {
    async fn start_action(&self) -> Result<ManagedProcess> {
        self.action.start(self.prober.as_ref()).await
    }

    async fn start_dialogue(&self, artifact: &Artifact) -> Result<ManagedProcess> {
        self.dialogue.start(artifact, self.prober.as_ref()).await
    }

    async fn start_ui(&self) -> Result<ManagedProcess> {
        self.ui.start(self.opener.as_ref()).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
