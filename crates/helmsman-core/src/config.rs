use crate::error::Result;
use crate::paths;
use crate::supervisor::SupervisorPolicy;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PYTHON: &str = "python";
pub const PYTHON_ENV: &str = "HELMSMAN_PYTHON";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// CommandSpec
// ---------------------------------------------------------------------------

/// Program plus leading arguments. Launchers append their role-specific flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn python(args: &[&str]) -> Self {
        Self::new(DEFAULT_PYTHON, args)
    }
}

// ---------------------------------------------------------------------------
// ModelsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_models_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default = "default_current")]
    pub current: String,
    #[serde(default = "default_build")]
    pub build: CommandSpec,
}

fn default_models_dir() -> PathBuf {
    PathBuf::from(paths::MODELS_DIR)
}

fn default_suffix() -> String {
    paths::ARTIFACT_SUFFIX.to_string()
}

fn default_current() -> String {
    paths::CURRENT_ARTIFACT.to_string()
}

fn default_build() -> CommandSpec {
    CommandSpec::python(&["-m", "rasa", "train"])
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
            suffix: default_suffix(),
            current: default_current(),
            build: default_build(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceConfig (action + dialogue)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub command: CommandSpec,
    pub port: u16,
    pub ready_path: String,
    pub startup_timeout_secs: u64,
}

impl ServiceConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

/// Any subset of a [`ServiceConfig`]; absent keys keep the role's default.
#[derive(Deserialize)]
struct ServiceOverrides {
    command: Option<CommandSpec>,
    port: Option<u16>,
    ready_path: Option<String>,
    startup_timeout_secs: Option<u64>,
}

impl ServiceOverrides {
    fn apply(self, base: ServiceConfig) -> ServiceConfig {
        ServiceConfig {
            command: self.command.unwrap_or(base.command),
            port: self.port.unwrap_or(base.port),
            ready_path: self.ready_path.unwrap_or(base.ready_path),
            startup_timeout_secs: self
                .startup_timeout_secs
                .unwrap_or(base.startup_timeout_secs),
        }
    }
}

fn action_over_defaults<'de, D>(d: D) -> std::result::Result<ServiceConfig, D::Error>
where
    D: Deserializer<'de>,
{
    ServiceOverrides::deserialize(d).map(|o| o.apply(default_action()))
}

fn dialogue_over_defaults<'de, D>(d: D) -> std::result::Result<ServiceConfig, D::Error>
where
    D: Deserializer<'de>,
{
    ServiceOverrides::deserialize(d).map(|o| o.apply(default_dialogue()))
}

fn default_action() -> ServiceConfig {
    ServiceConfig {
        command: CommandSpec::python(&["-m", "rasa", "run", "actions"]),
        port: 5055,
        ready_path: "/health".to_string(),
        startup_timeout_secs: 40,
    }
}

fn default_dialogue() -> ServiceConfig {
    ServiceConfig {
        command: CommandSpec::python(&["-m", "rasa", "run"]),
        port: 5006,
        ready_path: "/status".to_string(),
        startup_timeout_secs: 60,
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_ui_command")]
    pub command: CommandSpec,
    #[serde(default = "default_ui_port")]
    pub port: u16,
    /// Pause between spawning the UI and opening the browser.
    #[serde(default = "default_open_delay_ms")]
    pub open_delay_ms: u64,
    #[serde(default = "default_true")]
    pub open_browser: bool,
}

fn default_ui_command() -> CommandSpec {
    CommandSpec::python(&["-m", "streamlit", "run", paths::UI_SCRIPT])
}

fn default_ui_port() -> u16 {
    8501
}

fn default_open_delay_ms() -> u64 {
    2500
}

fn default_true() -> bool {
    true
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            command: default_ui_command(),
            port: default_ui_port(),
            open_delay_ms: default_open_delay_ms(),
            open_browser: true,
        }
    }
}

// ---------------------------------------------------------------------------
// SupervisorConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_ready_poll")]
    pub ready_poll_ms: u64,
    #[serde(default = "default_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_grace")]
    pub grace_period_secs: u64,
    /// 0 keeps restarts immediate.
    #[serde(default)]
    pub restart_backoff_secs: u64,
    /// None means restart forever.
    #[serde(default)]
    pub max_restarts: Option<u32>,
}

fn default_check_interval() -> u64 {
    8
}

fn default_probe_timeout() -> u64 {
    2000
}

fn default_ready_poll() -> u64 {
    800
}

fn default_threshold() -> u32 {
    3
}

fn default_grace() -> u64 {
    5
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            probe_timeout_ms: default_probe_timeout(),
            ready_poll_ms: default_ready_poll(),
            failure_threshold: default_threshold(),
            grace_period_secs: default_grace(),
            restart_backoff_secs: 0,
            max_restarts: None,
        }
    }
}

impl SupervisorConfig {
    pub fn policy(&self) -> SupervisorPolicy {
        SupervisorPolicy {
            check_interval: Duration::from_secs(self.check_interval_secs),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            failure_threshold: self.failure_threshold,
            grace_period: Duration::from_secs(self.grace_period_secs),
            restart_backoff: Duration::from_secs(self.restart_backoff_secs),
            max_restarts: self.max_restarts,
        }
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default = "default_action", deserialize_with = "action_over_defaults")]
    pub action: ServiceConfig,
    #[serde(default = "default_dialogue", deserialize_with = "dialogue_over_defaults")]
    pub dialogue: ServiceConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

fn default_host() -> String {
    "localhost".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            models: ModelsConfig::default(),
            action: default_action(),
            dialogue: default_dialogue(),
            ui: UiConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl Config {
    /// Load `helmsman.yaml` from `root`. A missing file yields the defaults.
    /// `HELMSMAN_PYTHON`, when set, replaces the default interpreter.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        let cfg = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_yaml::from_str(&data)?
        } else {
            Config::default()
        };
        Ok(match std::env::var(PYTHON_ENV) {
            Ok(python) if !python.trim().is_empty() => cfg.with_python(python.trim()),
            _ => cfg,
        })
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Swap the interpreter on every command still pointing at the default.
    pub fn with_python(mut self, python: &str) -> Self {
        for spec in [
            &mut self.models.build,
            &mut self.action.command,
            &mut self.dialogue.command,
            &mut self.ui.command,
        ] {
            if spec.program == DEFAULT_PYTHON {
                spec.program = python.to_string();
            }
        }
        self
    }

    pub fn models_dir(&self, root: &Path) -> PathBuf {
        paths::resolve(root, &self.models.dir)
    }

    pub fn service_url(&self, port: u16, path: &str) -> String {
        format!("http://{}:{port}{path}", self.host)
    }

    pub fn dialogue_base_url(&self) -> String {
        self.service_url(self.dialogue.port, "")
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let error = |message: String| ConfigWarning {
            level: WarnLevel::Error,
            message,
        };
        let warning = |message: String| ConfigWarning {
            level: WarnLevel::Warning,
            message,
        };

        let sup = &self.supervisor;
        if sup.failure_threshold == 0 {
            warnings.push(error(
                "supervisor.failure_threshold must be at least 1".to_string(),
            ));
        }
        if sup.check_interval_secs == 0 {
            warnings.push(error(
                "supervisor.check_interval_secs must be at least 1".to_string(),
            ));
        }
        if sup.probe_timeout_ms == 0 || sup.ready_poll_ms == 0 {
            warnings.push(error(
                "supervisor probe timeout and ready poll must be non-zero".to_string(),
            ));
        }
        if sup.probe_timeout_ms >= sup.check_interval_secs.saturating_mul(1000) {
            warnings.push(warning(format!(
                "supervisor.probe_timeout_ms={} is not shorter than the {}s check interval",
                sup.probe_timeout_ms, sup.check_interval_secs
            )));
        }
        if sup.max_restarts == Some(0) {
            warnings.push(warning(
                "supervisor.max_restarts=0 stops the orchestrator on the first breach"
                    .to_string(),
            ));
        }

        for (name, svc) in [("action", &self.action), ("dialogue", &self.dialogue)] {
            if svc.startup_timeout_secs == 0 {
                warnings.push(warning(format!(
                    "{name}.startup_timeout_secs=0 skips the readiness wait"
                )));
            }
            if !svc.ready_path.starts_with('/') {
                warnings.push(error(format!(
                    "{name}.ready_path '{}' must start with '/'",
                    svc.ready_path
                )));
            }
        }

        let ports = [
            ("action", self.action.port),
            ("dialogue", self.dialogue.port),
            ("ui", self.ui.port),
        ];
        for (i, (a, pa)) in ports.iter().enumerate() {
            for (b, pb) in &ports[i + 1..] {
                if pa == pb {
                    warnings.push(error(format!("{a} and {b} both use port {pa}")));
                }
            }
        }
        if self.ui.port.checked_add(1) == Some(self.action.port)
            || self.ui.port.checked_add(1) == Some(self.dialogue.port)
        {
            warnings.push(warning(format!(
                "ui fallback port {} collides with another service",
                self.ui.port as u32 + 1
            )));
        }

        for (name, spec) in [
            ("models.build", &self.models.build),
            ("action", &self.action.command),
            ("dialogue", &self.dialogue.command),
            ("ui", &self.ui.command),
        ] {
            if spec.program.trim().is_empty() {
                warnings.push(error(format!("{name} has an empty program")));
            } else if which::which(&spec.program).is_err() {
                warnings.push(warning(format!(
                    "{name} program '{}' not found on PATH",
                    spec.program
                )));
            }
        }

        warnings
    }
}
