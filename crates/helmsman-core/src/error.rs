use crate::process::Role;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HelmsmanError {
    #[error("no model artifact available: {0}")]
    BuildFailure(String),

    #[error("{role} did not become ready within {secs}s")]
    LaunchTimeout { role: Role, secs: u64 },

    #[error("failed to spawn {role}: {source}")]
    Spawn {
        role: Role,
        #[source]
        source: std::io::Error,
    },

    #[error("dialogue-service restart failed: {0}")]
    RestartFailure(#[source] Box<HelmsmanError>),

    #[error("dialogue-service restarted {0} times, giving up")]
    RestartLimit(u32),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("dialogue service returned HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HelmsmanError>;
