use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("environment '{0}' is not configured — add [environments.{0}] to shipwright.toml")]
    EnvironmentNotConfigured(String),

    #[error("unknown environment '{0}' (expected one of: development, staging, production)")]
    UnknownEnvironment(String),

    // ── Runtime environment variables ──
    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error(
        "no image repository for environment '{environment}' — set IMAGE_REPO_NAME or [environments.{environment}].repository"
    )]
    MissingRepository { environment: String },

    // ── Value validation ──
    #[error("invalid revision {revision:?}: {reason}")]
    InvalidRevision {
        revision: String,
        reason: &'static str,
    },

    #[error("invalid tag template {template:?}: must contain {{revision}}")]
    InvalidTagTemplate { template: String },

    #[error("invalid setting {key} = 0: polling needs a non-zero interval")]
    ZeroInterval { key: &'static str },

    #[error("illegal pipeline transition {from} → {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}
