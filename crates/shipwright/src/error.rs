use std::time::Duration;

use shipwright_build::DefinitionError;
use shipwright_cloud::{BuildError, ControlPlaneError, PublishError};
use shipwright_core::{Environment, Stage};

/// Why a run ended anywhere other than `SUCCEEDED`.
///
/// Every variant is terminal for the run that raised it. Each maps to a
/// distinct process exit code so automation can branch on status alone.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("image build failed")]
    BuildFailure { source: BuildError },

    #[error("image publish failed")]
    PublishFailure { source: PublishError },

    #[error("definition patch target not found")]
    PatchTargetNotFound { source: DefinitionError },

    #[error("definition patch target is ambiguous")]
    PatchAmbiguous { source: DefinitionError },

    #[error("resource definition is invalid")]
    DefinitionInvalid { source: DefinitionError },

    #[error("control plane rejected the deployment: {reason}")]
    DeploymentRejected {
        reason: String,
        source: Option<ControlPlaneError>,
    },

    #[error("revision {revision_id} did not converge within {}s", .timeout.as_secs())]
    DeploymentTimedOut {
        revision_id: String,
        timeout: Duration,
        /// Last observed service state, if any poll succeeded
        last_status: Option<String>,
    },

    #[error("run cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("environment {environment} is leased by another run ({holder})")]
    LockContention {
        environment: Environment,
        holder: String,
    },

    #[error("lease file {path} could not be used")]
    Lease {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration")]
    Config { source: shipwright_core::Error },

    #[error("internal pipeline error")]
    Internal { source: shipwright_core::Error },
}

impl PipelineError {
    /// Stable name printed as `error[<kind>]`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BuildFailure { .. } => "BuildFailure",
            Self::PublishFailure { .. } => "PublishFailure",
            Self::PatchTargetNotFound { .. } => "PatchTargetNotFound",
            Self::PatchAmbiguous { .. } => "PatchAmbiguous",
            Self::DefinitionInvalid { .. } => "DefinitionInvalid",
            Self::DeploymentRejected { .. } => "DeploymentRejected",
            Self::DeploymentTimedOut { .. } => "DeploymentTimedOut",
            Self::Cancelled { .. } => "Cancelled",
            Self::LockContention { .. } => "LockContention",
            Self::Lease { .. } => "Lease",
            Self::Config { .. } => "Config",
            Self::Internal { .. } => "Internal",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::BuildFailure { .. } => 10,
            Self::PublishFailure { .. } => 11,
            Self::PatchTargetNotFound { .. } => 12,
            Self::PatchAmbiguous { .. } => 13,
            Self::DefinitionInvalid { .. } => 14,
            Self::DeploymentRejected { .. } => 15,
            Self::DeploymentTimedOut { .. } => 16,
            Self::Cancelled { .. } => 17,
            Self::LockContention { .. } => 18,
            Self::Config { .. } => 2,
            Self::Lease { .. } | Self::Internal { .. } => 1,
        }
    }

    /// Captured payload shown under the error chain: tool output,
    /// control-plane error body, or the last observed service state.
    pub fn diagnostics(&self) -> Option<String> {
        match self {
            Self::BuildFailure { source } => source.diagnostics().map(str::to_owned),
            Self::PublishFailure { source } => source.diagnostics(),
            Self::DeploymentRejected { source, .. } => source
                .as_ref()
                .and_then(|e| e.body())
                .map(str::to_owned),
            Self::DeploymentTimedOut { last_status, .. } => last_status.clone(),
            _ => None,
        }
    }
}

impl From<DefinitionError> for PipelineError {
    fn from(source: DefinitionError) -> Self {
        match source {
            DefinitionError::TargetNotFound { .. } => Self::PatchTargetNotFound { source },
            DefinitionError::Ambiguous { .. } => Self::PatchAmbiguous { source },
            _ => Self::DefinitionInvalid { source },
        }
    }
}

impl From<BuildError> for PipelineError {
    fn from(source: BuildError) -> Self {
        Self::BuildFailure { source }
    }
}

impl From<PublishError> for PipelineError {
    fn from(source: PublishError) -> Self {
        Self::PublishFailure { source }
    }
}
