//! Core types and configuration for shipwright.
//!
//! This crate defines the `shipwright.toml` schema ([`ShipwrightConfig`]),
//! the runtime environment ([`RuntimeEnv`]), the values passed between
//! pipeline stages, and the [`PipelineRun`] state machine.

pub mod config;
pub mod env;
pub mod error;
pub mod model;
pub mod run;

pub use config::{
    BuildConfig, CONFIG_FILE, DeployConfig, EnvironmentConfig, LeaseConfig, LeaseMode,
    ProjectConfig, RegistryConfig, ShipwrightConfig,
};
pub use env::RuntimeEnv;
pub use error::{Error, Result};
pub use model::{
    ArtifactReference, DeploymentTarget, Environment, LATEST_TAG, PublishedReference, Revision,
};
pub use run::{PipelineRun, RunKind, RunStatus, Stage, StageTransition};
