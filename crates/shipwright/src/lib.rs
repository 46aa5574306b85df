//! Build, publish, patch and roll out a container service.
//!
//! ```text
//! PENDING → BUILDING → PUBLISHING → PATCHING → DEPLOYING → SUCCEEDED
//!                                                        ↘ TIMED_OUT
//! (any non-terminal stage) → FAILED
//! ```
//!
//! A [`PipelineCoordinator`] owns one [`PipelineRun`] and walks it through
//! the stages above while holding the environment's [`lease`]. The
//! [`DeploymentDriver`] handles the last stage: register the patched
//! definition, roll the service onto it, and poll until it converges.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use shipwright::{Environment, PipelineContext, PipelineCoordinator, Revision};
//! use shipwright::{RuntimeEnv, ShipwrightConfig};
//! use shipwright::cloud::RealExecutor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let context = PipelineContext {
//!     project_dir: Path::new(".").to_path_buf(),
//!     config: ShipwrightConfig::load(Path::new("."))?,
//!     runtime: RuntimeEnv::load()?,
//! };
//! let revision = Revision::parse("abc1234")?;
//! let coordinator =
//!     PipelineCoordinator::deploy(RealExecutor, context, Environment::Staging, revision)?;
//! let outcome = coordinator.run().await?;
//! println!("{} {}", outcome.run.id, outcome.run.stage);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod driver;
pub mod error;
pub mod lease;

pub use coordinator::{PipelineContext, PipelineCoordinator, PipelineOutcome, dry_run};
pub use driver::{DeploymentDriver, DeploymentResult};
pub use error::PipelineError;
pub use lease::{Acquired, EnvironmentLease, LeaseManager};

// Core types flattened into root namespace for convenience.
pub use shipwright_core::*;

/// Definition patching and revision resolution.
pub mod build {
    pub use shipwright_build::*;
}

/// External tools: image builds, registry, control plane.
pub mod cloud {
    pub use shipwright_cloud::*;
}
