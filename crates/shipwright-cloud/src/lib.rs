//! External tool boundary for shipwright.
//!
//! Every side effect outside the local process goes through a
//! [`ToolExecutor`]: the image build tool, the registry client, and the
//! orchestration control plane are opaque CLIs with request/response
//! contracts.

pub mod builder;
pub mod control_plane;
pub mod doctor;
pub mod executor;
pub mod registry;
pub mod retry;
pub mod tool;

pub use builder::{ArtifactBuilder, BuildError};
pub use control_plane::{
    ControlPlane, ControlPlaneError, EcsControlPlane, RegisteredRevision, ServiceDeployment,
    ServiceStatus,
};
pub use doctor::{CheckResult, DoctorReport, NamedCheck, doctor};
pub use executor::{RealExecutor, ToolExecutor};
pub use registry::{FailureClass, PublishError, RegistryCredentials, RegistryPublisher, classify};
pub use retry::RetryPolicy;
pub use tool::{Tool, ToolError};
