use serde::Deserialize;

use crate::executor::{ToolExecutor, args};
use crate::tool::{Tool, ToolError};

/// A definition revision as returned by registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRevision {
    /// Identifier used to deploy this revision (`family:N` ARN)
    pub id: String,
    pub family: String,
    pub revision: u64,
}

/// One rollout tracked by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDeployment {
    pub id: String,
    /// `PRIMARY` for the newest, `ACTIVE` for those being drained
    pub status: String,
    pub revision_id: String,
    pub running_count: u32,
    pub desired_count: u32,
    pub rollout_state: Option<String>,
    pub rollout_state_reason: Option<String>,
}

impl ServiceDeployment {
    pub fn is_primary(&self) -> bool {
        self.status == "PRIMARY"
    }

    pub fn rollout_failed(&self) -> bool {
        self.rollout_state.as_deref() == Some("FAILED")
    }
}

/// Service state as seen by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub running_count: u32,
    pub desired_count: u32,
    pub revision_id: String,
    pub deployments: Vec<ServiceDeployment>,
}

impl ServiceStatus {
    /// `revision_id` is fully rolled out and nothing else is still running.
    pub fn has_converged_on(&self, revision_id: &str) -> bool {
        let Some(primary) = self.deployments.iter().find(|d| d.is_primary()) else {
            return self.revision_id == revision_id && self.running_count == self.desired_count;
        };

        let drained = self
            .deployments
            .iter()
            .filter(|d| !d.is_primary())
            .all(|d| d.running_count == 0);

        primary.revision_id == revision_id
            && primary.running_count == self.desired_count
            && drained
    }

    pub fn primary(&self) -> Option<&ServiceDeployment> {
        self.deployments.iter().find(|d| d.is_primary())
    }

    /// Why the rollout of `revision_id` can no longer converge, if the
    /// control plane has given up on it.
    ///
    /// A circuit-breaker rollback leaves the failed deployment `ACTIVE` and
    /// makes the previous revision `PRIMARY` again, so every deployment of
    /// `revision_id` is inspected, not just the primary.
    pub fn rollout_failure(&self, revision_id: &str) -> Option<String> {
        let failed = self
            .deployments
            .iter()
            .filter(|d| d.rollout_failed())
            .find(|d| d.revision_id == revision_id || d.is_primary());
        if let Some(d) = failed {
            return Some(
                d.rollout_state_reason
                    .clone()
                    .unwrap_or_else(|| format!("rollout of {} failed", d.revision_id)),
            );
        }

        let primary = self.primary()?;
        let demoted = self
            .deployments
            .iter()
            .any(|d| !d.is_primary() && d.revision_id == revision_id);
        (primary.revision_id != revision_id && demoted)
            .then(|| format!("rolled back to {}", primary.revision_id))
    }
}

/// The orchestration control plane, as consumed by the deployment driver.
#[allow(async_fn_in_trait)]
pub trait ControlPlane: Send + Sync {
    /// Register `document` as a new immutable revision of its family.
    async fn register_definition(
        &self,
        document: &str,
    ) -> Result<RegisteredRevision, ControlPlaneError>;

    /// Point the service at `revision_id`; returns the rollout's operation id.
    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        revision_id: &str,
        force_new_deployment: bool,
    ) -> Result<String, ControlPlaneError>;

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceStatus, ControlPlaneError>;
}

impl<T: ControlPlane> ControlPlane for &T {
    async fn register_definition(
        &self,
        document: &str,
    ) -> Result<RegisteredRevision, ControlPlaneError> {
        (**self).register_definition(document).await
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        revision_id: &str,
        force_new_deployment: bool,
    ) -> Result<String, ControlPlaneError> {
        (**self)
            .update_service(cluster, service, revision_id, force_new_deployment)
            .await
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceStatus, ControlPlaneError> {
        (**self).describe_service(cluster, service).await
    }
}

/// ECS through the `aws` CLI.
pub struct EcsControlPlane<E: ToolExecutor> {
    executor: E,
    region: String,
}

impl<E: ToolExecutor> EcsControlPlane<E> {
    pub fn new(executor: E, region: &str) -> Self {
        Self {
            executor,
            region: region.to_owned(),
        }
    }

    async fn ecs(&self, operation: &'static str, extra: &[&str]) -> Result<String, ControlPlaneError> {
        let mut cmd = args(["ecs", operation, "--region", &self.region, "--output", "json"]);
        cmd.extend(extra.iter().map(|s| (*s).to_owned()));

        self.executor
            .exec(Tool::Aws, &cmd)
            .await
            .map_err(|e| match e {
                ToolError::CommandFailed { stderr, .. } => ControlPlaneError::Rejected {
                    operation,
                    body: stderr.trim().to_owned(),
                },
                other => ControlPlaneError::Tool {
                    operation,
                    source: other,
                },
            })
    }
}

impl<E: ToolExecutor> ControlPlane for EcsControlPlane<E> {
    async fn register_definition(
        &self,
        document: &str,
    ) -> Result<RegisteredRevision, ControlPlaneError> {
        const OP: &str = "register-task-definition";
        let output = self.ecs(OP, &["--cli-input-json", document]).await?;
        let parsed: RegisterOutput = parse(OP, &output)?;

        Ok(RegisteredRevision {
            id: parsed.task_definition.task_definition_arn,
            family: parsed.task_definition.family,
            revision: parsed.task_definition.revision,
        })
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        revision_id: &str,
        force_new_deployment: bool,
    ) -> Result<String, ControlPlaneError> {
        const OP: &str = "update-service";
        let mut extra = vec![
            "--cluster",
            cluster,
            "--service",
            service,
            "--task-definition",
            revision_id,
        ];
        if force_new_deployment {
            extra.push("--force-new-deployment");
        }

        let output = self.ecs(OP, &extra).await?;
        let parsed: UpdateOutput = parse(OP, &output)?;

        let primary = parsed
            .service
            .deployments
            .iter()
            .find(|d| d.status == "PRIMARY")
            .ok_or_else(|| ControlPlaneError::Malformed {
                operation: OP,
                detail: "no PRIMARY deployment in response".to_owned(),
            })?;
        Ok(primary.id.clone())
    }

    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<ServiceStatus, ControlPlaneError> {
        const OP: &str = "describe-services";
        let output = self
            .ecs(OP, &["--cluster", cluster, "--services", service])
            .await?;
        let parsed: DescribeOutput = parse(OP, &output)?;

        if let Some(failure) = parsed.failures.first() {
            return Err(ControlPlaneError::Rejected {
                operation: OP,
                body: format!(
                    "{}: {}",
                    failure.arn.as_deref().unwrap_or(service),
                    failure.reason.as_deref().unwrap_or("unknown failure")
                ),
            });
        }

        let svc = parsed
            .services
            .into_iter()
            .next()
            .ok_or_else(|| ControlPlaneError::Rejected {
                operation: OP,
                body: format!("service '{service}' not found in cluster '{cluster}'"),
            })?;

        Ok(ServiceStatus {
            running_count: svc.running_count,
            desired_count: svc.desired_count,
            revision_id: svc.task_definition,
            deployments: svc
                .deployments
                .into_iter()
                .map(|d| ServiceDeployment {
                    id: d.id,
                    status: d.status,
                    revision_id: d.task_definition,
                    running_count: d.running_count,
                    desired_count: d.desired_count,
                    rollout_state: d.rollout_state,
                    rollout_state_reason: d.rollout_state_reason,
                })
                .collect(),
        })
    }
}

fn parse<'a, T: Deserialize<'a>>(operation: &'static str, output: &'a str) -> Result<T, ControlPlaneError> {
    serde_json::from_str(output).map_err(|e| ControlPlaneError::Malformed {
        operation,
        detail: e.to_string(),
    })
}

// ── Wire types ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterOutput {
    task_definition: TaskDefinition,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDefinition {
    task_definition_arn: String,
    family: String,
    revision: u64,
}

#[derive(Deserialize)]
struct UpdateOutput {
    service: EcsService,
}

#[derive(Deserialize)]
struct DescribeOutput {
    #[serde(default)]
    services: Vec<EcsService>,
    #[serde(default)]
    failures: Vec<EcsFailure>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsService {
    #[serde(default)]
    running_count: u32,
    #[serde(default)]
    desired_count: u32,
    task_definition: String,
    #[serde(default)]
    deployments: Vec<EcsDeployment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EcsDeployment {
    id: String,
    status: String,
    task_definition: String,
    #[serde(default)]
    running_count: u32,
    #[serde(default)]
    desired_count: u32,
    rollout_state: Option<String>,
    rollout_state_reason: Option<String>,
}

#[derive(Deserialize)]
struct EcsFailure {
    arn: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    #[error("control plane rejected {operation}: {body}")]
    Rejected {
        operation: &'static str,
        body: String,
    },

    #[error("could not run {operation}")]
    Tool {
        operation: &'static str,
        source: ToolError,
    },

    #[error("unexpected {operation} response: {detail}")]
    Malformed {
        operation: &'static str,
        detail: String,
    },
}

impl ControlPlaneError {
    /// Error body returned by the control plane, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Rejected { body, .. } => Some(body),
            _ => None,
        }
    }
}
