use std::time::Duration;

use shipwright_build::ResourceDefinition;
use shipwright_cloud::{ControlPlane, ControlPlaneError, RegisteredRevision, ServiceStatus};
use shipwright_core::{DeployConfig, DeploymentTarget, Stage};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

/// A rollout that reached the desired count with old tasks drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResult {
    /// Revision the service converged on
    pub revision_id: String,
    /// Set when this deploy registered the revision
    pub registered: Option<RegisteredRevision>,
    pub operation_id: String,
    pub status: ServiceStatus,
    /// Number of status polls until convergence
    pub polls: u32,
}

/// Registers definitions and rolls services out to them.
///
/// Never issues compensating calls: on timeout or cancellation the
/// rollout already requested is left to the control plane.
pub struct DeploymentDriver<C: ControlPlane> {
    control_plane: C,
    timeout: Duration,
    poll_interval: Duration,
}

impl<C: ControlPlane> DeploymentDriver<C> {
    pub fn new(control_plane: C, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            control_plane,
            timeout,
            poll_interval,
        }
    }

    pub fn from_config(control_plane: C, config: &DeployConfig) -> Self {
        Self::new(control_plane, config.timeout(), config.poll_interval())
    }

    /// Register `definition` as a new revision, then roll `target` onto it.
    pub async fn deploy(
        &self,
        definition: &ResourceDefinition,
        target: &DeploymentTarget,
        cancel: &CancellationToken,
    ) -> Result<DeploymentResult, PipelineError> {
        definition.ensure_family(target)?;

        let registered = self
            .control_plane
            .register_definition(definition.as_str())
            .await
            .map_err(|e| rejected("registration refused", e))?;

        tracing::info!(
            environment = %target.environment,
            revision_id = %registered.id,
            family = %registered.family,
            revision = registered.revision,
            "definition registered"
        );

        let mut result = self.roll_out(&registered.id, target, cancel).await?;
        result.registered = Some(registered);
        Ok(result)
    }

    /// Move `target` to an already registered revision and wait for it.
    pub async fn roll_out(
        &self,
        revision_id: &str,
        target: &DeploymentTarget,
        cancel: &CancellationToken,
    ) -> Result<DeploymentResult, PipelineError> {
        let operation_id = self
            .control_plane
            .update_service(&target.cluster, &target.service, revision_id, true)
            .await
            .map_err(|e| rejected("rollout refused", e))?;

        tracing::info!(
            environment = %target.environment,
            cluster = %target.cluster,
            service = %target.service,
            revision_id,
            operation_id = %operation_id,
            "rollout requested"
        );

        let (status, polls) = self.await_convergence(revision_id, target, cancel).await?;

        Ok(DeploymentResult {
            revision_id: revision_id.to_owned(),
            registered: None,
            operation_id,
            status,
            polls,
        })
    }

    async fn await_convergence(
        &self,
        revision_id: &str,
        target: &DeploymentTarget,
        cancel: &CancellationToken,
    ) -> Result<(ServiceStatus, u32), PipelineError> {
        let deadline = Instant::now() + self.timeout;
        let mut polls = 0;
        let mut last_status: Option<String> = None;
        // Set once the service reports `revision_id` as its primary deployment.
        let mut owned_primary = false;

        loop {
            polls += 1;
            match self
                .control_plane
                .describe_service(&target.cluster, &target.service)
                .await
            {
                Ok(status) => {
                    if let Some(reason) = status.rollout_failure(revision_id) {
                        return Err(PipelineError::DeploymentRejected {
                            reason,
                            source: None,
                        });
                    }
                    let primary = status.primary().map(|d| d.revision_id.as_str());
                    match primary {
                        Some(current) if current == revision_id => owned_primary = true,
                        Some(current) if owned_primary => {
                            return Err(PipelineError::DeploymentRejected {
                                reason: format!("superseded by {current}"),
                                source: None,
                            });
                        }
                        _ => {}
                    }
                    if status.has_converged_on(revision_id) {
                        tracing::info!(
                            environment = %target.environment,
                            revision_id,
                            running = status.running_count,
                            desired = status.desired_count,
                            polls,
                            "service converged"
                        );
                        return Ok((status, polls));
                    }
                    tracing::debug!(
                        revision_id,
                        running = status.running_count,
                        desired = status.desired_count,
                        deployments = status.deployments.len(),
                        "waiting for rollout"
                    );
                    last_status = Some(summarize(&status));
                }
                Err(e) => {
                    // Polling is read-only; a failed describe is retried until the deadline.
                    tracing::warn!(revision_id, polls, error = %e, "service status unavailable");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    environment = %target.environment,
                    revision_id,
                    polls,
                    "rollout did not converge before timeout; left in place"
                );
                return Err(PipelineError::DeploymentTimedOut {
                    revision_id: revision_id.to_owned(),
                    timeout: self.timeout,
                    last_status,
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(revision_id, "polling cancelled; rollout left to the control plane");
                    return Err(PipelineError::Cancelled { stage: Stage::Deploying });
                }
                _ = tokio::time::sleep(self.poll_interval.min(deadline - now)) => {}
            }
        }
    }
}

fn rejected(reason: &str, source: ControlPlaneError) -> PipelineError {
    PipelineError::DeploymentRejected {
        reason: reason.to_owned(),
        source: Some(source),
    }
}

fn summarize(status: &ServiceStatus) -> String {
    let mut out = format!(
        "running {}/{} on {}",
        status.running_count, status.desired_count, status.revision_id
    );
    for d in &status.deployments {
        out.push_str(&format!(
            "\n  {} {} {}/{} {}",
            d.status,
            d.revision_id,
            d.running_count,
            d.desired_count,
            d.rollout_state.as_deref().unwrap_or("-"),
        ));
    }
    out
}
