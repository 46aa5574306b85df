use std::path::Path;

use shipwright::{Environment, PipelineCoordinator};
use shipwright_cloud::RealExecutor;

/// Roll `environment` out to an already registered definition revision.
pub async fn rollback(
    project_dir: &Path,
    environment: Environment,
    to: &str,
    timeout: Option<u64>,
) -> anyhow::Result<()> {
    let config = super::load_config(project_dir, timeout)?;
    config.target(environment)?;
    let context = super::context(project_dir, config)?;

    let coordinator = PipelineCoordinator::rollback(RealExecutor, context, environment, to)?;
    println!(
        "Rolling {environment} ({}/{}) back to {to}",
        coordinator.target().cluster,
        coordinator.target().service,
    );

    let outcome = super::run_to_completion(&coordinator).await?;

    println!();
    println!("Revision: {}", outcome.deployment.revision_id);
    println!(
        "Running:  {}/{}",
        outcome.deployment.status.running_count, outcome.deployment.status.desired_count
    );
    Ok(())
}
