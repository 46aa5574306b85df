use std::path::Path;

use shipwright::{Environment, RuntimeEnv, ShipwrightConfig};
use shipwright_cloud::{ControlPlane, EcsControlPlane, RealExecutor};

pub async fn status(project_dir: &Path, environment: Environment) -> anyhow::Result<()> {
    let config = ShipwrightConfig::load(project_dir)?;
    let target = config.target(environment)?;
    let runtime = RuntimeEnv::load()?;

    let control_plane = EcsControlPlane::new(RealExecutor, &runtime.region);
    let status = control_plane
        .describe_service(&target.cluster, &target.service)
        .await?;

    println!("{environment}: {}/{}", target.cluster, target.service);
    println!("  revision  {}", status.revision_id);
    println!(
        "  running   {}/{}",
        status.running_count, status.desired_count
    );
    if !status.deployments.is_empty() {
        println!("  deployments:");
        for d in &status.deployments {
            println!(
                "    {:<8} {:<10} {}/{}  {}",
                d.status,
                d.rollout_state.as_deref().unwrap_or("-"),
                d.running_count,
                d.desired_count,
                d.revision_id,
            );
            if let Some(reason) = &d.rollout_state_reason {
                println!("             {reason}");
            }
        }
    }
    Ok(())
}
