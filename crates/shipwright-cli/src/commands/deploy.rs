use std::path::{Path, PathBuf};

use shipwright::{Environment, PipelineCoordinator, Revision};
use shipwright_build::{head_revision, is_dirty};
use shipwright_cloud::RealExecutor;

pub struct DeployArgs {
    pub environment: Environment,
    pub revision: Option<String>,
    pub timeout: Option<u64>,
    pub dry_run: bool,
    pub output: Option<PathBuf>,
    pub allow_dirty: bool,
}

/// Execute the deploy pipeline, or only its patch step with `--dry-run`.
pub async fn deploy(project_dir: &Path, args: DeployArgs) -> anyhow::Result<()> {
    let config = super::load_config(project_dir, args.timeout)?;
    config.target(args.environment)?;

    // An explicit revision is taken as given; only HEAD is checked against the tree.
    let (revision, from_head) = match args.revision.as_deref() {
        Some(raw) => (Revision::parse(raw)?, false),
        None => (head_revision(project_dir)?, true),
    };

    if args.dry_run {
        let context = super::context(project_dir, config)?;
        let definition = shipwright::dry_run(&context, args.environment, &revision)?;
        match args.output {
            Some(path) => {
                definition.write_to(&path)?;
                eprintln!("Wrote patched definition to {}", path.display());
            }
            None => println!("{}", definition.as_str()),
        }
        return Ok(());
    }

    // Dirty check: the image would not match the revision it is tagged with
    if from_head && !args.allow_dirty && is_dirty(project_dir)? {
        anyhow::bail!(
            "uncommitted changes detected.\n\
             Commit your changes, or use `shipwright deploy --allow-dirty` to deploy anyway."
        );
    }

    let context = super::context(project_dir, config)?;
    let coordinator =
        PipelineCoordinator::deploy(RealExecutor, context, args.environment, revision.clone())?;

    println!(
        "Deploying {revision} to {} ({}/{})",
        args.environment,
        coordinator.target().cluster,
        coordinator.target().service,
    );

    let outcome = super::run_to_completion(&coordinator).await?;

    println!();
    if let Some(published) = &outcome.published {
        println!("Image:    {}", published.deployable());
        if published.already_present {
            println!("          (already in registry, push skipped)");
        }
        if !published.latest_pushed {
            println!("          (latest tag not updated)");
        }
    }
    println!("Revision: {}", outcome.deployment.revision_id);
    println!(
        "Running:  {}/{}",
        outcome.deployment.status.running_count, outcome.deployment.status.desired_count
    );

    Ok(())
}
