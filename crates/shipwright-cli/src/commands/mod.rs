mod deploy;
mod doctor;
mod init;
mod rollback;
mod status;

use std::path::Path;
use std::process::ExitCode;

use shipwright::{PipelineContext, PipelineCoordinator, PipelineError, RuntimeEnv, ShipwrightConfig};
use shipwright_build::RevisionError;
use shipwright_cloud::ToolExecutor;

pub use deploy::{DeployArgs, deploy};
pub use doctor::doctor;
pub use init::init_project;
pub use rollback::rollback;
pub use status::status;

/// Exit code for configuration and usage errors; matches clap's.
const USAGE: u8 = 2;

/// Print `err` as `error[<Kind>]` with its cause chain and captured
/// diagnostics, and pick the exit code for its kind.
pub fn report(err: &anyhow::Error) -> ExitCode {
    let pipeline = err.downcast_ref::<PipelineError>();
    let (kind, code) = match pipeline {
        Some(e) => (e.kind(), e.exit_code()),
        None => classify(err),
    };

    eprintln!("error[{kind}]: {err}");
    for cause in err.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
    if let Some(diagnostics) = pipeline.and_then(PipelineError::diagnostics) {
        eprintln!();
        for line in diagnostics.lines() {
            eprintln!("  | {line}");
        }
    }

    ExitCode::from(code)
}

fn classify(err: &anyhow::Error) -> (&'static str, u8) {
    if err.downcast_ref::<shipwright_core::Error>().is_some() {
        return ("Config", USAGE);
    }
    match err.downcast_ref::<RevisionError>() {
        Some(RevisionError::Invalid { .. }) => ("Config", USAGE),
        Some(_) => ("Revision", 1),
        None => ("Error", 1),
    }
}

/// Load `shipwright.toml`, optionally overriding the rollout timeout.
fn load_config(project_dir: &Path, timeout: Option<u64>) -> anyhow::Result<ShipwrightConfig> {
    let mut config = ShipwrightConfig::load(project_dir)?;
    if let Some(secs) = timeout {
        config.deploy.timeout_secs = secs;
    }
    Ok(config)
}

fn context(project_dir: &Path, config: ShipwrightConfig) -> anyhow::Result<PipelineContext> {
    Ok(PipelineContext {
        project_dir: project_dir.to_path_buf(),
        config,
        runtime: RuntimeEnv::load()?,
    })
}

/// Run `coordinator` to completion, cancelling at the next stage boundary on Ctrl-C.
async fn run_to_completion<E: ToolExecutor>(
    coordinator: &PipelineCoordinator<E>,
) -> Result<shipwright::PipelineOutcome, PipelineError> {
    let cancel = coordinator.cancellation_token();
    let watcher = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("Interrupt received, stopping at the next stage boundary...");
                cancel.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "could not listen for Ctrl-C"),
        }
    });

    let result = coordinator.run().await;
    watcher.abort();

    let run = coordinator.snapshot();
    println!();
    println!("Run {} ({})", run.id, run.stage);
    for t in &run.transitions {
        println!("  {}  {:<10} → {}", t.at.format("%H:%M:%S"), t.from, t.to);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_usage_errors() {
        let err = anyhow::Error::from(shipwright_core::Error::MissingEnvVar("AWS_ACCOUNT_ID"));
        assert_eq!(classify(&err), ("Config", 2));
    }

    #[test]
    fn unknown_errors_are_generic() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(classify(&err), ("Error", 1));
    }

    #[test]
    fn git_failures_are_not_usage_errors() {
        let err = anyhow::Error::from(RevisionError::GitFailed {
            detail: "not a git repository".to_owned(),
        });
        assert_eq!(classify(&err), ("Revision", 1));
    }
}
