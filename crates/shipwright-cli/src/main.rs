mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use shipwright_core::Environment;

#[derive(Parser)]
#[command(
    name = "shipwright",
    about = "Build, publish and roll out container services to ECS"
)]
#[command(version)]
struct Cli {
    /// Project directory containing shipwright.toml
    #[arg(long, short = 'C', global = true, default_value = ".")]
    project_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold shipwright.toml and per-environment definition templates
    Init,
    /// Build, publish, patch and roll out one revision
    Deploy {
        /// Target environment (development, staging, production)
        #[arg(long, short = 'e')]
        environment: Environment,
        /// Source revision to deploy (default: short git HEAD)
        #[arg(long, short = 'r')]
        revision: Option<String>,
        /// Override [deploy].timeout_secs for convergence polling
        #[arg(long)]
        timeout: Option<u64>,
        /// Only patch the definition template; no build, push or rollout
        #[arg(long)]
        dry_run: bool,
        /// Write the dry-run definition here instead of stdout
        #[arg(long, short = 'o', requires = "dry_run")]
        output: Option<PathBuf>,
        /// Allow deploying with uncommitted changes
        #[arg(long)]
        allow_dirty: bool,
    },
    /// Roll an environment back to an already registered definition revision
    Rollback {
        #[arg(long, short = 'e')]
        environment: Environment,
        /// Definition revision to roll out (e.g. storefront:41 or its ARN)
        #[arg(long)]
        to: String,
        /// Override [deploy].timeout_secs for convergence polling
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the service's rollout state
    Status {
        #[arg(long, short = 'e')]
        environment: Environment,
    },
    /// Check tools, credentials and templates
    Doctor,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let dir = cli.project_dir.as_path();

    let result = match cli.command {
        Commands::Init => commands::init_project(dir),
        Commands::Deploy {
            environment,
            revision,
            timeout,
            dry_run,
            output,
            allow_dirty,
        } => {
            commands::deploy(
                dir,
                commands::DeployArgs {
                    environment,
                    revision,
                    timeout,
                    dry_run,
                    output,
                    allow_dirty,
                },
            )
            .await
        }
        Commands::Rollback {
            environment,
            to,
            timeout,
        } => commands::rollback(dir, environment, &to, timeout).await,
        Commands::Status { environment } => commands::status(dir, environment).await,
        Commands::Doctor => commands::doctor(dir).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => commands::report(&e),
    }
}
