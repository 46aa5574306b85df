use std::path::PathBuf;

use shipwright_build::ResourceDefinition;
use shipwright_cloud::{ArtifactBuilder, EcsControlPlane, RegistryPublisher, RetryPolicy, ToolExecutor};
use shipwright_core::{
    ArtifactReference, DeploymentTarget, Environment, PipelineRun, PublishedReference, Revision,
    RunKind, RuntimeEnv, ShipwrightConfig, Stage,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::driver::{DeploymentDriver, DeploymentResult};
use crate::error::PipelineError;
use crate::lease::LeaseManager;

/// Everything a run reads but never changes.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub project_dir: PathBuf,
    pub config: ShipwrightConfig,
    pub runtime: RuntimeEnv,
}

impl PipelineContext {
    /// Resolve the target and image reference for `environment`/`revision`
    /// without touching anything outside the process.
    fn artifact(
        &self,
        environment: Environment,
        revision: &Revision,
    ) -> Result<ArtifactReference, PipelineError> {
        let repository = self
            .runtime
            .repository_for(&self.config, environment)
            .map_err(|source| PipelineError::Config { source })?;
        Ok(ArtifactReference::new(
            self.runtime.registry_host(),
            repository,
            self.config.image_tag(revision, environment),
        ))
    }

    fn target(&self, environment: Environment) -> Result<DeploymentTarget, PipelineError> {
        self.config
            .target(environment)
            .map_err(|source| PipelineError::Config { source })
    }

    fn patch(
        &self,
        target: &DeploymentTarget,
        published: &PublishedReference,
    ) -> Result<ResourceDefinition, PipelineError> {
        let template = self
            .config
            .template_path(&self.project_dir, target.environment);
        let definition =
            shipwright_build::patch(&template, &self.config.project.container_name, published)?;
        definition.ensure_family(target)?;
        Ok(definition)
    }
}

/// Patch the environment's template as a deploy of `revision` would,
/// with no network or control-plane side effects.
pub fn dry_run(
    context: &PipelineContext,
    environment: Environment,
    revision: &Revision,
) -> Result<ResourceDefinition, PipelineError> {
    let target = context.target(environment)?;
    let published = PublishedReference {
        artifact: context.artifact(environment, revision)?,
        already_present: false,
        latest_pushed: false,
    };
    context.patch(&target, &published)
}

#[derive(Debug, Clone)]
enum Request {
    Deploy(Revision),
    Rollback(String),
}

/// Final state of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run: PipelineRun,
    /// Absent for rollbacks
    pub published: Option<PublishedReference>,
    pub deployment: DeploymentResult,
}

/// Drives one [`PipelineRun`] to a terminal stage.
///
/// The coordinator is the only writer of its run; observers get snapshots
/// through [`PipelineCoordinator::subscribe`]. Stages execute strictly in
/// sequence and cancellation is checked at each stage boundary.
pub struct PipelineCoordinator<E: ToolExecutor> {
    executor: E,
    context: PipelineContext,
    target: DeploymentTarget,
    request: Request,
    leases: LeaseManager,
    run: watch::Sender<PipelineRun>,
    cancel: CancellationToken,
}

impl<E: ToolExecutor> PipelineCoordinator<E> {
    /// A run that builds, publishes, patches and deploys `revision`.
    pub fn deploy(
        executor: E,
        context: PipelineContext,
        environment: Environment,
        revision: Revision,
    ) -> Result<Self, PipelineError> {
        // Fail on configuration before a lease is ever taken.
        context.artifact(environment, &revision)?;
        let run = PipelineRun::new(RunKind::Deploy, environment, revision.as_str());
        Self::with_request(executor, context, environment, Request::Deploy(revision), run)
    }

    /// A run that rolls the environment back to a registered revision.
    pub fn rollback(
        executor: E,
        context: PipelineContext,
        environment: Environment,
        revision_id: &str,
    ) -> Result<Self, PipelineError> {
        let run = PipelineRun::new(RunKind::Rollback, environment, revision_id);
        Self::with_request(
            executor,
            context,
            environment,
            Request::Rollback(revision_id.to_owned()),
            run,
        )
    }

    fn with_request(
        executor: E,
        context: PipelineContext,
        environment: Environment,
        request: Request,
        run: PipelineRun,
    ) -> Result<Self, PipelineError> {
        let target = context.target(environment)?;
        let leases = LeaseManager::from_config(&context.project_dir, &context.config.lease);
        let (run, _) = watch::channel(run);
        Ok(Self {
            executor,
            context,
            target,
            request,
            leases,
            run,
            cancel: CancellationToken::new(),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<PipelineRun> {
        self.run.subscribe()
    }

    pub fn snapshot(&self) -> PipelineRun {
        self.run.borrow().clone()
    }

    /// Token that cancels this run at its next stage boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn target(&self) -> &DeploymentTarget {
        &self.target
    }

    /// Run to a terminal stage.
    ///
    /// The environment's lease is held from before `BUILDING` until the
    /// run is terminal.
    pub async fn run(&self) -> Result<PipelineOutcome, PipelineError> {
        let run_id = self.run.borrow().id.clone();
        let environment = self.target.environment;

        let lease = match self.leases.acquire(environment, &run_id, &self.cancel).await {
            Ok(lease) => lease,
            Err(e) => {
                self.finish_failed(&e);
                return Err(e);
            }
        };

        let result = match &self.request {
            Request::Deploy(revision) => self.run_deploy(revision).await,
            Request::Rollback(revision_id) => self.run_rollback(revision_id).await,
        };

        let outcome = match result {
            Ok((published, deployment)) => match self.enter(Stage::Succeeded) {
                Ok(()) => Ok(PipelineOutcome {
                    run: self.snapshot(),
                    published,
                    deployment,
                }),
                Err(e) => Err(e),
            },
            Err(e) => {
                self.finish_failed(&e);
                Err(e)
            }
        };

        drop(lease);
        outcome
    }

    async fn run_deploy(
        &self,
        revision: &Revision,
    ) -> Result<(Option<PublishedReference>, DeploymentResult), PipelineError> {
        let context = &self.context;
        let environment = self.target.environment;
        let artifact = context.artifact(environment, revision)?;

        self.enter(Stage::Building)?;
        let builder = ArtifactBuilder::new(
            &self.executor,
            &context.project_dir,
            &context.config.build,
            &artifact.registry,
            &artifact.repository,
            &context.config.registry.tag_template,
        );
        let built = builder.build(revision, environment).await?;

        self.enter(Stage::Publishing)?;
        let publisher = RegistryPublisher::new(
            &self.executor,
            &context.runtime.region,
            RetryPolicy::from(&context.config.registry),
            context.config.registry.push_latest,
        );
        let published = publisher.publish(&built).await?;

        self.enter(Stage::Patching)?;
        let definition = context.patch(&self.target, &published)?;

        self.enter(Stage::Deploying)?;
        let deployment = self
            .driver()
            .deploy(&definition, &self.target, &self.cancel)
            .await?;

        Ok((Some(published), deployment))
    }

    async fn run_rollback(
        &self,
        revision_id: &str,
    ) -> Result<(Option<PublishedReference>, DeploymentResult), PipelineError> {
        self.enter(Stage::Deploying)?;
        let deployment = self
            .driver()
            .roll_out(revision_id, &self.target, &self.cancel)
            .await?;
        Ok((None, deployment))
    }

    fn driver(&self) -> DeploymentDriver<EcsControlPlane<&E>> {
        DeploymentDriver::from_config(
            EcsControlPlane::new(&self.executor, &self.context.runtime.region),
            &self.context.config.deploy,
        )
    }

    /// Cross a stage boundary, honouring cancellation first.
    fn enter(&self, next: Stage) -> Result<(), PipelineError> {
        if !next.is_terminal() && self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled {
                stage: self.run.borrow().stage,
            });
        }
        self.record(next, None)
    }

    fn finish_failed(&self, error: &PipelineError) {
        let terminal = match error {
            PipelineError::DeploymentTimedOut { .. } => Stage::TimedOut,
            _ => Stage::Failed,
        };
        if let Err(e) = self.record(terminal, Some(error)) {
            tracing::error!(error = %e, cause = %error, "could not record run failure");
        }
    }

    fn record(&self, next: Stage, failure: Option<&PipelineError>) -> Result<(), PipelineError> {
        let mut result = Ok(());
        self.run.send_modify(|run| match run.advance(next) {
            Ok(t) => {
                let (from, to) = (t.from, t.to);
                if let Some(error) = failure {
                    run.failure = Some(error.kind().to_owned());
                }
                tracing::info!(
                    run_id = %run.id,
                    environment = %run.environment,
                    revision = %run.revision,
                    %from,
                    %to,
                    failure = failure.map(PipelineError::kind),
                    "stage transition"
                );
            }
            Err(source) => result = Err(PipelineError::Internal { source }),
        });
        result
    }
}
