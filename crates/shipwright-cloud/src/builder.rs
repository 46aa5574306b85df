use std::path::{Path, PathBuf};

use shipwright_core::config::render_tag;
use shipwright_core::{ArtifactReference, BuildConfig, Environment, Revision};

use crate::executor::ToolExecutor;
use crate::tool::{Tool, ToolError};

/// Builds the application image with the container build tool.
///
/// The image is tagged with its final registry reference so the publisher
/// can push it without re-tagging.
pub struct ArtifactBuilder<E: ToolExecutor> {
    executor: E,
    project_dir: PathBuf,
    config: BuildConfig,
    registry: String,
    repository: String,
    tag_template: String,
}

impl<E: ToolExecutor> ArtifactBuilder<E> {
    pub fn new(
        executor: E,
        project_dir: &Path,
        config: &BuildConfig,
        registry: &str,
        repository: &str,
        tag_template: &str,
    ) -> Self {
        Self {
            executor,
            project_dir: project_dir.to_path_buf(),
            config: config.clone(),
            registry: registry.to_owned(),
            repository: repository.to_owned(),
            tag_template: tag_template.to_owned(),
        }
    }

    /// The reference `build` will produce for this revision and environment.
    pub fn artifact_for(&self, revision: &Revision, environment: Environment) -> ArtifactReference {
        ArtifactReference::new(
            &self.registry,
            &self.repository,
            render_tag(&self.tag_template, revision, environment),
        )
    }

    /// Build `revision` for `environment`.
    ///
    /// Rebuilding the same revision and environment yields the same reference.
    pub async fn build(
        &self,
        revision: &Revision,
        environment: Environment,
    ) -> Result<ArtifactReference, BuildError> {
        let artifact = self.artifact_for(revision, environment);
        let cmd = self.build_args(revision, environment, &artifact)?;

        tracing::info!(image = %artifact, "building image");

        self.executor
            .exec(Tool::Docker, &cmd)
            .await
            .map_err(|e| match e.output() {
                Some(output) => BuildError::Failed {
                    image: artifact.image(),
                    output,
                },
                None => BuildError::Tool { source: e },
            })?;

        Ok(artifact)
    }

    fn build_args(
        &self,
        revision: &Revision,
        environment: Environment,
        artifact: &ArtifactReference,
    ) -> Result<Vec<String>, BuildError> {
        let dockerfile = path_arg(&self.project_dir.join(&self.config.dockerfile))?;
        let context = path_arg(&self.project_dir.join(&self.config.context))?;

        let mut cmd = vec![
            "build".to_owned(),
            "--file".to_owned(),
            dockerfile,
            "--build-arg".to_owned(),
            format!("{}={environment}", self.config.environment_arg),
        ];

        // Sorted so identical inputs produce identical invocations.
        let mut extra: Vec<_> = self.config.build_args.iter().collect();
        extra.sort();
        for (key, value) in extra {
            cmd.push("--build-arg".to_owned());
            cmd.push(format!("{key}={value}"));
        }

        cmd.extend([
            "--label".to_owned(),
            format!("org.opencontainers.image.revision={revision}"),
            "--tag".to_owned(),
            artifact.image(),
            context,
        ]);

        Ok(cmd)
    }
}

fn path_arg(path: &Path) -> Result<String, BuildError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| BuildError::InvalidPath(path.to_path_buf()))
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("build path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),

    #[error("image build failed for {image}")]
    Failed { image: String, output: String },

    #[error("could not run the build tool")]
    Tool { source: ToolError },
}

impl BuildError {
    /// Captured build tool output.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::Failed { output, .. } => Some(output),
            _ => None,
        }
    }
}
