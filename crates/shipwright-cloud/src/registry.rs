use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use shipwright_core::{ArtifactReference, PublishedReference};

use crate::executor::{ToolExecutor, args};
use crate::retry::RetryPolicy;
use crate::tool::{Tool, ToolError};

const REGISTRY_USERNAME: &str = "AWS";

/// Short-lived registry credentials. Held only for the duration of one publish.
pub struct RegistryCredentials {
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// How a failed registry interaction should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Credentials rejected or expired; refresh and retry
    Auth,
    /// Network or server-side; retry as is
    Transient,
    /// Retrying cannot help
    Permanent,
}

const AUTH_MARKERS: &[&str] = &[
    "unauthorized",
    "denied",
    "no basic auth credentials",
    "authorization token has expired",
    "expiredtoken",
    "unable to locate credentials",
];

const TRANSIENT_MARKERS: &[&str] = &[
    "internal server error",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "unexpected eof",
    "tls handshake",
    "toomanyrequests",
    "throttl",
];

/// An HTTP status code reported in context, e.g. `HTTP status: 502` or
/// `HTTP 403 response`. Bare digit runs (account ids, layer digests) never match.
static STATUS_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:status(?:\s+code)?|http(?:/\d(?:\.\d)?)?)\W{0,3}([1-5]\d{2})\b")
        .unwrap_or_else(|e| panic!("STATUS_CODE pattern failed to compile: {e}"))
});

/// Classify a tool failure from its error output.
///
/// Only stderr is inspected: `docker push` progress on stdout carries the
/// registry host and layer ids, which say nothing about the failure.
pub fn classify(err: &ToolError) -> FailureClass {
    match err {
        ToolError::NotFound { .. } | ToolError::InvalidUtf8 { .. } => FailureClass::Permanent,
        ToolError::StdinWrite { .. } => FailureClass::Transient,
        ToolError::CommandFailed { stderr, .. } => {
            let text = stderr.to_ascii_lowercase();
            if let Some(code) = STATUS_CODE.captures(&text).and_then(|c| c.get(1)) {
                return classify_status(code.as_str());
            }
            if AUTH_MARKERS.iter().any(|m| text.contains(m)) {
                FailureClass::Auth
            } else if TRANSIENT_MARKERS.iter().any(|m| text.contains(m)) {
                FailureClass::Transient
            } else {
                FailureClass::Permanent
            }
        }
    }
}

fn classify_status(code: &str) -> FailureClass {
    match code {
        "401" | "403" => FailureClass::Auth,
        "408" | "429" => FailureClass::Transient,
        c if c.starts_with('5') => FailureClass::Transient,
        _ => FailureClass::Permanent,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Push the revision tag unless the registry already has it
    Immutable,
    /// Move `latest` to the artifact
    Latest,
}

/// Pushes built images to the remote registry.
pub struct RegistryPublisher<E: ToolExecutor> {
    executor: E,
    region: String,
    policy: RetryPolicy,
    push_latest: bool,
}

impl<E: ToolExecutor> RegistryPublisher<E> {
    pub fn new(executor: E, region: &str, policy: RetryPolicy, push_latest: bool) -> Self {
        Self {
            executor,
            region: region.to_owned(),
            policy,
            push_latest,
        }
    }

    /// Fetch short-lived credentials from the platform's identity service.
    pub async fn credentials(&self) -> Result<RegistryCredentials, ToolError> {
        let password = self
            .executor
            .exec(
                Tool::Aws,
                &args(["ecr", "get-login-password", "--region", &self.region]),
            )
            .await?;

        Ok(RegistryCredentials {
            username: REGISTRY_USERNAME.to_owned(),
            password: SecretString::from(password.trim().to_owned()),
        })
    }

    pub async fn login(
        &self,
        registry: &str,
        credentials: &RegistryCredentials,
    ) -> Result<(), ToolError> {
        self.executor
            .exec_with_stdin(
                Tool::Docker,
                &args([
                    "login",
                    "--username",
                    &credentials.username,
                    "--password-stdin",
                    registry,
                ]),
                credentials.password.expose_secret().as_bytes(),
            )
            .await?;
        Ok(())
    }

    /// Whether the registry already holds `artifact`'s tag.
    pub async fn tag_exists(&self, artifact: &ArtifactReference) -> Result<bool, ToolError> {
        let image_id = format!("imageTag={}", artifact.tag);
        let result = self
            .executor
            .exec(
                Tool::Aws,
                &args([
                    "ecr",
                    "describe-images",
                    "--region",
                    &self.region,
                    "--repository-name",
                    &artifact.repository,
                    "--image-ids",
                    &image_id,
                    "--output",
                    "json",
                ]),
            )
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.stderr().is_some_and(|s| s.contains("ImageNotFoundException")) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Publish `artifact` under its immutable tag, then best-effort `latest`.
    ///
    /// An immutable tag already present in the registry is never pushed again.
    pub async fn publish(
        &self,
        artifact: &ArtifactReference,
    ) -> Result<PublishedReference, PublishError> {
        let mut credentials = None;

        let already_present = self
            .with_retry(Step::Immutable, artifact, &mut credentials)
            .await
            .map_err(|(source, attempts)| PublishError::Failed {
                image: artifact.image(),
                attempts,
                source,
            })?;

        if already_present {
            tracing::info!(image = %artifact, "immutable tag already in registry, skipping push");
        }

        let latest_pushed = if self.push_latest {
            match self.with_retry(Step::Latest, artifact, &mut credentials).await {
                Ok(_) => true,
                Err((e, attempts)) => {
                    tracing::warn!(
                        image = %artifact.with_tag(shipwright_core::LATEST_TAG),
                        attempts,
                        error = %e,
                        "could not move latest tag; deploy continues with the immutable tag"
                    );
                    false
                }
            }
        } else {
            false
        };

        Ok(PublishedReference {
            artifact: artifact.clone(),
            already_present,
            latest_pushed,
        })
    }

    async fn with_retry(
        &self,
        step: Step,
        artifact: &ArtifactReference,
        credentials: &mut Option<RegistryCredentials>,
    ) -> Result<bool, (ToolError, u32)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.attempt(step, artifact, credentials).await {
                Ok(present) => {
                    if attempt > 1 {
                        tracing::info!(?step, attempt, "registry push succeeded after retry");
                    }
                    return Ok(present);
                }
                Err(e) => e,
            };

            let class = classify(&err);
            if class == FailureClass::Auth {
                *credentials = None;
            }
            if class == FailureClass::Permanent || !self.policy.allows_retry(attempt) {
                return Err((err, attempt));
            }

            let delay = self.policy.delay_after(attempt);
            tracing::warn!(
                ?step,
                attempt,
                max_attempts = self.policy.max_attempts,
                ?class,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "registry operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(
        &self,
        step: Step,
        artifact: &ArtifactReference,
        credentials: &mut Option<RegistryCredentials>,
    ) -> Result<bool, ToolError> {
        if credentials.is_none() {
            let fresh = self.credentials().await?;
            self.login(&artifact.registry, &fresh).await?;
            *credentials = Some(fresh);
        }

        match step {
            Step::Immutable => {
                if self.tag_exists(artifact).await? {
                    return Ok(true);
                }
                self.push(&artifact.image()).await?;
                Ok(false)
            }
            Step::Latest => {
                let latest = artifact.with_tag(shipwright_core::LATEST_TAG).image();
                self.executor
                    .exec(Tool::Docker, &args(["tag", &artifact.image(), &latest]))
                    .await?;
                self.push(&latest).await?;
                Ok(false)
            }
        }
    }

    async fn push(&self, image: &str) -> Result<(), ToolError> {
        tracing::info!(image, "pushing image");
        self.executor
            .exec(Tool::Docker, &args(["push", image]))
            .await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publishing {image} failed after {attempts} attempt(s)")]
    Failed {
        image: String,
        attempts: u32,
        source: ToolError,
    },
}

impl PublishError {
    /// Output of the last failed registry command.
    pub fn diagnostics(&self) -> Option<String> {
        match self {
            Self::Failed { source, .. } => source.output(),
        }
    }
}
