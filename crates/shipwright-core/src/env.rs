use crate::config::ShipwrightConfig;
use crate::model::Environment;

/// Account and region identifiers read once at startup.
///
/// Locally reads from `.env` via dotenvy, in CI from the build environment.
/// Treated as immutable for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEnv {
    pub account_id: String,
    pub region: String,
    /// Default image repository (`IMAGE_REPO_NAME`)
    pub repository: Option<String>,
}

impl RuntimeEnv {
    /// Load from process environment variables.
    pub fn load() -> crate::Result<Self> {
        let dotenv_loaded = dotenvy::dotenv().is_ok();
        tracing::debug!(dotenv = dotenv_loaded, "loading runtime environment");

        // arch-lint: allow(no-silent-result-drop) reason="an unset variable is reported as MissingEnvVar by from_lookup"
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let account_id =
            non_empty("AWS_ACCOUNT_ID").ok_or(crate::Error::MissingEnvVar("AWS_ACCOUNT_ID"))?;
        let region = non_empty("AWS_DEFAULT_REGION")
            .or_else(|| non_empty("AWS_REGION"))
            .ok_or(crate::Error::MissingEnvVar("AWS_DEFAULT_REGION"))?;
        let repository = non_empty("IMAGE_REPO_NAME");

        Ok(Self {
            account_id,
            region,
            repository,
        })
    }

    /// `{account}.dkr.ecr.{region}.amazonaws.com`
    pub fn registry_host(&self) -> String {
        format!(
            "{account}.dkr.ecr.{region}.amazonaws.com",
            account = self.account_id,
            region = self.region,
        )
    }

    /// Repository for `env`: the environment override, else `IMAGE_REPO_NAME`.
    pub fn repository_for(&self, config: &ShipwrightConfig, env: Environment) -> crate::Result<String> {
        config
            .environments
            .get(env.as_str())
            .and_then(|e| e.repository.clone())
            .or_else(|| self.repository.clone())
            .ok_or_else(|| crate::Error::MissingRepository {
                environment: env.as_str().to_owned(),
            })
    }
}
