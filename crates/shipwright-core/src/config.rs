use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{DeploymentTarget, Environment, Revision};

pub const CONFIG_FILE: &str = "shipwright.toml";

/// shipwright.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipwrightConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub deploy: DeployConfig,
    #[serde(default)]
    pub lease: LeaseConfig,
    /// Keyed by environment name (`development`, `staging`, `production`).
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name, used in log output only
    pub name: Option<String>,
    /// Container entry whose image is replaced on deploy
    #[serde(default = "default_container_name")]
    pub container_name: String,
    /// Directory holding `{environment}/definition.json` templates
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Build context passed to the build tool
    #[serde(default = "default_context")]
    pub context: PathBuf,
    /// Dockerfile path, relative to the project directory
    #[serde(default = "default_dockerfile")]
    pub dockerfile: PathBuf,
    /// Extra `--build-arg` values
    #[serde(default)]
    pub build_args: HashMap<String, String>,
    /// Name of the build argument that receives the environment name
    #[serde(default = "default_environment_arg")]
    pub environment_arg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Immutable tag format; `{revision}` and `{environment}` are substituted
    #[serde(default = "default_tag_template")]
    pub tag_template: String,
    /// Also move the mutable `latest` tag (best-effort)
    #[serde(default = "default_true")]
    pub push_latest: bool,
    /// Push attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on each subsequent one
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    /// Upper bound for a single retry delay
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// How long to wait for the rollout to converge
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Interval between service status polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaseMode {
    /// Block until the holder releases the environment (bounded by `wait_timeout_secs`)
    Wait,
    /// Fail immediately with lock contention
    FailFast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Directory for per-environment lock files
    #[serde(default = "default_lease_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_lease_mode")]
    pub mode: LeaseMode,
    #[serde(default = "default_wait_timeout_secs")]
    pub wait_timeout_secs: u64,
    #[serde(default = "default_lease_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub cluster: String,
    pub service: String,
    /// Definition family registered on each deploy
    pub family: String,
    /// Overrides `IMAGE_REPO_NAME` for this environment
    #[serde(default)]
    pub repository: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            container_name: default_container_name(),
            template_dir: default_template_dir(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            context: default_context(),
            dockerfile: default_dockerfile(),
            build_args: HashMap::new(),
            environment_arg: default_environment_arg(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            tag_template: default_tag_template(),
            push_latest: true,
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            dir: default_lease_dir(),
            mode: default_lease_mode(),
            wait_timeout_secs: default_wait_timeout_secs(),
            poll_interval_ms: default_lease_poll_interval_ms(),
        }
    }
}

impl ShipwrightConfig {
    /// Load from shipwright.toml at the given path, or return defaults if not found.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            let config: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> crate::Result<()> {
        if !self.registry.tag_template.contains("{revision}") {
            return Err(crate::Error::InvalidTagTemplate {
                template: self.registry.tag_template.clone(),
            });
        }
        if self.deploy.poll_interval_secs == 0 {
            return Err(crate::Error::ZeroInterval {
                key: "deploy.poll_interval_secs",
            });
        }
        if self.lease.poll_interval_ms == 0 {
            return Err(crate::Error::ZeroInterval {
                key: "lease.poll_interval_ms",
            });
        }
        if let Some(unknown) = self
            .environments
            .keys()
            .find(|name| !Environment::ALL.iter().any(|e| e.as_str() == name.as_str()))
        {
            return Err(crate::Error::UnknownEnvironment(unknown.clone()));
        }
        Ok(())
    }

    pub fn environment(&self, env: Environment) -> crate::Result<&EnvironmentConfig> {
        self.environments
            .get(env.as_str())
            .ok_or_else(|| crate::Error::EnvironmentNotConfigured(env.as_str().to_owned()))
    }

    pub fn target(&self, env: Environment) -> crate::Result<DeploymentTarget> {
        let cfg = self.environment(env)?;
        Ok(DeploymentTarget {
            environment: env,
            cluster: cfg.cluster.clone(),
            service: cfg.service.clone(),
            family: cfg.family.clone(),
        })
    }

    /// `{project_dir}/{template_dir}/{environment}/definition.json`
    pub fn template_path(&self, project_dir: &Path, env: Environment) -> PathBuf {
        project_dir
            .join(&self.project.template_dir)
            .join(env.as_str())
            .join("definition.json")
    }

    /// The immutable tag an artifact for `revision` is published under.
    pub fn image_tag(&self, revision: &Revision, env: Environment) -> String {
        render_tag(&self.registry.tag_template, revision, env)
    }
}

/// Substitute `{revision}` and `{environment}` into a tag template.
pub fn render_tag(template: &str, revision: &Revision, env: Environment) -> String {
    template
        .replace("{revision}", revision.as_str())
        .replace("{environment}", env.as_str())
}

impl RegistryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl DeployConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl LeaseConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_container_name() -> String {
    "app".to_owned()
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("deploy")
}

fn default_context() -> PathBuf {
    PathBuf::from(".")
}

fn default_dockerfile() -> PathBuf {
    PathBuf::from("Dockerfile")
}

fn default_environment_arg() -> String {
    "ENVIRONMENT".to_owned()
}

fn default_tag_template() -> String {
    "{revision}".to_owned()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    2
}

fn default_max_delay_secs() -> u64 {
    30
}

fn default_timeout_secs() -> u64 {
    600
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_lease_dir() -> PathBuf {
    PathBuf::from(".shipwright/leases")
}

fn default_lease_mode() -> LeaseMode {
    LeaseMode::FailFast
}

fn default_wait_timeout_secs() -> u64 {
    300
}

fn default_lease_poll_interval_ms() -> u64 {
    500
}
