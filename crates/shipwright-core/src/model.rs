use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Deployment environments a pipeline may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub const ALL: [Environment; 3] = [
        Environment::Development,
        Environment::Staging,
        Environment::Production,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" | "stage" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(crate::Error::UnknownEnvironment(s.to_owned())),
        }
    }
}

/// Mutable convenience tag. Never deployed.
pub const LATEST_TAG: &str = "latest";

const MAX_REVISION_LEN: usize = 128;

/// Source revision a run is built from, validated to be usable as an image tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Revision(String);

impl Revision {
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let invalid = |reason| crate::Error::InvalidRevision {
            revision: raw.to_owned(),
            reason,
        };

        if raw.is_empty() {
            return Err(invalid("must not be empty"));
        }
        if raw.len() > MAX_REVISION_LEN {
            return Err(invalid("must be at most 128 characters"));
        }
        if raw.starts_with('.') || raw.starts_with('-') {
            return Err(invalid("must not start with '.' or '-'"));
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(invalid("may only contain [A-Za-z0-9_.-]"));
        }
        if raw == LATEST_TAG {
            return Err(invalid("'latest' is reserved for the mutable tag"));
        }

        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Revision {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Revision> for String {
    fn from(value: Revision) -> Self {
        value.0
    }
}

/// Immutable reference to a built image: `{registry}/{repository}:{tag}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactReference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ArtifactReference {
    pub fn new(
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// `{registry}/{repository}` without a tag.
    pub fn repository_uri(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Fully qualified image reference.
    pub fn image(&self) -> String {
        format!("{}:{}", self.repository_uri(), self.tag)
    }

    /// The same repository under a different tag.
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            ..self.clone()
        }
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.image())
    }
}

/// An artifact that exists in the remote registry under its immutable tag.
///
/// Only [`PublishedReference::deployable`] may be handed to the patcher; the
/// `latest` pointer is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedReference {
    pub artifact: ArtifactReference,
    /// True if the immutable tag was already present and the push was skipped.
    pub already_present: bool,
    /// Whether the best-effort `latest` push went through.
    pub latest_pushed: bool,
}

impl PublishedReference {
    pub fn deployable(&self) -> &ArtifactReference {
        &self.artifact
    }

    pub fn latest(&self) -> ArtifactReference {
        self.artifact.with_tag(LATEST_TAG)
    }
}

/// Where an environment deploys to. Static for the lifetime of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    pub environment: Environment,
    pub cluster: String,
    pub service: String,
    pub family: String,
}
