use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use serde_json::value::RawValue;
use shipwright_core::{DeploymentTarget, PublishedReference};

const CONTAINERS_KEY: &str = "containerDefinitions";

/// A declarative task definition document.
///
/// Keeps the exact source text alongside the parsed value so that patching
/// rewrites only the bytes of the targeted field.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinition {
    source: String,
    document: Value,
}

impl ResourceDefinition {
    /// Read a definition template from disk.
    pub fn load(path: &Path) -> Result<Self, DefinitionError> {
        let source = std::fs::read_to_string(path).map_err(|e| DefinitionError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(source).map_err(|e| match e {
            DefinitionError::Parse { source, .. } => DefinitionError::Parse {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })
    }

    pub fn parse(source: impl Into<String>) -> Result<Self, DefinitionError> {
        let source = source.into();
        let document =
            serde_json::from_str(&source).map_err(|e| DefinitionError::Parse { path: None, source: e })?;
        Ok(Self { source, document })
    }

    /// The document exactly as it will be submitted.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn as_value(&self) -> &Value {
        &self.document
    }

    pub fn family(&self) -> Option<&str> {
        self.document.get("family").and_then(Value::as_str)
    }

    /// Image of the single container named `name`.
    pub fn container_image(&self, name: &str) -> Option<&str> {
        let matches: Vec<&Value> = self
            .containers()?
            .iter()
            .filter(|c| c.get("name").and_then(Value::as_str) == Some(name))
            .collect();
        match matches.as_slice() {
            [only] => only.get("image").and_then(Value::as_str),
            _ => None,
        }
    }

    fn containers(&self) -> Option<&Vec<Value>> {
        self.document.get(CONTAINERS_KEY).and_then(Value::as_array)
    }

    /// Check the document has the shape the control plane expects.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        let invalid = |reason: String| DefinitionError::Invalid { reason };

        let root = self
            .document
            .as_object()
            .ok_or_else(|| invalid("document root must be an object".to_owned()))?;

        match root.get("family").and_then(Value::as_str) {
            Some(f) if !f.trim().is_empty() => {}
            _ => return Err(invalid("`family` must be a non-empty string".to_owned())),
        }

        let containers = root
            .get(CONTAINERS_KEY)
            .and_then(Value::as_array)
            .ok_or_else(|| invalid(format!("`{CONTAINERS_KEY}` must be an array")))?;
        if containers.is_empty() {
            return Err(invalid(format!("`{CONTAINERS_KEY}` must not be empty")));
        }

        for (i, container) in containers.iter().enumerate() {
            let entry = container
                .as_object()
                .ok_or_else(|| invalid(format!("{CONTAINERS_KEY}[{i}] must be an object")))?;
            match entry.get("name").and_then(Value::as_str) {
                Some(n) if !n.is_empty() => {}
                _ => {
                    return Err(invalid(format!(
                        "{CONTAINERS_KEY}[{i}].name must be a non-empty string"
                    )));
                }
            }
            match entry.get("image").and_then(Value::as_str) {
                Some(img) if !img.is_empty() => {}
                _ => {
                    return Err(invalid(format!(
                        "{CONTAINERS_KEY}[{i}].image must be a non-empty string"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Fail unless the document registers into `target`'s family.
    pub fn ensure_family(&self, target: &DeploymentTarget) -> Result<(), DefinitionError> {
        match self.family() {
            Some(f) if f == target.family => Ok(()),
            found => Err(DefinitionError::Invalid {
                reason: format!(
                    "family {found:?} does not match target family '{}'",
                    target.family
                ),
            }),
        }
    }

    /// Replace the image of the one container named `container_name`.
    pub fn with_image(&self, container_name: &str, image: &str) -> Result<Self, DefinitionError> {
        let span = self.image_span(container_name)?;
        let replacement = serde_json::to_string(image).map_err(|e| DefinitionError::Parse {
            path: None,
            source: e,
        })?;

        let mut source = String::with_capacity(self.source.len() + replacement.len());
        source.push_str(&self.source[..span.start]);
        source.push_str(&replacement);
        source.push_str(&self.source[span.end..]);

        let patched = Self::parse(source)?;
        patched.validate()?;
        if patched.container_image(container_name) != Some(image) {
            return Err(DefinitionError::Invalid {
                reason: format!("container '{container_name}' image was not updated"),
            });
        }
        Ok(patched)
    }

    /// Byte range of the targeted container's `image` value in `source`.
    fn image_span(&self, container_name: &str) -> Result<std::ops::Range<usize>, DefinitionError> {
        #[derive(Deserialize)]
        struct Document<'a> {
            #[serde(rename = "containerDefinitions", borrow)]
            containers: Option<Vec<&'a RawValue>>,
        }

        let invalid = |reason: String| DefinitionError::Invalid { reason };

        let doc: Document<'_> = serde_json::from_str(&self.source)
            .map_err(|e| invalid(format!("`{CONTAINERS_KEY}` is malformed: {e}")))?;
        let containers = doc
            .containers
            .ok_or_else(|| invalid(format!("`{CONTAINERS_KEY}` must be an array")))?;

        let mut matched = Vec::new();
        for raw in containers {
            let fields: HashMap<String, &RawValue> = serde_json::from_str(raw.get())
                .map_err(|e| invalid(format!("container entry is not an object: {e}")))?;
            let name = fields
                .get("name")
                .map(|n| serde_json::from_str::<String>(n.get()))
                .transpose()
                .map_err(|e| invalid(format!("container name is not a string: {e}")))?;
            if name.as_deref() == Some(container_name) {
                matched.push(fields.get("image").copied());
            }
        }

        match matched.as_slice() {
            [] => Err(DefinitionError::TargetNotFound {
                container: container_name.to_owned(),
            }),
            [Some(image)] => {
                let start = image.get().as_ptr() as usize - self.source.as_ptr() as usize;
                Ok(start..start + image.get().len())
            }
            [None] => Err(invalid(format!(
                "container '{container_name}' has no image field"
            ))),
            many => Err(DefinitionError::Ambiguous {
                container: container_name.to_owned(),
                matches: many.len(),
            }),
        }
    }

    /// Write the document text to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), DefinitionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DefinitionError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(path, &self.source).map_err(|e| DefinitionError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Load the environment's template and point `container_name` at the
/// published immutable tag.
///
/// Nothing is written on failure; the caller decides where the result goes.
pub fn patch(
    template_path: &Path,
    container_name: &str,
    published: &PublishedReference,
) -> Result<ResourceDefinition, DefinitionError> {
    let template = ResourceDefinition::load(template_path)?;
    let image = published.deployable().image();

    tracing::debug!(
        template = %template_path.display(),
        container = container_name,
        image = %image,
        "patching resource definition"
    );

    template.with_image(container_name, &image)
}

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("failed to read definition template {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("definition is not valid JSON{}", .path.as_ref().map(|p| format!(" ({})", p.display())).unwrap_or_default())]
    Parse {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },

    #[error("no container named '{container}' in definition")]
    TargetNotFound { container: String },

    #[error("{matches} containers named '{container}' in definition; refusing to guess")]
    Ambiguous { container: String, matches: usize },

    #[error("definition has an invalid shape: {reason}")]
    Invalid { reason: String },

    #[error("failed to write definition to {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
