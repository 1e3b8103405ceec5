//! The model descriptor: the root entity of the registry.
//!
//! Identity is the `(name, version)` pair. A descriptor carries the YANG
//! module references, the raw source files they point at, and the plugin
//! record echoed into registry output. Descriptors serialize to indented
//! JSON with exactly the field names used on the wire and on disk.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// A config model descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub modules: Vec<ModuleRecord>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
    #[serde(default)]
    pub plugin: PluginRecord,
}

/// A reference to a YANG module within a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub name: String,
    pub organization: String,
    pub revision: String,
    pub file: String,
}

/// A raw YANG source file carried by a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub data: Vec<u8>,
}

/// The plugin record carried for registry output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PluginRecord {
    pub name: String,
    pub version: String,
}

impl ModelDescriptor {
    /// Checks the descriptor invariants: non-empty identity fields and a
    /// source file behind every module reference.
    pub fn validate(&self) -> ModelResult<()> {
        if self.name.is_empty() {
            return Err(ModelError::invalid("model name must not be empty"));
        }
        if self.version.is_empty() {
            return Err(ModelError::invalid("model version must not be empty"));
        }
        for module in &self.modules {
            let found = self
                .files
                .iter()
                .any(|f| f.path == module.file || file_basename(&f.path) == module.file);
            if !found {
                return Err(ModelError::invalid(format!(
                    "module '{}' references file '{}' which is not supplied",
                    module.name, module.file
                )));
            }
        }
        Ok(())
    }

    /// The qualified name used for build-tree path segments. Dots are
    /// forbidden in path segments and substituted by underscores.
    pub fn safe_qualified_name(&self) -> String {
        format!("{}_{}", self.name, self.version).replace('.', "_")
    }

    /// File name of the compiled artifact, `{name}-{version}.so`.
    pub fn artifact_file_name(&self) -> String {
        format!("{}-{}.so", self.plugin.name, self.plugin.version)
    }
}

/// Final path segment of a slash-separated logical path.
pub fn file_basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
