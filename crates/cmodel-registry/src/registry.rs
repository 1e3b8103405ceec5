//! File-backed descriptor persistence.
//!
//! Each descriptor is one indented-JSON file named
//! `{name}-{version}.json`; the file names are the canonical index and
//! there is no in-memory catalog. Concurrent writers racing on the same key
//! resolve last-writer-wins.

use std::path::{Path, PathBuf};

use cmodel_core::{ModelDescriptor, ModelError, ModelResult};
use tokio::fs;
use tracing::{debug, error, info};
use walkdir::WalkDir;

const DEFAULT_PATH: &str = "/etc/onos/registry";
const JSON_EXT: &str = ".json";

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory holding the descriptor files.
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            path: PathBuf::from(DEFAULT_PATH),
        }
    }
}

/// A registry of config model descriptors.
pub struct ConfigModelRegistry {
    config: RegistryConfig,
}

impl ConfigModelRegistry {
    /// Creates the registry, bootstrapping its directory if missing.
    pub fn new(mut config: RegistryConfig) -> Self {
        if config.path.as_os_str().is_empty() {
            config.path = PathBuf::from(DEFAULT_PATH);
        }
        if !config.path.exists() {
            if let Err(e) = std::fs::create_dir_all(&config.path) {
                error!(path = %config.path.display(), "failed to create registry directory: {e}");
            }
        }
        ConfigModelRegistry { config }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Gets a descriptor by name and version.
    pub async fn get(&self, name: &str, version: &str) -> ModelResult<ModelDescriptor> {
        load_descriptor(&self.descriptor_path(name, version)).await
    }

    /// Lists every descriptor found by recursively walking the registry
    /// directory for `.json` files.
    pub async fn list(&self) -> ModelResult<Vec<ModelDescriptor>> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(&self.config.path).into_iter().flatten() {
            if entry.file_type().is_file()
                && entry.file_name().to_string_lossy().ends_with(JSON_EXT)
            {
                paths.push(entry.into_path());
            }
        }

        let mut descriptors = Vec::with_capacity(paths.len());
        for path in paths {
            descriptors.push(load_descriptor(&path).await?);
        }
        Ok(descriptors)
    }

    /// Adds a descriptor, silently overwriting any previous record for the
    /// same `(name, version)`.
    pub async fn add(&self, descriptor: &ModelDescriptor) -> ModelResult<()> {
        debug!(
            name = %descriptor.name,
            version = %descriptor.version,
            registry = %self.config.path.display(),
            "adding model",
        );
        let bytes = serde_json::to_vec_pretty(descriptor)
            .map_err(|e| ModelError::internal(format!("failed to encode descriptor: {e}")))?;
        let path = self.descriptor_path(&descriptor.name, &descriptor.version);
        fs::write(&path, bytes).await?;
        info!(
            name = %descriptor.name,
            version = %descriptor.version,
            registry = %self.config.path.display(),
            "model added",
        );
        Ok(())
    }

    /// Removes a descriptor; a missing record is a no-op success.
    pub async fn remove(&self, name: &str, version: &str) -> ModelResult<()> {
        let path = self.descriptor_path(name, version);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(name, version, "model removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ModelError::internal(format!(
                "failed to remove '{}': {e}",
                path.display()
            ))),
        }
    }

    fn descriptor_path(&self, name: &str, version: &str) -> PathBuf {
        self.config.path.join(format!("{name}-{version}{JSON_EXT}"))
    }
}

async fn load_descriptor(path: &Path) -> ModelResult<ModelDescriptor> {
    debug!(path = %path.display(), "loading model descriptor");
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ModelError::not_found(format!(
                "no descriptor at '{}'",
                path.display()
            )));
        }
        Err(e) => {
            return Err(ModelError::internal(format!(
                "failed to read '{}': {e}",
                path.display()
            )));
        }
    };
    let descriptor: ModelDescriptor = serde_json::from_slice(&bytes).map_err(|e| {
        ModelError::invalid(format!("'{}' is not a model descriptor: {e}", path.display()))
    })?;
    if descriptor.name.is_empty() || descriptor.version.is_empty() {
        return Err(ModelError::invalid(format!(
            "'{}' is not a valid model descriptor",
            path.display()
        )));
    }
    Ok(descriptor)
}
