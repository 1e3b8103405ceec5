//! The service façade.
//!
//! Translates wire requests into registry, cache, and compiler operations
//! and enforces the publish ordering: lock → check → compile → register. The
//! cache lock is released through a drop guard, so every exit path —
//! including a panic between lock and register — releases it.

use std::sync::Arc;

use cmodel_cache::PluginCache;
use cmodel_compiler::PluginCompiler;
use cmodel_core::{ModelError, ModelResult};
use cmodel_plugin::LoadedPlugin;
use tracing::{debug, warn};

use crate::dto::ConfigModelDto;
use crate::registry::ConfigModelRegistry;

/// Registry, cache, and compiler behind the service surface.
pub struct RegistryService {
    registry: Arc<ConfigModelRegistry>,
    cache: Arc<PluginCache>,
    compiler: Arc<PluginCompiler>,
}

/// Releases a held cache lock when dropped; release failures are logged,
/// never propagated.
struct UnlockOnDrop {
    cache: Arc<PluginCache>,
    shared: bool,
}

impl Drop for UnlockOnDrop {
    fn drop(&mut self) {
        let released = if self.shared {
            self.cache.read_unlock()
        } else {
            self.cache.unlock()
        };
        if let Err(e) = released {
            warn!("failed to release cache lock: {e}");
        }
    }
}

impl RegistryService {
    pub fn new(
        registry: Arc<ConfigModelRegistry>,
        cache: Arc<PluginCache>,
        compiler: Arc<PluginCompiler>,
    ) -> Self {
        RegistryService {
            registry,
            cache,
            compiler,
        }
    }

    /// Gets a registered model, projected to the wire.
    pub async fn get_model(&self, name: &str, version: &str) -> ModelResult<ConfigModelDto> {
        debug!(name, version, "get model");
        let descriptor = self.registry.get(name, version).await?;
        Ok(ConfigModelDto::from_descriptor(&descriptor))
    }

    /// Lists every registered model.
    pub async fn list_models(&self) -> ModelResult<Vec<ConfigModelDto>> {
        debug!("list models");
        let descriptors = self.registry.list().await?;
        Ok(descriptors
            .iter()
            .map(ConfigModelDto::from_descriptor)
            .collect())
    }

    /// Publishes a model: compiles its plugin unless already cached, then
    /// registers the descriptor.
    pub async fn push_model(&self, model: ConfigModelDto) -> ModelResult<()> {
        debug!(name = %model.name, version = %model.version, "push model");
        self.cache.lock().await?;
        let _unlock = UnlockOnDrop {
            cache: Arc::clone(&self.cache),
            shared: false,
        };

        let (name, version) = (model.name.clone(), model.version.clone());
        match self.registry.get(&name, &version).await {
            Ok(_) => {
                return Err(ModelError::already_exists(format!(
                    "model '{name}/{version}' already exists"
                )));
            }
            Err(e) if !e.is_not_found() => return Err(e),
            Err(_) => {}
        }

        let descriptor = model.into_descriptor();
        descriptor.validate()?;

        if !self.cache.cached(&name, &version).await? {
            let path = self.cache.get_path(&name, &version).await?;
            self.compiler.compile(&descriptor, &path).await?;
        }

        self.registry.add(&descriptor).await
    }

    /// Deletes a registered model; the compiled artifact, if any, stays in
    /// the cache.
    pub async fn delete_model(&self, name: &str, version: &str) -> ModelResult<()> {
        debug!(name, version, "delete model");
        self.registry.remove(name, version).await
    }

    /// Loads the compiled plugin for a model under a shared cache lock.
    pub async fn load_model(&self, name: &str, version: &str) -> ModelResult<LoadedPlugin> {
        debug!(name, version, "load model");
        self.cache.read_lock().await?;
        let _unlock = UnlockOnDrop {
            cache: Arc::clone(&self.cache),
            shared: true,
        };
        self.cache.load(name, version).await
    }
}
