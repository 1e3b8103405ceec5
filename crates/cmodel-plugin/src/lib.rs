//! Loading compiled config model plugins.
//!
//! A plugin is a native shared object exporting a single well-known symbol:
//! a zero-argument `extern "C"` factory returning the model capability
//! object. Loading failures are recoverable errors, never process aborts.

#![allow(improper_ctypes_definitions)]

use std::path::Path;

use cmodel_core::{ConfigModel, ModelError, ModelResult};
use libloading::{Library, Symbol};
use thiserror::Error;

/// The exported factory symbol every plugin must provide.
const PLUGIN_SYMBOL: &[u8] = b"config_model_plugin";

/// Factory signature behind [`PLUGIN_SYMBOL`].
type CreateFn = unsafe extern "C" fn() -> *mut dyn ConfigModel;

/// Plugin loading failures.
#[derive(Debug, Error)]
pub enum PluginLoadError {
    #[error("failed to open plugin '{path}': {message}")]
    Open { path: String, message: String },
    #[error("plugin '{path}' does not export symbol 'config_model_plugin': {message}")]
    MissingSymbol { path: String, message: String },
    #[error("symbol loaded from '{path}' is not a config model factory")]
    BadSymbol { path: String },
}

impl From<PluginLoadError> for ModelError {
    fn from(err: PluginLoadError) -> Self {
        ModelError::invalid(err.to_string())
    }
}

/// A loaded plugin holding both the model and its backing library.
///
/// The library handle must outlive the model: the trait object's code lives
/// in the mapped shared object. Field order keeps the drop order correct.
pub struct LoadedPlugin {
    model: Box<dyn ConfigModel>,
    _library: Library,
}

impl LoadedPlugin {
    /// The config model provided by the plugin.
    pub fn model(&self) -> &dyn ConfigModel {
        self.model.as_ref()
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin").finish_non_exhaustive()
    }
}

/// Loads the plugin at the given path and extracts its config model.
pub fn load(path: &Path) -> ModelResult<LoadedPlugin> {
    let display = path.display().to_string();

    let library = unsafe { Library::new(path) }.map_err(|e| PluginLoadError::Open {
        path: display.clone(),
        message: e.to_string(),
    })?;

    let create: Symbol<CreateFn> =
        unsafe { library.get(PLUGIN_SYMBOL) }.map_err(|e| PluginLoadError::MissingSymbol {
            path: display.clone(),
            message: e.to_string(),
        })?;

    let raw = unsafe { create() };
    if raw.is_null() {
        return Err(PluginLoadError::BadSymbol { path: display }.into());
    }
    let model = unsafe { Box::from_raw(raw) };

    Ok(LoadedPlugin {
        model,
        _library: library,
    })
}
