//! The capability set a loaded config model exposes.
//!
//! A compiled plugin hands the host a [`ConfigModel`]: metadata, schema
//! extraction, payload unmarshalling, and payload validation. The traits are
//! object safe so the plugin loader can hand out trait objects backed by
//! code in the shared object.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::ModelDescriptor;
use crate::error::ModelResult;

/// How a device reports operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GetStateMode {
    /// Operational state is not supported at all.
    #[default]
    None,
    /// The device returns all op state attributes for a STATE/OPERATIONAL
    /// query.
    OpState,
    /// The device returns op state for exactly the read-only paths from
    /// YANG; wildcards are handled by the device.
    ExplicitRoPaths,
    /// Wildcards in read-only paths must be expanded by the caller before
    /// querying.
    ExplicitRoPathsExpandWildcards,
}

/// Model metadata advertised to management protocols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelData {
    pub name: String,
    pub organization: String,
    pub version: String,
}

/// Unmarshals raw payload bytes into a configuration tree.
pub trait Unmarshaller: Send + Sync {
    fn unmarshal(&self, bytes: &[u8]) -> ModelResult<serde_json::Value>;
}

/// Validates a configuration tree against the model schema.
pub trait Validator: Send + Sync {
    fn validate(&self, config: &serde_json::Value) -> ModelResult<()>;
}

/// A loaded configuration model.
pub trait ConfigModel: Send + Sync {
    /// The descriptor this model was compiled from.
    fn model_info(&self) -> ModelDescriptor;

    /// Per-module metadata in management-protocol form.
    fn gnmi_model_data(&self) -> Vec<ModelData>;

    /// The model schema, keyed by schema path.
    fn schema(&self) -> ModelResult<HashMap<String, serde_json::Value>>;

    /// How the modeled device reports operational state.
    fn get_state_mode(&self) -> GetStateMode;

    /// The payload unmarshaller for this model.
    fn unmarshaller(&self) -> &dyn Unmarshaller;

    /// The payload validator for this model.
    fn validator(&self) -> &dyn Validator;
}
