//! Shared types for the config model registry.
//!
//! This crate holds the descriptor data model, the domain error categories,
//! and the capability set a loaded model plugin must expose. Everything else
//! in the workspace (resolver, cache, compiler, registry, CLI) builds on
//! these types.

pub mod descriptor;
pub mod error;
pub mod model;

pub use descriptor::{FileRecord, ModelDescriptor, ModuleRecord, PluginRecord};
pub use error::{ModelError, ModelResult};
pub use model::{ConfigModel, GetStateMode, ModelData, Unmarshaller, Validator};
