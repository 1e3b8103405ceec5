//! The model registry and its service surface.
//!
//! The registry is a durable, file-backed collection of descriptor records
//! keyed by `(name, version)`. The service façade layers the publish
//! ordering on top of it: lock the cache, check for pre-existence, compile
//! on miss, register. The HTTP server exposes the four registry operations.

pub mod dto;
pub mod registry;
pub mod server;
pub mod service;

pub use dto::{ConfigModelDto, ConfigModuleDto};
pub use registry::{ConfigModelRegistry, RegistryConfig};
pub use server::{ServerConfig, router, serve};
pub use service::RegistryService;
