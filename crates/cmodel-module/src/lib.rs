//! Dependency manifest resolution.
//!
//! The resolver materializes the exact dependency manifest the generated
//! build trees must adopt, together with a stable content hash identifying
//! that manifest. Resolution runs the native toolchain once and memoizes the
//! result to disk; subsequent calls read the persisted pair back without any
//! subprocess.

pub mod exec;
pub mod modfile;
pub mod resolver;

pub use modfile::{ModFile, Replacement, Requirement, encode_path, split_path_version};
pub use resolver::{ManifestHash, Resolver, ResolverConfig};
