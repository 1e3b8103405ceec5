//! Plugin compilation.
//!
//! The compiler scaffolds a throw-away build tree from a descriptor plus a
//! small family of text templates, injects the dependency manifest resolved
//! for the configured target module, invokes the native toolchain, and
//! leaves a shared object at the requested output path.

pub mod compiler;
pub mod templater;

pub use compiler::{CompilerConfig, PluginCompiler};
pub use templater::{CompilerInfo, TemplateInfo, Templater};
