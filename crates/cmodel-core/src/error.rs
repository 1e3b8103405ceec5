//! Domain error categories shared across the workspace.
//!
//! Every component maps its failures into one of these kinds so the service
//! surface can translate them uniformly: subprocess and filesystem failures
//! become [`ModelError::Internal`], malformed descriptors and configuration
//! become [`ModelError::Invalid`], and lock-discipline violations become
//! [`ModelError::Conflict`].

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Domain error for registry, cache, compiler, and resolver operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A descriptor or artifact does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A descriptor with the same `(name, version)` is already registered.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Malformed request, descriptor, configuration, or plugin symbol.
    #[error("invalid: {0}")]
    Invalid(String),

    /// The operation requires a lock the caller does not hold.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Subprocess, filesystem, or lock syscall failure.
    #[error("internal: {0}")]
    Internal(String),

    /// The caller canceled the operation.
    #[error("canceled")]
    Canceled,
}

impl ModelError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ModelError::NotFound(message.into())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        ModelError::AlreadyExists(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ModelError::Invalid(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ModelError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ModelError::Internal(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ModelError::AlreadyExists(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, ModelError::Invalid(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ModelError::Conflict(_))
    }
}

impl From<std::io::Error> for ModelError {
    fn from(err: std::io::Error) -> Self {
        ModelError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_match_kinds() {
        assert!(ModelError::not_found("x").is_not_found());
        assert!(ModelError::already_exists("x").is_already_exists());
        assert!(ModelError::invalid("x").is_invalid());
        assert!(ModelError::conflict("x").is_conflict());
        assert!(!ModelError::internal("x").is_not_found());
    }

    #[test]
    fn io_errors_map_to_internal() {
        let err: ModelError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, ModelError::Internal(_)));
    }
}
