//! Error types for the builder crate.
//!
//! Only [`BuilderError::TagNotFound`] (and queue back-pressure) reaches a
//! `submit` caller; everything that goes wrong inside a worker is recorded on
//! the tag instead.

use std::path::PathBuf;

use hodos_core::{Issue, TagKey};
use hodos_generator::GeneratorError;
use thiserror::Error;

/// Result type alias for builder operations.
pub type Result<T> = std::result::Result<T, BuilderError>;

/// Errors that can occur while scheduling or running builds.
#[derive(Error, Debug)]
pub enum BuilderError {
    /// The tag to build does not exist.
    #[error("tag '{key}' not found")]
    TagNotFound {
        /// Tag identity.
        key: TagKey,
    },

    /// The tagged snapshot could not be found.
    #[error("snapshot for tag '{key}' not found")]
    SnapshotNotFound {
        /// Tag identity.
        key: TagKey,
    },

    /// The build queue is at capacity.
    #[error("build queue is full ({capacity} pending builds)")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// No build is tracked under the given id.
    #[error("build '{build_id}' not found")]
    BuildNotFound {
        /// Build identifier.
        build_id: String,
    },

    /// Handing generated output to the deployer failed.
    #[error("deployment of '{key}' failed: {reason}")]
    Deployment {
        /// Tag identity.
        key: TagKey,
        /// Failure reason.
        reason: String,
    },

    /// The design repository failed.
    #[error("repository error: {reason}")]
    Repository {
        /// Failure reason.
        reason: String,
    },

    /// Generation failed.
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    Config {
        /// Reason for invalidity.
        reason: String,
    },

    /// Filesystem error.
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The build server is shutting down and accepts no more work.
    #[error("build server is shutting down")]
    ShuttingDown,

    /// Model error.
    #[error(transparent)]
    Core(#[from] hodos_core::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BuilderError {
    /// Creates an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the error was caused by the caller's input rather than
    /// by the environment.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::TagNotFound { .. } | Self::SnapshotNotFound { .. } => true,
            Self::Generator(e) => e.is_input_error(),
            Self::Core(e) => e.is_input_error(),
            _ => false,
        }
    }

    /// Converts the error into a tag issue naming what triggered it.
    pub fn to_issue(&self) -> Issue {
        match self {
            Self::Generator(e) => e.to_issue(),
            Self::Core(e) => e.to_issue(),
            other => Issue::error(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> TagKey {
        TagKey::new("acme", "activity", "v1")
    }

    #[test]
    fn test_error_display() {
        let err = BuilderError::TagNotFound { key: key() };
        assert_eq!(err.to_string(), "tag 'acme/activity/v1' not found");

        let err = BuilderError::QueueFull { capacity: 4 };
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn test_input_error_classification() {
        assert!(BuilderError::TagNotFound { key: key() }.is_input_error());
        assert!(BuilderError::Core(hodos_core::Error::ImmutableTag {
            tag: "v1".to_string()
        })
        .is_input_error());
        assert!(!BuilderError::ShuttingDown.is_input_error());
        assert!(!BuilderError::Deployment {
            key: key(),
            reason: "disk full".to_string()
        }
        .is_input_error());
    }

    #[test]
    fn test_generator_issue_keeps_context() {
        let err = BuilderError::from(GeneratorError::UnknownEndpoint {
            policy: "orders".to_string(),
            endpoint: "ghost".to_string(),
        });
        let issue = err.to_issue();
        assert_eq!(issue.policy.as_deref(), Some("orders"));
        assert_eq!(issue.endpoint.as_deref(), Some("ghost"));
    }
}
