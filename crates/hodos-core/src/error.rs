//! Error types for Hodos core operations.
//!
//! This module defines the error types used throughout the `hodos-core` crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::tag::Issue;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Hodos core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Two policies reference a resource with the same name but different content.
    #[error(
        "resource '{resource}' differs between policies '{first_policy}' and '{second_policy}'"
    )]
    ResourceConflict {
        /// Name of the conflicting resource.
        resource: String,
        /// First policy referencing the resource.
        first_policy: String,
        /// Second policy referencing the resource with different content.
        second_policy: String,
    },

    /// A policy referenced a resource whose content is not present in the snapshot.
    #[error("resource '{resource}' referenced by policy '{policy}' has no definition")]
    MissingResource {
        /// Policy referencing the resource.
        policy: String,
        /// Name of the missing resource.
        resource: String,
    },

    /// A policy has no route definition text.
    #[error("policy '{policy}' has no definition")]
    MissingDefinition {
        /// Policy name.
        policy: String,
    },

    /// Two endpoints in one group share the same name.
    #[error("duplicate endpoint '{endpoint}' in group '{group}'")]
    DuplicateEndpoint {
        /// Group name.
        group: String,
        /// Duplicated endpoint name.
        endpoint: String,
    },

    /// An attempt was made to mutate a tagged (immutable) snapshot.
    #[error("tag '{tag}' is immutable; only 'master' can be modified")]
    ImmutableTag {
        /// Tag that was targeted.
        tag: String,
    },

    /// A dependency coordinate could not be parsed.
    #[error("invalid dependency coordinate '{coordinate}': expected 'groupId:artifactId:version'")]
    InvalidCoordinate {
        /// The offending coordinate text.
        coordinate: String,
    },

    /// Snapshot file could not be loaded.
    #[error("failed to load snapshot from {path}: {source}")]
    SnapshotLoadError {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid input provided.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Reason the input is invalid.
        reason: String,
    },
}

impl Error {
    /// Returns true if this error is caused by malformed or inconsistent policy data.
    ///
    /// Input errors are deterministic; resubmitting the same snapshot fails the same way.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::ResourceConflict { .. }
                | Self::MissingResource { .. }
                | Self::MissingDefinition { .. }
                | Self::DuplicateEndpoint { .. }
                | Self::ImmutableTag { .. }
                | Self::InvalidCoordinate { .. }
                | Self::InvalidInput { .. }
        )
    }

    /// Converts this error into an error [`Issue`] naming the policy and
    /// resource involved, where known.
    #[must_use]
    pub fn to_issue(&self) -> Issue {
        let issue = Issue::error(self.to_string());
        match self {
            Self::ResourceConflict {
                resource,
                second_policy,
                ..
            } => issue.with_policy(second_policy).with_resource(resource),
            Self::MissingResource { policy, resource } => {
                issue.with_policy(policy).with_resource(resource)
            }
            Self::MissingDefinition { policy } => issue.with_policy(policy),
            Self::DuplicateEndpoint { endpoint, .. } => issue.with_endpoint(endpoint),
            _ => issue,
        }
    }
}
