//! Error types for the Hodos generator.

use std::path::PathBuf;

use hodos_core::Issue;
use thiserror::Error;

/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Errors that can occur while generating a policy's routing configuration.
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// The route definition is not well-formed.
    #[error("failed to parse definition of '{policy}': {message}")]
    Parse {
        /// Policy (or template) whose text failed to parse.
        policy: String,
        /// Parser message.
        message: String,
    },

    /// A marker element has no `uri` attribute.
    #[error("'{element}' element in policy '{policy}' has no uri attribute")]
    MissingUri {
        /// Policy being generated.
        policy: String,
        /// Marker tag name.
        element: String,
    },

    /// A logical reference names an endpoint the group does not define.
    #[error("unable to find endpoint '{endpoint}' referenced by policy '{policy}'")]
    UnknownEndpoint {
        /// Policy being generated.
        policy: String,
        /// Referenced endpoint name.
        endpoint: String,
    },

    /// An element tag name is not a consumer or producer marker.
    #[error("invalid marker element '{element}' in policy '{policy}'")]
    InvalidMarker {
        /// Policy being generated.
        policy: String,
        /// Offending tag name.
        element: String,
    },

    /// A characteristic template is malformed.
    #[error("invalid template '{name}': {message}")]
    InvalidTemplate {
        /// Template name.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// A characteristic property has an unusable value.
    #[error("invalid value '{value}' for property '{property}' on endpoint '{endpoint}'")]
    InvalidProperty {
        /// Endpoint carrying the characteristic.
        endpoint: String,
        /// Property name.
        property: String,
        /// Offending value.
        value: String,
    },

    /// Generator configuration is invalid.
    #[error("generator configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// I/O error reading configuration or probing a repository.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Core model error.
    #[error(transparent)]
    Core(#[from] hodos_core::Error),
}

impl GeneratorError {
    /// Returns true if this error is caused by malformed or inconsistent policy data.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        match self {
            Self::Parse { .. }
            | Self::MissingUri { .. }
            | Self::UnknownEndpoint { .. }
            | Self::InvalidMarker { .. }
            | Self::InvalidProperty { .. } => true,
            Self::Core(e) => e.is_input_error(),
            Self::InvalidTemplate { .. } | Self::Config { .. } | Self::Io { .. } => false,
        }
    }

    /// Fills in the policy name on errors raised below the generator.
    #[must_use]
    pub fn in_policy(mut self, name: &str) -> Self {
        match &mut self {
            Self::Parse { policy, .. }
            | Self::MissingUri { policy, .. }
            | Self::UnknownEndpoint { policy, .. }
            | Self::InvalidMarker { policy, .. } => {
                if policy.is_empty() {
                    name.clone_into(policy);
                }
            }
            _ => {}
        }
        self
    }

    /// Converts this error into an error [`Issue`] naming what triggered it.
    #[must_use]
    pub fn to_issue(&self) -> Issue {
        let issue = Issue::error(self.to_string());
        match self {
            Self::Parse { policy, .. }
            | Self::MissingUri { policy, .. }
            | Self::InvalidMarker { policy, .. } => issue.with_policy(policy),
            Self::UnknownEndpoint { policy, endpoint } => {
                issue.with_policy(policy).with_endpoint(endpoint)
            }
            Self::InvalidProperty { endpoint, .. } => issue.with_endpoint(endpoint),
            Self::Core(e) => e.to_issue(),
            _ => issue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_endpoint_display() {
        let err = GeneratorError::UnknownEndpoint {
            policy: "ActivityServer".to_string(),
            endpoint: "q".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unable to find endpoint 'q' referenced by policy 'ActivityServer'"
        );
    }

    #[test]
    fn test_in_policy_fills_empty_name_only() {
        let err = GeneratorError::MissingUri {
            policy: String::new(),
            element: "to".to_string(),
        }
        .in_policy("p");
        assert!(matches!(err, GeneratorError::MissingUri { ref policy, .. } if policy == "p"));

        let err = GeneratorError::MissingUri {
            policy: "first".to_string(),
            element: "to".to_string(),
        }
        .in_policy("second");
        assert!(matches!(err, GeneratorError::MissingUri { ref policy, .. } if policy == "first"));
    }

    #[test]
    fn test_input_error_classification() {
        assert!(GeneratorError::InvalidMarker {
            policy: "p".to_string(),
            element: "log".to_string(),
        }
        .is_input_error());
        assert!(!GeneratorError::Config {
            message: "bad".to_string(),
        }
        .is_input_error());
        assert!(GeneratorError::from(hodos_core::Error::MissingDefinition {
            policy: "p".to_string(),
        })
        .is_input_error());
    }

    #[test]
    fn test_to_issue_names_endpoint() {
        let issue = GeneratorError::UnknownEndpoint {
            policy: "p".to_string(),
            endpoint: "q".to_string(),
        }
        .to_issue();
        assert_eq!(issue.policy.as_deref(), Some("p"));
        assert_eq!(issue.endpoint.as_deref(), Some("q"));
    }
}
