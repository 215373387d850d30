//! Package dependency coordinates.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::validation::{Validate, ValidationError, ValidationErrors};

/// A `(groupId, artifactId, version)` package coordinate.
///
/// Equality and ordering are structural over the three strings, so a
/// [`DependencySet`] de-duplicates coordinates and iterates them in a stable
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// Group identifier (e.g. `org.apache.camel`).
    pub group_id: String,
    /// Artifact identifier (e.g. `camel-jms`).
    pub artifact_id: String,
    /// Version string.
    pub version: String,
}

/// A de-duplicated, ordered set of dependency coordinates.
pub type DependencySet = BTreeSet<Dependency>;

impl Dependency {
    /// Creates a new dependency coordinate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hodos_core::Dependency;
    ///
    /// let dep = Dependency::new("org.apache.camel", "camel-jms", "2.15.0");
    /// assert_eq!(dep.to_string(), "org.apache.camel:camel-jms:2.15.0");
    /// ```
    #[must_use]
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

impl FromStr for Dependency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(g), Some(a), Some(v), None) if !g.is_empty() && !a.is_empty() && !v.is_empty() => {
                Ok(Self::new(g, a, v))
            }
            _ => Err(Error::InvalidCoordinate {
                coordinate: s.to_string(),
            }),
        }
    }
}

impl Validate for Dependency {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (field, value) in [
            ("groupId", &self.group_id),
            ("artifactId", &self.artifact_id),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                errors.add(ValidationError::required(field));
            } else if value.contains(':') {
                errors.add(ValidationError::format(field, "must not contain ':'"));
            }
        }

        errors.into_validation_result()
    }
}
