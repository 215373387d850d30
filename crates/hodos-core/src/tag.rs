//! Tags, build status and issues.
//!
//! A [`Tag`] names an immutable snapshot of a policy group and records the
//! outcome of compiling it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Build status of a tag.
///
/// ```text
/// Created --submit--> Scheduled --> Building --> Successful
///                                            \--> Failed
/// ```
///
/// A terminal tag may be submitted again, which starts a fresh build from
/// `Scheduled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum BuildStatus {
    /// Tag exists but has never been submitted.
    #[default]
    Created,
    /// Accepted and waiting for a worker.
    Scheduled,
    /// A worker is compiling the snapshot.
    Building,
    /// Every policy compiled and was deployed.
    Successful,
    /// Compilation or deployment failed.
    Failed,
}

impl BuildStatus {
    /// Returns true if no build is in progress for this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }

    /// Returns true if a build has been accepted and not yet finished.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Building)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hodos_core::BuildStatus;
    ///
    /// assert!(BuildStatus::Created.can_transition_to(BuildStatus::Scheduled));
    /// assert!(BuildStatus::Failed.can_transition_to(BuildStatus::Scheduled));
    /// assert!(!BuildStatus::Scheduled.can_transition_to(BuildStatus::Successful));
    /// ```
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Created | Self::Successful | Self::Failed,
                Self::Scheduled
            ) | (Self::Scheduled, Self::Building | Self::Failed)
                | (Self::Building, Self::Successful | Self::Failed)
        )
    }

    /// Returns a string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Scheduled => "Scheduled",
            Self::Building => "Building",
            Self::Successful => "Successful",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a tagged snapshot: `(organization, group, tag)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagKey {
    /// Organization name.
    pub org: String,
    /// Policy group name.
    pub group: String,
    /// Tag name.
    pub tag: String,
}

impl TagKey {
    /// Creates a tag key.
    #[must_use]
    pub fn new(org: impl Into<String>, group: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            group: group.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.org, self.group, self.tag)
    }
}

/// Severity of an [`Issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Advisory; the build can still succeed.
    Warning,
    /// Fatal for the build.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic attached to a tag by the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// How serious the issue is.
    pub severity: Severity,

    /// Human-readable description.
    pub message: String,

    /// Policy the issue was raised for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,

    /// Endpoint involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Resource involved, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl Issue {
    /// Creates a warning.
    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Creates an error.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            policy: None,
            endpoint: None,
            resource: None,
        }
    }

    /// Names the policy involved.
    #[must_use]
    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    /// Names the endpoint involved.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Names the resource involved.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.severity)?;
        if let Some(policy) = &self.policy {
            write!(f, " policy={policy}")?;
        }
        if let Some(endpoint) = &self.endpoint {
            write!(f, " endpoint={endpoint}")?;
        }
        if let Some(resource) = &self.resource {
            write!(f, " resource={resource}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A named snapshot record and its build outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Tag name.
    pub name: String,

    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Who created the tag.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    /// When the tag was created.
    pub created_at: DateTime<Utc>,

    /// When the last build finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,

    /// Current build status.
    #[serde(default)]
    pub status: BuildStatus,

    /// Issues from the most recent build.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

impl Tag {
    /// Creates a tag in the `Created` state, stamped now.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            created_by: String::new(),
            created_at: Utc::now(),
            built_at: None,
            status: BuildStatus::Created,
            issues: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the creator.
    #[must_use]
    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Returns true if any issue is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }
}
