//! Policy and resource model.
//!
//! A [`Policy`] owns exactly one route definition (stored alongside it in a
//! snapshot) and references named [`Resource`]s that are packaged with it.

use serde::{Deserialize, Serialize};

use crate::dependency::{Dependency, DependencySet};
use crate::validation::{Validate, ValidationError, ValidationErrors};

/// A named artifact packaged alongside a policy's route definition.
///
/// The resource content lives in the snapshot, addressed by
/// `(policy, resource name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name, used as the artifact path.
    pub name: String,

    /// Packages this resource requires.
    #[serde(default, skip_serializing_if = "DependencySet::is_empty")]
    pub dependencies: DependencySet,
}

impl Resource {
    /// Creates a resource reference.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: DependencySet::new(),
        }
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.insert(dependency);
        self
    }
}

/// A unit of integration behavior compiled into one deployable artifact.
///
/// # Examples
///
/// ```rust
/// use hodos_core::{Dependency, Policy, Resource};
///
/// let policy = Policy::new("ActivityServer")
///     .with_description("Receives activity events")
///     .with_resource(Resource::new("mapping.json"))
///     .with_dependency(Dependency::new("org.apache.camel", "camel-jackson", "2.15.0"));
///
/// assert_eq!(policy.resources.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy name; unique within a group.
    pub name: String,

    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Resources packaged with the policy.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<Resource>,

    /// Packages the policy requires regardless of endpoints used.
    #[serde(default, skip_serializing_if = "DependencySet::is_empty")]
    pub dependencies: DependencySet,
}

impl Policy {
    /// Creates a policy with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            resources: Vec::new(),
            dependencies: DependencySet::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a resource reference.
    #[must_use]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.insert(dependency);
        self
    }

    /// Returns the resource with the given name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }
}

impl Validate for Policy {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add(ValidationError::required("name"));
        }

        let mut seen = std::collections::HashSet::new();
        for resource in &self.resources {
            if resource.name.trim().is_empty() {
                errors.add(ValidationError::required("resources.name"));
            } else if !seen.insert(resource.name.as_str()) {
                errors.add(ValidationError::duplicate("resources", &resource.name));
            }
        }

        errors.into_validation_result()
    }
}
