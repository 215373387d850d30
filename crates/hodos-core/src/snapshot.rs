//! Policy groups and their compile-time snapshots.
//!
//! A [`PolicyGroupSnapshot`] is the unit of compilation: a group's endpoints,
//! its policies, each policy's route definition text and resource contents.
//! Tagged snapshots are immutable; only the `master` working copy changes.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::policy::Policy;
use crate::validation::{Validate, ValidationError, ValidationErrors};

/// Name of the distinguished mutable tag.
pub const MASTER_TAG: &str = "master";

/// A named group of endpoints shared by the group's policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGroup {
    /// Group name; unique within an organization.
    pub name: String,

    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Endpoint definitions.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl PolicyGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            endpoints: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds an endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Looks up an endpoint by name.
    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name == name)
    }
}

impl Validate for PolicyGroup {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add(ValidationError::required("name"));
        }

        let mut seen = HashSet::new();
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            if let Err(e) = endpoint.validate() {
                errors.merge_prefixed(&format!("endpoints[{i}]"), e);
            }
            if !seen.insert(endpoint.name.as_str()) {
                errors.add(ValidationError::duplicate("endpoints", &endpoint.name));
            }
        }

        errors.into_validation_result()
    }
}

/// An immutable compile input: group, policies, definitions and resources.
///
/// # Examples
///
/// ```rust
/// use hodos_core::{Endpoint, Policy, PolicyGroup, PolicyGroupSnapshot};
///
/// let snapshot = PolicyGroupSnapshot::new(
///     PolicyGroup::new("activity").with_endpoint(Endpoint::new("q", "direct:out")),
/// )
/// .with_policy(Policy::new("ActivityServer"), "<camelContext/>");
///
/// assert!(snapshot.endpoint("q").is_some());
/// assert_eq!(snapshot.definition("ActivityServer"), Some("<camelContext/>"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyGroupSnapshot {
    /// Group details and endpoints.
    pub group: PolicyGroup,

    /// Policies in the group.
    #[serde(default)]
    pub policies: Vec<Policy>,

    /// Route definition text keyed by policy name.
    #[serde(default)]
    pub definitions: BTreeMap<String, String>,

    /// Resource content keyed by policy name, then resource name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, BTreeMap<String, String>>,
}

impl PolicyGroupSnapshot {
    /// Creates a snapshot of a group with no policies.
    #[must_use]
    pub fn new(group: PolicyGroup) -> Self {
        Self {
            group,
            policies: Vec::new(),
            definitions: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    /// Adds a policy together with its route definition.
    #[must_use]
    pub fn with_policy(mut self, policy: Policy, definition: impl Into<String>) -> Self {
        self.definitions
            .insert(policy.name.clone(), definition.into());
        self.policies.push(policy);
        self
    }

    /// Sets the content of a resource belonging to a policy.
    #[must_use]
    pub fn with_resource_content(
        mut self,
        policy: impl Into<String>,
        resource: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.resources
            .entry(policy.into())
            .or_default()
            .insert(resource.into(), content.into());
        self
    }

    /// Loads a snapshot from a YAML or JSON file (chosen by extension).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::SnapshotLoadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Ok(serde_yaml::from_str(&text)?)
        }
    }

    /// Looks up an endpoint by name.
    #[must_use]
    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.group.endpoint(name)
    }

    /// Looks up a policy by name.
    #[must_use]
    pub fn policy(&self, name: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.name == name)
    }

    /// Returns a policy's route definition text.
    #[must_use]
    pub fn definition(&self, policy: &str) -> Option<&str> {
        self.definitions.get(policy).map(String::as_str)
    }

    /// Returns the content of every resource a policy references, keyed by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingResource`] if a referenced resource has no content.
    pub fn resource_definitions(&self, policy: &Policy) -> Result<BTreeMap<String, String>> {
        let contents = self.resources.get(&policy.name);
        policy
            .resources
            .iter()
            .map(|resource| {
                contents
                    .and_then(|c| c.get(&resource.name))
                    .map(|content| (resource.name.clone(), content.clone()))
                    .ok_or_else(|| Error::MissingResource {
                        policy: policy.name.clone(),
                        resource: resource.name.clone(),
                    })
            })
            .collect()
    }

    /// Checks that same-named resources have byte-identical content across policies.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceConflict`] naming the first pair of policies
    /// that disagree, or [`Error::MissingResource`] if a referenced resource
    /// has no content.
    pub fn validate_resources(&self) -> Result<()> {
        let mut first_seen: BTreeMap<&str, (&str, &str)> = BTreeMap::new();

        for policy in &self.policies {
            let contents = self.resources.get(&policy.name);
            for resource in &policy.resources {
                let content = contents
                    .and_then(|c| c.get(&resource.name))
                    .ok_or_else(|| Error::MissingResource {
                        policy: policy.name.clone(),
                        resource: resource.name.clone(),
                    })?;

                match first_seen.get(resource.name.as_str()) {
                    Some((first_policy, first_content)) if *first_content != content.as_str() => {
                        return Err(Error::ResourceConflict {
                            resource: resource.name.clone(),
                            first_policy: (*first_policy).to_string(),
                            second_policy: policy.name.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        first_seen.insert(
                            resource.name.as_str(),
                            (policy.name.as_str(), content.as_str()),
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Checks every precondition the generator relies on.
    ///
    /// Endpoint names must be unique, each policy must have a definition, and
    /// shared resources must agree.
    ///
    /// # Errors
    ///
    /// Returns the first violated precondition as an input error.
    pub fn check_consistency(&self) -> Result<()> {
        let mut names = HashSet::new();
        for endpoint in &self.group.endpoints {
            if !names.insert(endpoint.name.as_str()) {
                return Err(Error::DuplicateEndpoint {
                    group: self.group.name.clone(),
                    endpoint: endpoint.name.clone(),
                });
            }
        }

        if let Some(policy) = self
            .policies
            .iter()
            .find(|p| !self.definitions.contains_key(&p.name))
        {
            return Err(Error::MissingDefinition {
                policy: policy.name.clone(),
            });
        }

        self.validate_resources()
    }
}

impl Validate for PolicyGroupSnapshot {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = self.group.validate() {
            errors.merge_prefixed("group", e);
        }
        let mut seen = HashSet::new();
        for (i, policy) in self.policies.iter().enumerate() {
            if let Err(e) = policy.validate() {
                errors.merge_prefixed(&format!("policies[{i}]"), e);
            }
            if !seen.insert(policy.name.as_str()) {
                errors.add(ValidationError::duplicate("policies", &policy.name));
            }
            if !self.definitions.contains_key(&policy.name) {
                errors.add(ValidationError::constraint(
                    format!("definitions.{}", policy.name),
                    "every policy needs a route definition",
                ));
            }
        }

        errors.into_validation_result()
    }
}
