//! Endpoint and characteristic model.
//!
//! An [`Endpoint`] binds a logical name to a physical URI plus the options
//! and behavioral [`Characteristic`]s that apply wherever the name is used.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dependency::{Dependency, DependencySet};
use crate::uri::{self, Role};
use crate::validation::{Validate, ValidationError, ValidationErrors};

/// A named, parameterized behavioral pattern attached to an endpoint.
///
/// # Examples
///
/// ```rust
/// use hodos_core::Characteristic;
///
/// let batching = Characteristic::new("BatchWithRetryOnFailure")
///     .with_property("batchSize", "111")
///     .with_property("batchInterval", "2222");
/// assert_eq!(batching.property("batchSize"), Some("111"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristic {
    /// Type name; selects the processor applied during compilation.
    #[serde(rename = "type")]
    pub characteristic_type: String,

    /// Processor-specific properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl Characteristic {
    /// Creates a characteristic of the given type with no properties.
    #[must_use]
    pub fn new(characteristic_type: impl Into<String>) -> Self {
        Self {
            characteristic_type: characteristic_type.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Sets a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns a property value.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A physical destination or source, addressable by name from route definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Name used by logical references; unique within a group.
    pub name: String,

    /// Physical URI (may already carry query parameters).
    pub uri: String,

    /// Free-text description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Characteristics, applied in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub characteristics: Vec<Characteristic>,

    /// Packages required wherever this endpoint is used.
    #[serde(default, skip_serializing_if = "DependencySet::is_empty")]
    pub dependencies: DependencySet,

    /// Options appended when the endpoint is consumed from.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub consumer_options: BTreeMap<String, String>,

    /// Options appended when the endpoint is produced to.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub producer_options: BTreeMap<String, String>,
}

impl Endpoint {
    /// Creates an endpoint with a name and physical URI.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use hodos_core::Endpoint;
    ///
    /// let endpoint = Endpoint::new("orders", "activemq:queue:orders")
    ///     .with_consumer_option("concurrentConsumers", "4");
    /// assert_eq!(endpoint.name, "orders");
    /// ```
    #[must_use]
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            description: String::new(),
            characteristics: Vec::new(),
            dependencies: DependencySet::new(),
            consumer_options: BTreeMap::new(),
            producer_options: BTreeMap::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a characteristic.
    #[must_use]
    pub fn with_characteristic(mut self, characteristic: Characteristic) -> Self {
        self.characteristics.push(characteristic);
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.insert(dependency);
        self
    }

    /// Sets a consumer option.
    #[must_use]
    pub fn with_consumer_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.consumer_options.insert(key.into(), value.into());
        self
    }

    /// Sets a producer option.
    #[must_use]
    pub fn with_producer_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.producer_options.insert(key.into(), value.into());
        self
    }

    /// Returns the option map for a role.
    #[must_use]
    pub const fn options(&self, role: Role) -> &BTreeMap<String, String> {
        match role {
            Role::Consumer => &self.consumer_options,
            Role::Producer => &self.producer_options,
        }
    }

    /// Returns true if a characteristic of the given type is attached.
    #[must_use]
    pub fn has_characteristic(&self, characteristic_type: &str) -> bool {
        self.characteristics
            .iter()
            .any(|c| c.characteristic_type == characteristic_type)
    }
}

impl Validate for Endpoint {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add(ValidationError::required("name"));
        }
        if self.uri.trim().is_empty() {
            errors.add(ValidationError::required("uri"));
        } else if uri::is_logical(&self.uri) {
            errors.add(ValidationError::format(
                "uri",
                "physical URI must not use the logical scheme",
            ));
        }
        for (i, characteristic) in self.characteristics.iter().enumerate() {
            if characteristic.characteristic_type.trim().is_empty() {
                errors.add(ValidationError::required(format!("characteristics[{i}].type")));
            }
        }
        for dependency in &self.dependencies {
            if let Err(e) = dependency.validate() {
                errors.merge_prefixed("dependencies", e);
            }
        }

        errors.into_validation_result()
    }
}
