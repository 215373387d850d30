//! Characteristic processors and their registry.
//!
//! A characteristic attached to an endpoint is applied wherever the endpoint
//! is referenced: once an element's logical URI has been resolved, every
//! characteristic on the endpoint is handed, in declaration order, to the
//! processor registered for its type. Processors rewrite the tree around the
//! element and contribute their own package dependencies.

mod batch_retry;

use std::collections::BTreeMap;
use std::fmt;

use hodos_core::{Characteristic, DependencySet, Endpoint, PolicyGroupSnapshot};
use serde::Serialize;

use crate::error::{GeneratorError, Result};
use crate::tree::{Document, NodeId};

pub use batch_retry::BatchWithRetryOnFailure;

/// Describes one property a characteristic type understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    /// Property name.
    pub name: String,
    /// Whether the property must have a value (a default counts).
    pub mandatory: bool,
    /// Value used when the characteristic does not set the property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

/// Catalogue entry for a supported characteristic type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacteristicType {
    /// Type name, matched against [`Characteristic::characteristic_type`].
    pub name: String,
    /// Human-readable summary.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Known properties.
    pub properties: Vec<PropertyDescriptor>,
}

impl CharacteristicType {
    /// Creates a type with no properties.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            properties: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a property descriptor.
    #[must_use]
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        mandatory: bool,
        default_value: Option<&str>,
    ) -> Self {
        self.properties.push(PropertyDescriptor {
            name: name.into(),
            mandatory,
            default_value: default_value.map(str::to_string),
        });
        self
    }

    /// Returns a property's value on `characteristic`, falling back to the
    /// descriptor's default.
    #[must_use]
    pub fn property_value<'a>(
        &'a self,
        characteristic: &'a Characteristic,
        name: &str,
    ) -> Option<&'a str> {
        characteristic.property(name).or_else(|| {
            self.properties
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| p.default_value.as_deref())
        })
    }

    /// Returns a property parsed as a positive integer.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::InvalidProperty`] if the value is missing, not
    /// a number, or zero.
    pub fn positive_property(
        &self,
        endpoint: &Endpoint,
        characteristic: &Characteristic,
        name: &str,
    ) -> Result<u64> {
        let value = self.property_value(characteristic, name).unwrap_or_default();
        match value.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(GeneratorError::InvalidProperty {
                endpoint: endpoint.name.clone(),
                property: name.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

/// Everything a processor may consult while rewriting one element.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    /// Policy being generated.
    pub policy: &'a str,
    /// Snapshot the policy belongs to.
    pub snapshot: &'a PolicyGroupSnapshot,
    /// Endpoint the element referenced.
    pub endpoint: &'a Endpoint,
    /// The characteristic being applied.
    pub characteristic: &'a Characteristic,
}

/// A handler for one characteristic type.
///
/// Processors are shared across worker threads and must not keep per-call
/// state. The element passed to [`process`](Self::process) already carries
/// its resolved physical URI.
pub trait CharacteristicProcessor: Send + Sync {
    /// Describes the type this processor handles.
    fn characteristic_type(&self) -> &CharacteristicType;

    /// Rewrites the tree around `element`.
    ///
    /// # Errors
    ///
    /// Returns an error if the characteristic's properties are unusable.
    fn process(&self, ctx: &ProcessContext<'_>, doc: &mut Document, element: NodeId)
        -> Result<()>;

    /// Packages needed by the constructs this processor emits.
    fn dependencies(&self) -> &DependencySet;
}

/// Lookup table from characteristic type name to processor.
///
/// Built once at start-up and read-only afterwards.
#[derive(Default)]
pub struct CharacteristicRegistry {
    processors: BTreeMap<String, Box<dyn CharacteristicProcessor>>,
}

impl CharacteristicRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in processor.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in processor fails to initialize.
    pub fn with_defaults() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Box::new(BatchWithRetryOnFailure::new()?));
        Ok(registry)
    }

    /// Registers a processor, replacing any previous one for the same type.
    pub fn register(&mut self, processor: Box<dyn CharacteristicProcessor>) {
        let name = processor.characteristic_type().name.clone();
        self.processors.insert(name, processor);
    }

    /// Returns the processor for a type.
    #[must_use]
    pub fn get(&self, characteristic_type: &str) -> Option<&dyn CharacteristicProcessor> {
        self.processors.get(characteristic_type).map(AsRef::as_ref)
    }

    /// Returns the catalogue of supported types, sorted by name.
    #[must_use]
    pub fn types(&self) -> Vec<CharacteristicType> {
        self.processors
            .values()
            .map(|p| p.characteristic_type().clone())
            .collect()
    }
}

impl fmt::Debug for CharacteristicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharacteristicRegistry")
            .field("types", &self.processors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Declares a `bean` at the document root unless one with `id` already exists.
///
/// Returns true if a bean was added.
pub fn ensure_bean(doc: &mut Document, id: &str, class: &str) -> bool {
    let root = doc.root();
    let exists = doc
        .descendants(root)
        .into_iter()
        .any(|n| doc.is_element(n, "bean") && doc.attribute(n, "id") == Some(id));
    if exists {
        return false;
    }

    let bean = doc.create_element("bean");
    doc.set_attribute(bean, "id", id);
    doc.set_attribute(bean, "class", class);
    doc.append_child(root, bean);
    true
}
