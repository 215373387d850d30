//! Static component-to-coordinates table.

use std::collections::BTreeMap;
use std::path::Path;

use hodos_core::{Dependency, DependencySet};
use serde::{Deserialize, Serialize};

use super::DependencyResolver;
use crate::error::{GeneratorError, Result};

const BUILT_IN: &str = include_str!("../../resources/component-dependencies.json");

/// The component dependency table document.
///
/// ```json
/// { "dependencies": { "activemq": [ { "groupId": "...", "artifactId": "...", "version": "..." } ] } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDependencies {
    /// Coordinates keyed by component prefix.
    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySet>,
}

impl ComponentDependencies {
    /// Returns the table shipped with the generator.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError::Config`] if the embedded table is malformed.
    pub fn built_in() -> Result<Self> {
        serde_json::from_str(BUILT_IN).map_err(|e| GeneratorError::Config {
            message: format!("built-in component dependency table: {e}"),
        })
    }

    /// Loads a table from a JSON or YAML file (chosen by extension).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| GeneratorError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&text).map_err(hodos_core::Error::from)
        } else {
            serde_yaml::from_str(&text).map_err(hodos_core::Error::from)
        };
        Ok(parsed?)
    }

    /// Adds a coordinate for a component.
    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>, dependency: Dependency) -> Self {
        self.dependencies
            .entry(component.into())
            .or_default()
            .insert(dependency);
        self
    }

    /// Adds every entry of `other`, unioning coordinate sets per component.
    pub fn merge(&mut self, other: Self) {
        for (component, deps) in other.dependencies {
            self.dependencies.entry(component).or_default().extend(deps);
        }
    }
}

/// Resolver backed by a [`ComponentDependencies`] table.
///
/// A component with an empty entry is treated as unsupported so the chain
/// can fall through to the next resolver.
#[derive(Debug, Clone)]
pub struct ConfiguredDependencyResolver {
    table: ComponentDependencies,
}

impl ConfiguredDependencyResolver {
    /// Creates a resolver over a table.
    #[must_use]
    pub const fn new(table: ComponentDependencies) -> Self {
        Self { table }
    }

    /// Returns the table.
    #[must_use]
    pub const fn table(&self) -> &ComponentDependencies {
        &self.table
    }
}

impl DependencyResolver for ConfiguredDependencyResolver {
    fn name(&self) -> &str {
        "configured"
    }

    fn supports(&self, component: &str) -> bool {
        self.table
            .dependencies
            .get(component)
            .is_some_and(|deps| !deps.is_empty())
    }

    fn dependencies(&self, component: &str) -> DependencySet {
        self.table
            .dependencies
            .get(component)
            .cloned()
            .unwrap_or_default()
    }
}
