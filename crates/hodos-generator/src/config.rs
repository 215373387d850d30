//! Generator configuration.

use std::path::PathBuf;

use hodos_core::{Dependency, DependencySet};
use serde::{Deserialize, Serialize};

use crate::dependency::ProbeConfig;

/// Configuration for a [`Generator`](crate::Generator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    /// Coordinates every generated policy requires.
    pub base_dependencies: DependencySet,

    /// Extra component dependency table merged over the built-in one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_dependencies: Option<PathBuf>,

    /// Local repository probe; `None` disables probing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeConfig>,
}

/// Coordinates required by every generated routing configuration.
#[must_use]
pub fn default_base_dependencies() -> DependencySet {
    DependencySet::from([
        Dependency::new("org.springframework", "spring-web", "4.1.1.RELEASE"),
        Dependency::new("org.apache.camel", "camel-spring", "2.15.0"),
        Dependency::new("org.apache.camel", "camel-jsonpath", "2.15.0"),
    ])
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_dependencies: default_base_dependencies(),
            component_dependencies: None,
            probe: Some(ProbeConfig::default()),
        }
    }
}

impl GeneratorConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::default()
    }
}

/// Builder for [`GeneratorConfig`].
#[derive(Debug, Default)]
pub struct GeneratorConfigBuilder {
    base_dependencies: Option<DependencySet>,
    component_dependencies: Option<PathBuf>,
    probe: Option<Option<ProbeConfig>>,
}

impl GeneratorConfigBuilder {
    /// Replaces the base dependencies.
    pub fn base_dependencies(mut self, dependencies: DependencySet) -> Self {
        self.base_dependencies = Some(dependencies);
        self
    }

    /// Sets a component dependency table file.
    pub fn component_dependencies(mut self, path: impl Into<PathBuf>) -> Self {
        self.component_dependencies = Some(path.into());
        self
    }

    /// Sets the probe configuration.
    pub fn probe(mut self, config: ProbeConfig) -> Self {
        self.probe = Some(Some(config));
        self
    }

    /// Disables the local repository probe.
    pub fn without_probe(mut self) -> Self {
        self.probe = Some(None);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> GeneratorConfig {
        let defaults = GeneratorConfig::default();
        GeneratorConfig {
            base_dependencies: self
                .base_dependencies
                .unwrap_or(defaults.base_dependencies),
            component_dependencies: self.component_dependencies,
            probe: self.probe.unwrap_or(defaults.probe),
        }
    }
}
