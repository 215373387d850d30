//! Existence probe against a local Maven-layout artifact repository.

use std::path::{Path, PathBuf};

use hodos_core::{Dependency, DependencySet};
use serde::{Deserialize, Serialize};

use super::DependencyResolver;

/// Group id of probed components.
const CAMEL_GROUP: &str = "org.apache.camel";

/// Probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProbeConfig {
    /// Root of the local artifact repository.
    pub repository_root: PathBuf,
    /// Version to probe for.
    pub camel_version: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            repository_root: dirs::home_dir()
                .unwrap_or_default()
                .join(".m2")
                .join("repository"),
            camel_version: "2.15.0".to_string(),
        }
    }
}

/// Resolves `<component>` to `org.apache.camel:camel-<component>:<version>`
/// when that artifact directory exists in the local repository.
///
/// # Examples
///
/// ```rust
/// use hodos_generator::dependency::{CamelProbeResolver, DependencyResolver, ProbeConfig};
///
/// let repo = tempfile::tempdir().unwrap();
/// std::fs::create_dir_all(repo.path().join("org/apache/camel/camel-jetty/2.15.0")).unwrap();
///
/// let resolver = CamelProbeResolver::new(ProbeConfig {
///     repository_root: repo.path().to_path_buf(),
///     camel_version: "2.15.0".to_string(),
/// });
/// assert!(resolver.supports("jetty"));
/// assert!(!resolver.supports("nosuch"));
/// ```
#[derive(Debug, Clone)]
pub struct CamelProbeResolver {
    config: ProbeConfig,
}

impl CamelProbeResolver {
    /// Creates a probe resolver.
    #[must_use]
    pub const fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    fn artifact_id(component: &str) -> String {
        format!("camel-{component}")
    }

    fn artifact_dir(&self, component: &str) -> Option<PathBuf> {
        let plausible = !component.is_empty()
            && component
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !plausible {
            return None;
        }

        let mut dir = self.config.repository_root.clone();
        dir.extend(CAMEL_GROUP.split('.'));
        dir.push(Self::artifact_id(component));
        dir.push(&self.config.camel_version);
        Some(dir)
    }

    /// Returns the repository root being probed.
    #[must_use]
    pub fn repository_root(&self) -> &Path {
        &self.config.repository_root
    }
}

impl DependencyResolver for CamelProbeResolver {
    fn name(&self) -> &str {
        "camel-probe"
    }

    fn supports(&self, component: &str) -> bool {
        self.artifact_dir(component).is_some_and(|dir| dir.is_dir())
    }

    fn dependencies(&self, component: &str) -> DependencySet {
        if !self.supports(component) {
            return DependencySet::new();
        }
        DependencySet::from([Dependency::new(
            CAMEL_GROUP,
            Self::artifact_id(component),
            self.config.camel_version.clone(),
        )])
    }
}
