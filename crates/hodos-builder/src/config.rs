//! Configuration types for the build server.
//!
//! [`BuilderConfig`] sizes the worker pool and build history. [`HodosConfig`]
//! is the on-disk document the CLI reads, bundling builder, generator and
//! deployment settings.

use std::path::{Path, PathBuf};

use hodos_generator::GeneratorConfig;
use serde::{Deserialize, Serialize};

use crate::error::{BuilderError, Result};
use crate::scheduler::SchedulerConfig;

/// Configuration for the build server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuilderConfig {
    /// Worker pool and queue settings.
    pub scheduler: SchedulerConfig,

    /// Maximum number of finished builds kept for lookup.
    pub history_limit: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            history_limit: 100,
        }
    }
}

impl BuilderConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BuilderConfigBuilder {
        BuilderConfigBuilder::default()
    }

    /// Checks that the configuration can run builds.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.pool_size == 0 {
            return Err(BuilderError::Config {
                reason: "scheduler.poolSize must be at least 1".to_string(),
            });
        }
        if self.scheduler.max_queue_size == 0 {
            return Err(BuilderError::Config {
                reason: "scheduler.maxQueueSize must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for `BuilderConfig`.
#[derive(Debug, Default)]
pub struct BuilderConfigBuilder {
    scheduler: Option<SchedulerConfig>,
    history_limit: Option<usize>,
}

impl BuilderConfigBuilder {
    /// Sets the scheduler configuration.
    pub fn scheduler(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = Some(config);
        self
    }

    /// Sets the number of finished builds to keep.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> BuilderConfig {
        let defaults = BuilderConfig::default();
        BuilderConfig {
            scheduler: self.scheduler.unwrap_or_default(),
            history_limit: self.history_limit.unwrap_or(defaults.history_limit),
        }
    }
}

/// Top-level configuration file.
///
/// ```yaml
/// builder:
///   scheduler:
///     poolSize: 4
/// generator:
///   probe:
///     camelVersion: 2.16.0
/// deployRoot: /var/lib/hodos/deployments
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HodosConfig {
    /// Build server settings.
    pub builder: BuilderConfig,

    /// Generator settings.
    pub generator: GeneratorConfig,

    /// Root directory for deployed output; defaults to
    /// `~/.hodos/deployments`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy_root: Option<PathBuf>,
}

impl HodosConfig {
    /// Loads a configuration file, choosing JSON or YAML by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| BuilderError::io(path, e))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: Self = if is_json {
            serde_json::from_str(&text).map_err(hodos_core::Error::from)?
        } else {
            serde_yaml::from_str(&text).map_err(hodos_core::Error::from)?
        };

        config.builder.validate()?;
        Ok(config)
    }
}
