//! Hodos Build Server
//!
//! This crate turns "compile this tag" requests into scheduled, tracked
//! builds.
//!
//! # Overview
//!
//! The build server handles:
//! - **Submission**: validates the tag and moves it to `Scheduled` before
//!   returning, at most one in-flight build per tag
//! - **Execution**: a fixed pool of workers compiles every policy of the
//!   tagged snapshot and hands the output to a [`Deployer`]
//! - **Tracking**: build records with ids, timestamps and completion waits
//!
//! # Architecture
//!
//! ```text
//!   submit(org, group, tag)
//!            │
//!            ▼
//!   ┌─────────────────┐   bounded queue   ┌──────────────┐
//!   │   BuildServer   │ ─────────────────▶│ worker pool  │
//!   └────────┬────────┘                   └──────┬───────┘
//!            │ tag status                        │ generate_snapshot
//!            ▼                                   ▼
//!   ┌─────────────────┐                   ┌──────────────┐
//!   │DesignRepository │◀──────────────────│   Deployer   │
//!   └─────────────────┘   outcome+issues  └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hodos_builder::{BuildServer, BuilderConfig, FilesystemDeployer, InMemoryRepository};
//! use hodos_core::{PolicyGroupSnapshot, Tag, TagKey};
//! use hodos_generator::{Generator, GeneratorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let repository = Arc::new(InMemoryRepository::new());
//!     repository.put_group("acme", PolicyGroupSnapshot::from_file("activity.yaml")?);
//!     repository.create_tag("acme", "activity", Tag::new("v1"))?;
//!
//!     let server = BuildServer::start(
//!         &BuilderConfig::default(),
//!         Generator::new(&GeneratorConfig::default())?,
//!         repository.clone(),
//!         Arc::new(FilesystemDeployer::new(FilesystemDeployer::default_root())),
//!     )?;
//!
//!     let build_id = server.submit(&TagKey::new("acme", "activity", "v1")).await?;
//!     let build = server.wait(&build_id).await?;
//!     println!("{}: {}", build.key, build.status);
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::significant_drop_tightening)]

pub mod config;
pub mod deployer;
pub mod error;
pub mod repository;
pub mod scheduler;
pub mod state;
mod worker;

use std::sync::Arc;

use hodos_core::{BuildStatus, Tag, TagKey};
use hodos_generator::Generator;
use tracing::{info, instrument};

// Re-export main types at crate root
pub use config::{BuilderConfig, HodosConfig};
pub use deployer::{DeployedPolicy, Deployer, DeploymentManifest, FilesystemDeployer};
pub use error::{BuilderError, Result};
pub use repository::{DesignRepository, InMemoryRepository};
pub use scheduler::{BuildScheduler, ScheduledBuild, SchedulerConfig};
pub use state::{BuildInfo, BuildTracker, Registration};

use worker::BuildWorker;

/// The build server.
///
/// Accepts build submissions for tags and runs them on a fixed-size worker
/// pool. Dropping the server without calling [`shutdown`](Self::shutdown)
/// leaves queued builds to finish in the background.
pub struct BuildServer {
    repository: Arc<dyn DesignRepository>,
    tracker: Arc<BuildTracker>,
    scheduler: BuildScheduler,
}

impl BuildServer {
    /// Starts a build server and its workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        config: &BuilderConfig,
        generator: Generator,
        repository: Arc<dyn DesignRepository>,
        deployer: Arc<dyn Deployer>,
    ) -> Result<Self> {
        config.validate()?;

        let tracker = Arc::new(BuildTracker::with_history_limit(config.history_limit));
        let worker = Arc::new(BuildWorker {
            generator: Arc::new(generator),
            repository: Arc::clone(&repository),
            deployer,
            tracker: Arc::clone(&tracker),
        });

        let scheduler = BuildScheduler::start(config.scheduler.clone(), move |build| {
            let worker = Arc::clone(&worker);
            async move { worker.run(build).await }
        });

        info!(
            pool_size = config.scheduler.pool_size,
            max_queue_size = config.scheduler.max_queue_size,
            "Build server started"
        );

        Ok(Self {
            repository,
            tracker,
            scheduler,
        })
    }

    /// Submits a tag for building and returns the build id.
    ///
    /// The tag is `Scheduled` by the time this returns. Submitting a tag
    /// whose build is still scheduled or running returns that build's id and
    /// changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`BuilderError::TagNotFound`] if the tag does not exist, and
    /// [`BuilderError::QueueFull`] or [`BuilderError::ShuttingDown`] if the
    /// build cannot be queued. None of these change the tag.
    #[instrument(skip(self), fields(org = %key.org, group = %key.group, tag = %key.tag))]
    pub async fn submit(&self, key: &TagKey) -> Result<String> {
        if self.repository.get_tag(key).await?.is_none() {
            return Err(BuilderError::TagNotFound { key: key.clone() });
        }

        let build_id = match self.tracker.register(key).await {
            Registration::New(id) => id,
            Registration::InFlight(id) => {
                info!(build_id = %id, "Build already in flight");
                return Ok(id);
            }
        };

        let slot = match self.scheduler.try_reserve() {
            Ok(slot) => slot,
            Err(e) => {
                self.tracker.discard(&build_id).await;
                return Err(e);
            }
        };

        if let Err(e) = self.mark_scheduled(key).await {
            self.tracker.discard(&build_id).await;
            return Err(e);
        }

        slot.schedule(ScheduledBuild::new(build_id.clone(), key.clone()));
        info!(build_id = %build_id, "Build scheduled");
        Ok(build_id)
    }

    /// Persists `Scheduled` on a fresh copy of the tag, since a previous
    /// build may have finished after the lookup in `submit`.
    async fn mark_scheduled(&self, key: &TagKey) -> Result<()> {
        let tag = self
            .repository
            .get_tag(key)
            .await?
            .ok_or_else(|| BuilderError::TagNotFound { key: key.clone() })?;
        let scheduled = Tag {
            status: BuildStatus::Scheduled,
            issues: Vec::new(),
            ..tag
        };
        self.repository.update_tag(key, scheduled).await
    }

    /// Submits `(org, group, tag)` for building.
    pub async fn compile(&self, org: &str, group: &str, tag: &str) -> Result<String> {
        self.submit(&TagKey::new(org, group, tag)).await
    }

    /// Waits for a build to finish and returns its final record.
    pub async fn wait(&self, build_id: &str) -> Result<BuildInfo> {
        self.tracker.wait(build_id).await
    }

    /// Returns a build record.
    pub async fn build(&self, build_id: &str) -> Result<BuildInfo> {
        self.tracker.get_build(build_id).await
    }

    /// Lists builds that are scheduled or running.
    pub async fn active_builds(&self) -> Vec<BuildInfo> {
        self.tracker.list_active().await
    }

    /// Returns the number of builds waiting for a worker.
    pub fn queue_length(&self) -> usize {
        self.scheduler.queue_length()
    }

    /// Stops accepting builds and waits for queued builds to finish.
    pub async fn shutdown(&self) {
        info!("Build server shutting down");
        self.scheduler.shutdown().await;
    }
}

impl std::fmt::Debug for BuildServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildServer")
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
