//! Build scheduler.
//!
//! A bounded queue of build requests drained by a fixed pool of worker
//! tasks. Capacity is reserved before a build is accepted, so a caller learns
//! about back-pressure before any tag state changes.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use hodos_core::TagKey;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError, OwnedPermit};
use tokio::task::JoinHandle;

use crate::error::{BuilderError, Result};

/// Configuration for the build scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Number of worker tasks running builds concurrently.
    pub pool_size: usize,

    /// Queue size limit.
    pub max_queue_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: 10,
            max_queue_size: 100,
        }
    }
}

impl SchedulerConfig {
    /// Creates a configuration builder.
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }
}

/// Builder for `SchedulerConfig`.
#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    pool_size: Option<usize>,
    max_queue_size: Option<usize>,
}

impl SchedulerConfigBuilder {
    /// Sets the number of workers.
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = Some(size);
        self
    }

    /// Sets the maximum queue size.
    pub fn max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = Some(size);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            pool_size: self.pool_size.unwrap_or(defaults.pool_size),
            max_queue_size: self.max_queue_size.unwrap_or(defaults.max_queue_size),
        }
    }
}

/// A queued build request.
#[derive(Debug, Clone)]
pub struct ScheduledBuild {
    /// Build identifier.
    pub build_id: String,

    /// Tag to build.
    pub key: TagKey,

    /// When this build was queued.
    pub queued_at: Instant,
}

impl ScheduledBuild {
    /// Creates a new scheduled build.
    pub fn new(build_id: impl Into<String>, key: TagKey) -> Self {
        Self {
            build_id: build_id.into(),
            key,
            queued_at: Instant::now(),
        }
    }
}

/// Reserved queue capacity for one build.
///
/// Dropping the slot without scheduling releases the capacity.
#[derive(Debug)]
pub struct BuildSlot {
    permit: OwnedPermit<ScheduledBuild>,
}

impl BuildSlot {
    /// Hands the build to the worker pool.
    pub fn schedule(self, build: ScheduledBuild) {
        self.permit.send(build);
    }
}

/// Scheduler owning the build queue and its worker pool.
pub struct BuildScheduler {
    config: SchedulerConfig,
    sender: Mutex<Option<mpsc::Sender<ScheduledBuild>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl BuildScheduler {
    /// Creates the queue and spawns `pool_size` workers running `handler`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<F, Fut>(config: SchedulerConfig, handler: F) -> Self
    where
        F: Fn(ScheduledBuild) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<ScheduledBuild>(config.max_queue_size.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let handler = Arc::new(handler);

        let workers = (0..config.pool_size.max(1))
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    tracing::debug!(worker, "Build worker started");
                    loop {
                        let next = receiver.lock().await.recv().await;
                        let Some(build) = next else { break };
                        tracing::debug!(
                            worker,
                            build_id = %build.build_id,
                            waited = ?build.queued_at.elapsed(),
                            "Picked up build"
                        );
                        handler(build).await;
                    }
                    tracing::debug!(worker, "Build worker stopped");
                })
            })
            .collect();

        Self {
            config,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// Reserves queue capacity for one build.
    pub fn try_reserve(&self) -> Result<BuildSlot> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or(BuilderError::ShuttingDown)?;

        match sender.try_reserve_owned() {
            Ok(permit) => Ok(BuildSlot { permit }),
            Err(TrySendError::Full(_)) => Err(BuilderError::QueueFull {
                capacity: self.config.max_queue_size,
            }),
            Err(TrySendError::Closed(_)) => Err(BuilderError::ShuttingDown),
        }
    }

    /// Returns the number of queued or reserved builds.
    pub fn queue_length(&self) -> usize {
        self.sender.lock().as_ref().map_or(0, |sender| {
            sender.max_capacity().saturating_sub(sender.capacity())
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Stops accepting builds, lets the workers drain the queue, and waits
    /// for them to finish.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let workers: Vec<_> = self.workers.lock().drain(..).collect();

        for result in futures::future::join_all(workers).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Build worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for BuildScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildScheduler")
            .field("config", &self.config)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
