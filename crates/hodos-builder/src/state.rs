//! Build state tracking.
//!
//! Every accepted submission gets a build record. The tracker also enforces
//! at most one in-flight build per tag: registering a tag that already has a
//! scheduled or running build hands back the existing build instead.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hodos_core::{BuildStatus, TagKey};
use serde::Serialize;
use tokio::sync::{watch, RwLock};

use crate::error::{BuilderError, Result};

/// Information about a tracked build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Unique build ID.
    pub id: String,

    /// Tag being built.
    pub key: TagKey,

    /// Current state.
    pub status: BuildStatus,

    /// When the build was accepted.
    pub submitted_at: DateTime<Utc>,

    /// When a worker started the build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the build ended (if terminal).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    /// Error message (if failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of registering a build for a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// A new build was registered under this id.
    New(String),
    /// The tag already has an in-flight build with this id.
    InFlight(String),
}

impl Registration {
    /// Returns the build id either way.
    pub fn build_id(&self) -> &str {
        match self {
            Self::New(id) | Self::InFlight(id) => id,
        }
    }
}

#[derive(Debug)]
struct TrackedBuild {
    info: BuildInfo,
    notify: watch::Sender<BuildStatus>,
}

#[derive(Debug, Default)]
struct TrackerState {
    builds: HashMap<String, TrackedBuild>,
    /// Tag to its in-flight build.
    in_flight: HashMap<TagKey, String>,
}

/// Tracks the state of builds.
#[derive(Debug)]
pub struct BuildTracker {
    state: RwLock<TrackerState>,

    /// Maximum number of finished builds to keep.
    max_history: usize,
}

impl BuildTracker {
    /// Creates a new build tracker.
    pub fn new() -> Self {
        Self::with_history_limit(100)
    }

    /// Creates a tracker with custom history limit.
    pub fn with_history_limit(max_history: usize) -> Self {
        Self {
            state: RwLock::new(TrackerState::default()),
            max_history,
        }
    }

    /// Registers a build for `key` unless one is already in flight.
    pub async fn register(&self, key: &TagKey) -> Registration {
        let mut state = self.state.write().await;
        if let Some(existing) = state.in_flight.get(key) {
            return Registration::InFlight(existing.clone());
        }

        let id = uuid::Uuid::now_v7().to_string();
        let (notify, _) = watch::channel(BuildStatus::Scheduled);
        let info = BuildInfo {
            id: id.clone(),
            key: key.clone(),
            status: BuildStatus::Scheduled,
            submitted_at: Utc::now(),
            started_at: None,
            ended_at: None,
            error: None,
        };

        state.in_flight.insert(key.clone(), id.clone());
        state.builds.insert(id.clone(), TrackedBuild { info, notify });
        Registration::New(id)
    }

    /// Forgets a registered build that was never scheduled.
    pub async fn discard(&self, build_id: &str) {
        let mut state = self.state.write().await;
        if let Some(tracked) = state.builds.remove(build_id) {
            state.in_flight.remove(&tracked.info.key);
        }
    }

    /// Marks a build as running.
    pub async fn start_build(&self, build_id: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let tracked = get_mut(&mut state, build_id)?;
        tracked.info.status = BuildStatus::Building;
        tracked.info.started_at = Some(Utc::now());
        tracked.notify.send_replace(BuildStatus::Building);
        Ok(())
    }

    /// Marks a build as successful.
    pub async fn complete_build(&self, build_id: &str) -> Result<()> {
        self.finish(build_id, BuildStatus::Successful, None).await
    }

    /// Marks a build as failed.
    pub async fn fail_build(&self, build_id: &str, error: String) -> Result<()> {
        self.finish(build_id, BuildStatus::Failed, Some(error)).await
    }

    async fn finish(&self, build_id: &str, status: BuildStatus, error: Option<String>) -> Result<()> {
        let mut state = self.state.write().await;
        let tracked = get_mut(&mut state, build_id)?;
        tracked.info.status = status;
        tracked.info.error = error;
        tracked.info.ended_at = Some(Utc::now());
        tracked.notify.send_replace(status);

        let key = tracked.info.key.clone();
        if state.in_flight.get(&key).is_some_and(|id| id == build_id) {
            state.in_flight.remove(&key);
        }

        self.cleanup_old_builds(&mut state);
        Ok(())
    }

    /// Gets a specific build.
    pub async fn get_build(&self, build_id: &str) -> Result<BuildInfo> {
        let state = self.state.read().await;
        state
            .builds
            .get(build_id)
            .map(|tracked| tracked.info.clone())
            .ok_or_else(|| BuilderError::BuildNotFound {
                build_id: build_id.to_string(),
            })
    }

    /// Lists all in-flight builds, oldest first.
    pub async fn list_active(&self) -> Vec<BuildInfo> {
        let state = self.state.read().await;
        let mut active: Vec<_> = state
            .builds
            .values()
            .filter(|tracked| !tracked.info.status.is_terminal())
            .map(|tracked| tracked.info.clone())
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        active
    }

    /// Waits until a build reaches a terminal state and returns it.
    pub async fn wait(&self, build_id: &str) -> Result<BuildInfo> {
        let mut receiver = {
            let state = self.state.read().await;
            let tracked = state
                .builds
                .get(build_id)
                .ok_or_else(|| BuilderError::BuildNotFound {
                    build_id: build_id.to_string(),
                })?;
            tracked.notify.subscribe()
        };

        // A closed channel means the record was evicted after finishing.
        let _ = receiver.wait_for(BuildStatus::is_terminal).await;
        self.get_build(build_id).await
    }

    fn cleanup_old_builds(&self, state: &mut TrackerState) {
        let mut finished: Vec<_> = state
            .builds
            .values()
            .filter(|tracked| tracked.info.status.is_terminal())
            .map(|tracked| (tracked.info.ended_at, tracked.info.id.clone()))
            .collect();
        if finished.len() <= self.max_history {
            return;
        }

        finished.sort();
        let to_remove = finished.len() - self.max_history;
        for (_, id) in finished.into_iter().take(to_remove) {
            state.builds.remove(&id);
        }
    }
}

impl Default for BuildTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn get_mut<'a>(state: &'a mut TrackerState, build_id: &str) -> Result<&'a mut TrackedBuild> {
    state
        .builds
        .get_mut(build_id)
        .ok_or_else(|| BuilderError::BuildNotFound {
            build_id: build_id.to_string(),
        })
}
