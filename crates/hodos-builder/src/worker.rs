//! Build execution.
//!
//! A worker takes one scheduled build from `Scheduled` to `Successful` or
//! `Failed`. Nothing that goes wrong here is returned to the submitter; the
//! outcome lands on the tag record and in the build tracker.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use hodos_core::{BuildStatus, Issue, PolicyGroupSnapshot, Tag, TagKey};
use hodos_generator::{GeneratedPolicy, Generator};
use tracing::{error, info, instrument, warn};

use crate::deployer::Deployer;
use crate::error::{BuilderError, Result};
use crate::repository::DesignRepository;
use crate::scheduler::ScheduledBuild;
use crate::state::BuildTracker;

/// Shared state every worker task runs builds with.
pub(crate) struct BuildWorker {
    pub(crate) generator: Arc<Generator>,
    pub(crate) repository: Arc<dyn DesignRepository>,
    pub(crate) deployer: Arc<dyn Deployer>,
    pub(crate) tracker: Arc<BuildTracker>,
}

impl BuildWorker {
    /// Runs one build to completion.
    #[instrument(
        skip_all,
        fields(
            build_id = %build.build_id,
            org = %build.key.org,
            group = %build.key.group,
            tag = %build.key.tag
        )
    )]
    pub(crate) async fn run(&self, build: ScheduledBuild) {
        let key = &build.key;
        let build_id = build.build_id.as_str();

        let tag = match self.repository.get_tag(key).await {
            Ok(Some(tag)) => tag,
            Ok(None) => {
                self.fail_untracked(build_id, BuilderError::TagNotFound { key: key.clone() })
                    .await;
                return;
            }
            Err(e) => {
                self.fail_untracked(build_id, e).await;
                return;
            }
        };

        let snapshot = match self.repository.get_tagged_snapshot(key).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                let e = BuilderError::SnapshotNotFound { key: key.clone() };
                self.finish(key, build_id, tag, Err(e)).await;
                return;
            }
            Err(e) => {
                self.finish(key, build_id, tag, Err(e)).await;
                return;
            }
        };

        if !tag.status.can_transition_to(BuildStatus::Building) {
            warn!(status = %tag.status, "Tag changed state while queued");
        }
        let building = Tag {
            status: BuildStatus::Building,
            ..tag
        };
        if let Err(e) = self.repository.update_tag(key, building.clone()).await {
            self.finish(key, build_id, building, Err(e)).await;
            return;
        }
        if let Err(e) = self.tracker.start_build(build_id).await {
            error!(error = %e, "Build record disappeared");
        }
        info!(policies = snapshot.policies.len(), "Building tag");

        let outcome = AssertUnwindSafe(self.compile_and_deploy(key, build_id, snapshot))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(BuilderError::Internal(format!(
                    "build panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        self.finish(key, build_id, building, outcome).await;
    }

    async fn compile_and_deploy(
        &self,
        key: &TagKey,
        build_id: &str,
        snapshot: PolicyGroupSnapshot,
    ) -> Result<Vec<Issue>> {
        let generator = Arc::clone(&self.generator);
        let generated: Vec<GeneratedPolicy> =
            tokio::task::spawn_blocking(move || generator.generate_snapshot(&snapshot))
                .await
                .map_err(|e| BuilderError::Internal(format!("generation task failed: {e}")))??;

        self.deployer.deploy(key, build_id, &generated).await?;

        let mut issues: Vec<Issue> = Vec::new();
        for issue in generated.iter().flat_map(|p| p.issues.iter()) {
            if !issues.contains(issue) {
                issues.push(issue.clone());
            }
        }
        Ok(issues)
    }

    /// Records the outcome on the tag and in the tracker.
    async fn finish(&self, key: &TagKey, build_id: &str, tag: Tag, outcome: Result<Vec<Issue>>) {
        let (status, issues, failure) = match outcome {
            Ok(issues) => (BuildStatus::Successful, issues, None),
            Err(e) => {
                warn!(error = %e, "Build failed");
                (BuildStatus::Failed, vec![e.to_issue()], Some(e.to_string()))
            }
        };

        let finished = Tag {
            status,
            issues,
            built_at: Some(Utc::now()),
            ..tag
        };
        let failure = match self.repository.update_tag(key, finished).await {
            Ok(()) => failure,
            Err(e) => {
                error!(error = %e, "Failed to record build outcome");
                Some(failure.unwrap_or_else(|| e.to_string()))
            }
        };

        let tracked = match failure {
            None => {
                info!("Build successful");
                self.tracker.complete_build(build_id).await
            }
            Some(reason) => self.tracker.fail_build(build_id, reason).await,
        };
        if let Err(e) = tracked {
            error!(error = %e, "Build record disappeared");
        }
    }

    /// Fails a build whose tag record cannot be updated.
    async fn fail_untracked(&self, build_id: &str, e: BuilderError) {
        error!(error = %e, "Tag unavailable for build");
        if let Err(e) = self.tracker.fail_build(build_id, e.to_string()).await {
            error!(error = %e, "Build record disappeared");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
