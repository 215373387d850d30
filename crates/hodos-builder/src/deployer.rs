//! Deployment of generated output.
//!
//! A [`Deployer`] receives every generated policy of a successful build.
//! [`FilesystemDeployer`] lays them out as
//!
//! ```text
//! <root>/<org>/<group>/<tag>/
//!     manifest.json
//!     <policy>/definition.xml
//!     <policy>/dependencies.json
//!     <policy>/resources/<name>
//! ```
//!
//! Output is written to a staging directory and moved into place once
//! complete, so a failed deployment never leaves a half-written tag.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hodos_core::TagKey;
use hodos_generator::GeneratedPolicy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{BuilderError, Result};

const MANIFEST_FILE: &str = "manifest.json";
const DEFINITION_FILE: &str = "definition.xml";
const DEPENDENCIES_FILE: &str = "dependencies.json";
const RESOURCES_DIR: &str = "resources";
const STAGING_SUFFIX: &str = ".staging";

/// Trait for the collaborator that publishes generated output.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Publishes the generated policies of one build.
    async fn deploy(
        &self,
        key: &TagKey,
        build_id: &str,
        policies: &[GeneratedPolicy],
    ) -> Result<DeploymentManifest>;
}

/// Record of a deployment, written next to the deployed policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManifest {
    /// Organization name.
    pub org: String,
    /// Policy group name.
    pub group: String,
    /// Tag name.
    pub tag: String,
    /// Build that produced the output.
    pub build_id: String,
    /// When the output was deployed.
    pub deployed_at: DateTime<Utc>,
    /// Deployed policies, in build order.
    pub policies: Vec<DeployedPolicy>,
}

/// One deployed policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedPolicy {
    /// Policy name.
    pub name: String,
    /// Hex SHA-256 of the definition.
    pub sha256: String,
    /// Number of dependency coordinates.
    pub dependencies: usize,
    /// Resource names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
}

/// Returns the hex SHA-256 of a definition.
pub fn checksum(definition: &str) -> String {
    hex::encode(Sha256::digest(definition.as_bytes()))
}

/// Deployer writing to a local directory tree.
#[derive(Debug, Clone)]
pub struct FilesystemDeployer {
    root: PathBuf,
}

impl FilesystemDeployer {
    /// Creates a deployer rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the default root, `~/.hodos/deployments`.
    pub fn default_root() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(".hodos")
            .join("deployments")
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory a tag is deployed to.
    pub fn tag_dir(&self, key: &TagKey) -> PathBuf {
        self.root.join(&key.org).join(&key.group).join(&key.tag)
    }

    /// Lists the deployed tags of a group, sorted by name.
    pub async fn list_deployed(&self, org: &str, group: &str) -> Result<Vec<String>> {
        let group_dir = self.root.join(org).join(group);
        let mut entries = match tokio::fs::read_dir(&group_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BuilderError::io(group_dir, e)),
        };

        let mut tags = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| BuilderError::io(&group_dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(STAGING_SUFFIX) {
                continue;
            }
            if tokio::fs::try_exists(entry.path().join(MANIFEST_FILE))
                .await
                .unwrap_or(false)
            {
                tags.push(name);
            }
        }

        tags.sort();
        Ok(tags)
    }

    /// Reads the manifest of a deployed tag.
    pub async fn read_manifest(&self, key: &TagKey) -> Result<Option<DeploymentManifest>> {
        let path = self.tag_dir(key).join(MANIFEST_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(
                serde_json::from_str(&text).map_err(hodos_core::Error::from)?,
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BuilderError::io(path, e)),
        }
    }

    async fn write_policy(&self, dir: &Path, policy: &GeneratedPolicy) -> Result<DeployedPolicy> {
        create_dir(dir).await?;
        write_file(&dir.join(DEFINITION_FILE), policy.definition.as_bytes()).await?;

        let dependencies =
            serde_json::to_vec_pretty(&policy.dependencies).map_err(hodos_core::Error::from)?;
        write_file(&dir.join(DEPENDENCIES_FILE), &dependencies).await?;

        for (name, content) in &policy.resources {
            let path = dir.join(RESOURCES_DIR).join(name);
            if let Some(parent) = path.parent() {
                create_dir(parent).await?;
            }
            write_file(&path, content.as_bytes()).await?;
        }

        Ok(DeployedPolicy {
            name: policy.policy.clone(),
            sha256: checksum(&policy.definition),
            dependencies: policy.dependencies.len(),
            resources: policy.resources.keys().cloned().collect(),
        })
    }
}

#[async_trait]
impl Deployer for FilesystemDeployer {
    async fn deploy(
        &self,
        key: &TagKey,
        build_id: &str,
        policies: &[GeneratedPolicy],
    ) -> Result<DeploymentManifest> {
        let rejected = |reason: String| BuilderError::Deployment {
            key: key.clone(),
            reason,
        };

        for name in [&key.org, &key.group, &key.tag] {
            if !is_single_component(name) {
                return Err(rejected(format!("'{name}' is not a valid directory name")));
            }
        }
        for policy in policies {
            if !is_single_component(&policy.policy) {
                return Err(rejected(format!(
                    "policy name '{}' is not a valid directory name",
                    policy.policy
                )));
            }
            if let Some(name) = policy.resources.keys().find(|n| !is_relative_path(n)) {
                return Err(rejected(format!(
                    "resource name '{name}' is not a relative path"
                )));
            }
        }

        let target = self.tag_dir(key);
        let staging = target.with_file_name(format!("{}{STAGING_SUFFIX}", key.tag));
        remove_dir(&staging).await?;
        create_dir(&staging).await?;

        let mut deployed = Vec::with_capacity(policies.len());
        for policy in policies {
            deployed.push(self.write_policy(&staging.join(&policy.policy), policy).await?);
        }

        let manifest = DeploymentManifest {
            org: key.org.clone(),
            group: key.group.clone(),
            tag: key.tag.clone(),
            build_id: build_id.to_string(),
            deployed_at: Utc::now(),
            policies: deployed,
        };
        let text = serde_json::to_vec_pretty(&manifest).map_err(hodos_core::Error::from)?;
        write_file(&staging.join(MANIFEST_FILE), &text).await?;

        remove_dir(&target).await?;
        tokio::fs::rename(&staging, &target)
            .await
            .map_err(|e| BuilderError::io(&target, e))?;

        tracing::info!(
            org = %key.org,
            group = %key.group,
            tag = %key.tag,
            build_id,
            policies = manifest.policies.len(),
            path = %target.display(),
            "Deployed build output"
        );
        Ok(manifest)
    }
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn is_relative_path(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

async fn create_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| BuilderError::io(path, e))
}

async fn remove_dir(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuilderError::io(path, e)),
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| BuilderError::io(path, e))
}
