//! Design repository collaborator.
//!
//! The build server reads tagged snapshots and reads/writes tag records
//! through [`DesignRepository`]. [`InMemoryRepository`] keeps everything in
//! process and also offers the authoring operations that populate `master`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use hodos_core::{Endpoint, Policy, PolicyGroupSnapshot, Tag, TagKey, MASTER_TAG};
use parking_lot::RwLock;

use crate::error::Result;

/// Trait for the store holding policy groups and their tags.
#[async_trait]
pub trait DesignRepository: Send + Sync {
    /// Returns the snapshot stored under a tag.
    ///
    /// Exported snapshots satisfy the cross-policy resource invariant; a
    /// snapshot that does not is reported as an error.
    async fn get_tagged_snapshot(&self, key: &TagKey) -> Result<Option<PolicyGroupSnapshot>>;

    /// Returns a tag record.
    async fn get_tag(&self, key: &TagKey) -> Result<Option<Tag>>;

    /// Replaces a tag record.
    async fn update_tag(&self, key: &TagKey, tag: Tag) -> Result<()>;

    /// Lists the tags of a group, sorted by name.
    async fn list_tags(&self, org: &str, group: &str) -> Result<Vec<Tag>>;
}

#[derive(Debug, Clone)]
struct TaggedSnapshot {
    tag: Tag,
    snapshot: PolicyGroupSnapshot,
}

#[derive(Debug, Clone)]
struct GroupEntry {
    master: PolicyGroupSnapshot,
    tags: BTreeMap<String, TaggedSnapshot>,
}

/// In-process repository.
///
/// Only the `master` snapshot of a group is writable. Tagging deep-copies
/// `master`; the copy is never modified again, only its tag record is.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    groups: RwLock<BTreeMap<(String, String), GroupEntry>>,
}

fn invalid(reason: String) -> hodos_core::Error {
    hodos_core::Error::InvalidInput { reason }
}

impl InMemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or replaces the `master` snapshot of `snapshot.group` in
    /// `org`. Existing tags are kept.
    pub fn put_group(&self, org: &str, snapshot: PolicyGroupSnapshot) {
        let key = (org.to_string(), snapshot.group.name.clone());
        let mut groups = self.groups.write();
        match groups.get_mut(&key) {
            Some(entry) => entry.master = snapshot,
            None => {
                groups.insert(
                    key,
                    GroupEntry {
                        master: snapshot,
                        tags: BTreeMap::new(),
                    },
                );
            }
        }
    }

    /// Adds or replaces an endpoint on `master`.
    pub fn put_endpoint(&self, key: &TagKey, endpoint: Endpoint) -> Result<()> {
        self.with_master(key, |master| {
            let endpoints = &mut master.group.endpoints;
            match endpoints.iter_mut().find(|e| e.name == endpoint.name) {
                Some(existing) => *existing = endpoint,
                None => endpoints.push(endpoint),
            }
        })
    }

    /// Adds or replaces a policy and its definition on `master`.
    pub fn put_policy(&self, key: &TagKey, policy: Policy, definition: &str) -> Result<()> {
        self.with_master(key, |master| {
            master
                .definitions
                .insert(policy.name.clone(), definition.to_string());
            match master.policies.iter_mut().find(|p| p.name == policy.name) {
                Some(existing) => *existing = policy,
                None => master.policies.push(policy),
            }
        })
    }

    /// Sets a resource's content for a policy on `master`.
    pub fn put_resource(&self, key: &TagKey, policy: &str, resource: &str, content: &str) -> Result<()> {
        self.with_master(key, |master| {
            master
                .resources
                .entry(policy.to_string())
                .or_default()
                .insert(resource.to_string(), content.to_string());
        })
    }

    /// Returns a copy of a group's `master` snapshot.
    pub fn master(&self, org: &str, group: &str) -> Option<PolicyGroupSnapshot> {
        self.groups
            .read()
            .get(&(org.to_string(), group.to_string()))
            .map(|entry| entry.master.clone())
    }

    /// Tags the current `master` state of a group.
    ///
    /// The new tag record always starts in `Created` with no issues.
    pub fn create_tag(&self, org: &str, group: &str, tag: Tag) -> Result<Tag> {
        if tag.name == MASTER_TAG {
            return Err(invalid(format!("'{MASTER_TAG}' cannot be used as a tag name")).into());
        }

        let mut groups = self.groups.write();
        let entry = groups
            .get_mut(&(org.to_string(), group.to_string()))
            .ok_or_else(|| invalid(format!("group '{org}/{group}' not found")))?;
        if entry.tags.contains_key(&tag.name) {
            return Err(invalid(format!("tag '{org}/{group}/{}' already exists", tag.name)).into());
        }

        let tag = Tag {
            status: hodos_core::BuildStatus::Created,
            issues: Vec::new(),
            built_at: None,
            ..tag
        };
        entry.tags.insert(
            tag.name.clone(),
            TaggedSnapshot {
                tag: tag.clone(),
                snapshot: entry.master.clone(),
            },
        );

        tracing::info!(org, group, tag = %tag.name, "Created tag");
        Ok(tag)
    }

    fn with_master(&self, key: &TagKey, update: impl FnOnce(&mut PolicyGroupSnapshot)) -> Result<()> {
        if key.tag != MASTER_TAG {
            return Err(hodos_core::Error::ImmutableTag {
                tag: key.tag.clone(),
            }
            .into());
        }

        let mut groups = self.groups.write();
        let entry = groups
            .get_mut(&(key.org.clone(), key.group.clone()))
            .ok_or_else(|| invalid(format!("group '{}/{}' not found", key.org, key.group)))?;
        update(&mut entry.master);
        Ok(())
    }
}

#[async_trait]
impl DesignRepository for InMemoryRepository {
    async fn get_tagged_snapshot(&self, key: &TagKey) -> Result<Option<PolicyGroupSnapshot>> {
        let snapshot = {
            let groups = self.groups.read();
            let Some(entry) = groups.get(&(key.org.clone(), key.group.clone())) else {
                return Ok(None);
            };
            if key.tag == MASTER_TAG {
                Some(entry.master.clone())
            } else {
                entry.tags.get(&key.tag).map(|t| t.snapshot.clone())
            }
        };

        if let Some(snapshot) = &snapshot {
            snapshot.validate_resources()?;
        }
        Ok(snapshot)
    }

    async fn get_tag(&self, key: &TagKey) -> Result<Option<Tag>> {
        let groups = self.groups.read();
        Ok(groups
            .get(&(key.org.clone(), key.group.clone()))
            .and_then(|entry| entry.tags.get(&key.tag))
            .map(|t| t.tag.clone()))
    }

    async fn update_tag(&self, key: &TagKey, tag: Tag) -> Result<()> {
        let mut groups = self.groups.write();
        let tagged = groups
            .get_mut(&(key.org.clone(), key.group.clone()))
            .and_then(|entry| entry.tags.get_mut(&key.tag))
            .ok_or_else(|| invalid(format!("tag '{key}' not found")))?;

        tagged.tag = Tag {
            name: key.tag.clone(),
            ..tag
        };
        Ok(())
    }

    async fn list_tags(&self, org: &str, group: &str) -> Result<Vec<Tag>> {
        let groups = self.groups.read();
        Ok(groups
            .get(&(org.to_string(), group.to_string()))
            .map(|entry| entry.tags.values().map(|t| t.tag.clone()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuilderError;
    use hodos_core::{BuildStatus, PolicyGroup, Resource};

    fn master() -> TagKey {
        TagKey::new("acme", "activity", MASTER_TAG)
    }

    fn repository() -> InMemoryRepository {
        let repository = InMemoryRepository::new();
        repository.put_group(
            "acme",
            PolicyGroupSnapshot::new(
                PolicyGroup::new("activity").with_endpoint(Endpoint::new("out", "direct:out")),
            ),
        );
        repository
    }

    #[tokio::test]
    async fn test_tag_is_a_deep_copy_of_master() {
        let repository = repository();
        repository
            .put_policy(&master(), Policy::new("p"), "<route/>")
            .unwrap();

        let tag = repository
            .create_tag("acme", "activity", Tag::new("v1").with_created_by("ops"))
            .unwrap();
        assert_eq!(tag.status, BuildStatus::Created);

        repository
            .put_policy(&master(), Policy::new("q"), "<route/>")
            .unwrap();

        let key = TagKey::new("acme", "activity", "v1");
        let tagged = repository.get_tagged_snapshot(&key).await.unwrap().unwrap();
        assert_eq!(tagged.policies.len(), 1);
        assert_eq!(repository.master("acme", "activity").unwrap().policies.len(), 2);
    }

    #[tokio::test]
    async fn test_tagged_snapshot_is_immutable() {
        let repository = repository();
        repository
            .create_tag("acme", "activity", Tag::new("v1"))
            .unwrap();

        let key = TagKey::new("acme", "activity", "v1");
        let err = repository
            .put_policy(&key, Policy::new("p"), "<route/>")
            .unwrap_err();
        assert!(matches!(
            err,
            BuilderError::Core(hodos_core::Error::ImmutableTag { ref tag }) if tag == "v1"
        ));
        assert!(err.is_input_error());
        assert!(repository
            .put_endpoint(&key, Endpoint::new("x", "direct:x"))
            .is_err());
        assert!(repository.put_resource(&key, "p", "r", "c").is_err());
    }

    #[test]
    fn test_create_tag_rejects_master_and_duplicates() {
        let repository = repository();
        assert!(repository
            .create_tag("acme", "activity", Tag::new(MASTER_TAG))
            .is_err());

        repository
            .create_tag("acme", "activity", Tag::new("v1"))
            .unwrap();
        assert!(repository
            .create_tag("acme", "activity", Tag::new("v1"))
            .is_err());
        assert!(repository
            .create_tag("acme", "missing", Tag::new("v1"))
            .is_err());
    }

    #[tokio::test]
    async fn test_update_and_list_tags() {
        let repository = repository();
        repository
            .create_tag("acme", "activity", Tag::new("v2"))
            .unwrap();
        repository
            .create_tag("acme", "activity", Tag::new("v1"))
            .unwrap();

        let key = TagKey::new("acme", "activity", "v1");
        let mut tag = repository.get_tag(&key).await.unwrap().unwrap();
        tag.status = BuildStatus::Scheduled;
        repository.update_tag(&key, tag).await.unwrap();

        let tags = repository.list_tags("acme", "activity").await.unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["v1", "v2"]);
        assert_eq!(tags[0].status, BuildStatus::Scheduled);
        assert_eq!(tags[1].status, BuildStatus::Created);

        assert!(repository
            .update_tag(&TagKey::new("acme", "activity", "v9"), Tag::new("v9"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_lookups_return_none() {
        let repository = repository();
        let key = TagKey::new("acme", "activity", "v1");
        assert!(repository.get_tag(&key).await.unwrap().is_none());
        assert!(repository.get_tagged_snapshot(&key).await.unwrap().is_none());
        assert!(repository
            .list_tags("acme", "missing")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_export_validates_shared_resources() {
        let repository = repository();
        let key = master();
        repository
            .put_policy(
                &key,
                Policy::new("a").with_resource(Resource::new("shared.xsl")),
                "<route/>",
            )
            .unwrap();
        repository
            .put_policy(
                &key,
                Policy::new("b").with_resource(Resource::new("shared.xsl")),
                "<route/>",
            )
            .unwrap();
        repository.put_resource(&key, "a", "shared.xsl", "one").unwrap();
        repository.put_resource(&key, "b", "shared.xsl", "two").unwrap();
        repository
            .create_tag("acme", "activity", Tag::new("v1"))
            .unwrap();

        let err = repository
            .get_tagged_snapshot(&TagKey::new("acme", "activity", "v1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BuilderError::Core(hodos_core::Error::ResourceConflict { .. })
        ));
    }
}
