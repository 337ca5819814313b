//! The `ObjectStore` trait: the seam between the dispatch core and the
//! backing object store.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::meta::{ObjectKey, ObjectMeta};
use crate::object::{Kind, RawObject};

/// Server-side filter for list operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    /// Every entry must match the object's labels exactly.
    pub labels: BTreeMap<String, String>,

    /// Restrict to names with this prefix.
    pub name_prefix: Option<String>,
}

impl ListFilter {
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    /// True when `meta` satisfies every criterion of this filter.
    pub fn matches(&self, meta: &ObjectMeta) -> bool {
        if let Some(prefix) = &self.name_prefix {
            if !meta.name.starts_with(prefix.as_str()) {
                return false;
            }
        }
        self.labels
            .iter()
            .all(|(k, v)| meta.labels.get(k) == Some(v))
    }
}

/// Generic key-addressed object store.
///
/// All calls are async and honor the caller's cancellation by ordinary
/// future semantics: dropping the future aborts the pass.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one object, `None` when absent.
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<Option<RawObject>, StoreError>;

    /// List objects of a kind within a namespace. An empty namespace lists
    /// across all namespaces.
    async fn list(
        &self,
        kind: Kind,
        namespace: &str,
        filter: &ListFilter,
    ) -> Result<Vec<RawObject>, StoreError>;

    /// Create a new object. Fails with [`StoreError::AlreadyExists`] when
    /// the key is taken.
    async fn create(&self, obj: RawObject) -> Result<RawObject, StoreError>;

    /// Replace an existing object, enforcing the optimistic concurrency
    /// check against `obj.meta.resource_version`.
    async fn update(&self, obj: RawObject) -> Result<RawObject, StoreError>;

    /// Merge-patch an existing object: `obj.data` is merged into the stored
    /// body (nulls delete keys), metadata is taken from `obj.meta`, and no
    /// version check is performed.
    async fn patch(&self, obj: RawObject) -> Result<RawObject, StoreError>;

    /// Delete an object and, cascading, everything it transitively owns.
    /// Deleting an absent object is a no-op.
    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_labels_and_prefix() {
        let mut meta = ObjectMeta::new(&ObjectKey::new("ns", "nightly-renovate"));
        meta.labels.insert("group".into(), "nightly".into());

        let filter = ListFilter::default().with_label("group", "nightly");
        assert!(filter.matches(&meta));

        let filter = filter.with_name_prefix("nightly-");
        assert!(filter.matches(&meta));

        let filter = ListFilter::default().with_label("group", "weekly");
        assert!(!filter.matches(&meta));

        let filter = ListFilter::default().with_name_prefix("weekly-");
        assert!(!filter.matches(&meta));
    }
}
