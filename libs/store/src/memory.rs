//! In-memory `ObjectStore` implementation.
//!
//! Backs the dev binary and the test suites. Semantics mirror what the
//! dispatch core expects from a real backend: monotonic resource versions,
//! conflict detection on update, RFC 7396 merge patch, and cascading delete
//! through owner references.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::meta::ObjectKey;
use crate::object::{Kind, RawObject};
use crate::store::{ListFilter, ObjectStore};

#[derive(Default)]
struct State {
    objects: BTreeMap<(Kind, ObjectKey), RawObject>,
    next_version: u64,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }
}

/// In-process object store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects of a kind, for test assertions.
    pub async fn count(&self, kind: Kind) -> usize {
        self.state
            .read()
            .await
            .objects
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<Option<RawObject>, StoreError> {
        let state = self.state.read().await;
        Ok(state.objects.get(&(kind, key.clone())).cloned())
    }

    async fn list(
        &self,
        kind: Kind,
        namespace: &str,
        filter: &ListFilter,
    ) -> Result<Vec<RawObject>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .objects
            .iter()
            .filter(|((k, key), _)| {
                *k == kind && (namespace.is_empty() || key.namespace == namespace)
            })
            .map(|(_, obj)| obj)
            .filter(|obj| filter.matches(&obj.meta))
            .cloned()
            .collect())
    }

    async fn create(&self, mut obj: RawObject) -> Result<RawObject, StoreError> {
        let mut state = self.state.write().await;
        let slot = (obj.kind, obj.key());
        if state.objects.contains_key(&slot) {
            return Err(StoreError::AlreadyExists {
                kind: obj.kind,
                key: obj.key(),
            });
        }
        obj.meta.resource_version = state.bump();
        state.objects.insert(slot, obj.clone());
        Ok(obj)
    }

    async fn update(&self, mut obj: RawObject) -> Result<RawObject, StoreError> {
        let mut state = self.state.write().await;
        let slot = (obj.kind, obj.key());
        let current = state.objects.get(&slot).ok_or_else(|| StoreError::NotFound {
            kind: obj.kind,
            key: obj.key(),
        })?;
        if current.meta.resource_version != obj.meta.resource_version {
            return Err(StoreError::Conflict {
                kind: obj.kind,
                key: obj.key(),
                expected: obj.meta.resource_version,
                actual: current.meta.resource_version,
            });
        }
        obj.meta.resource_version = state.bump();
        state.objects.insert(slot, obj.clone());
        Ok(obj)
    }

    async fn patch(&self, obj: RawObject) -> Result<RawObject, StoreError> {
        let mut state = self.state.write().await;
        let slot = (obj.kind, obj.key());
        let current = state.objects.get(&slot).ok_or_else(|| StoreError::NotFound {
            kind: obj.kind,
            key: obj.key(),
        })?;

        let mut merged = current.clone();
        json_merge(&mut merged.data, &obj.data);
        merged.meta.labels = obj.meta.labels;
        merged.meta.annotations = obj.meta.annotations;
        merged.meta.owner = obj.meta.owner;
        merged.meta.resource_version = state.bump();

        state.objects.insert(slot, merged.clone());
        Ok(merged)
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let mut pending = vec![(kind, key.clone())];
        while let Some(target) = pending.pop() {
            if state.objects.remove(&target).is_none() {
                continue;
            }
            let owned: Vec<(Kind, ObjectKey)> = state
                .objects
                .iter()
                .filter(|(_, obj)| {
                    obj.meta
                        .owner
                        .as_ref()
                        .is_some_and(|r| r.kind == target.0 && r.key() == target.1)
                })
                .map(|(slot, _)| slot.clone())
                .collect();
            pending.extend(owned);
        }
        Ok(())
    }
}

/// RFC 7396 merge patch: objects merge recursively, `null` deletes a key,
/// anything else replaces the target.
fn json_merge(target: &mut serde_json::Value, patch: &serde_json::Value) {
    match patch {
        serde_json::Value::Object(patch_map) => {
            if !target.is_object() {
                *target = serde_json::Value::Object(serde_json::Map::new());
            }
            if let serde_json::Value::Object(target_map) = target {
                for (key, value) in patch_map {
                    if value.is_null() {
                        target_map.remove(key);
                    } else {
                        json_merge(
                            target_map
                                .entry(key.clone())
                                .or_insert(serde_json::Value::Null),
                            value,
                        );
                    }
                }
            }
        }
        other => {
            *target = other.clone();
        }
    }
}
