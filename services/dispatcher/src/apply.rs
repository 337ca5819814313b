//! Idempotent apply: the generic create-or-update-or-no-op primitive.
//!
//! Callers pass a side-effecting mutate closure that populates desired
//! fields on a draft; `apply` decides whether anything actually needs to be
//! written. No write is issued when the mutated draft is structurally equal
//! to what the store already holds, which is what makes repeated
//! reconciliation passes cheap and safe.

use depfleet_store::{ObjectKey, ObjectStore, OwnerRef, RawObject, Resource, StoreError};
use tracing::debug;

/// Tri-state outcome of an idempotent apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    Created,
    Updated,
    Unchanged,
}

impl ApplyResult {
    /// True when a write was issued.
    pub fn changed(&self) -> bool {
        !matches!(self, ApplyResult::Unchanged)
    }
}

/// Apply failure, tagged with the phase that failed.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("failed to fetch {kind} {key}: {source}")]
    Get {
        kind: &'static str,
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("failed to create {kind} {key}: {source}")]
    Create {
        kind: &'static str,
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("failed to patch {kind} {key}: {source}")]
    Patch {
        kind: &'static str,
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
}

/// Fetch-mutate-write an object of kind `T` at `key`.
///
/// "Not found" on the fetch is not an error; it selects the create path.
/// When `owner` is given the draft is stamped with the ownership
/// back-reference before comparison, so adopting an orphan counts as a
/// change.
pub async fn apply<T, F>(
    store: &dyn ObjectStore,
    key: &ObjectKey,
    owner: Option<&OwnerRef>,
    mutate: F,
) -> Result<ApplyResult, ApplyError>
where
    T: Resource + Default + PartialEq,
    F: FnOnce(&mut T),
{
    let kind = T::KIND.as_str();

    let fetched = store
        .get(T::KIND, key)
        .await
        .map_err(|source| ApplyError::Get {
            kind,
            key: key.clone(),
            source,
        })?;

    let (mut draft, existed) = match &fetched {
        Some(raw) => {
            let decoded = raw.decode::<T>().map_err(|source| ApplyError::Get {
                kind,
                key: key.clone(),
                source,
            })?;
            (decoded, true)
        }
        None => {
            let mut fresh = T::default();
            fresh.meta_mut().namespace = key.namespace.clone();
            fresh.meta_mut().name = key.name.clone();
            (fresh, false)
        }
    };

    let snapshot = draft.clone();
    mutate(&mut draft);
    if let Some(owner) = owner {
        draft.meta_mut().owner = Some(owner.clone());
    }

    if !existed {
        let raw = RawObject::encode(&draft).map_err(|source| ApplyError::Create {
            kind,
            key: key.clone(),
            source,
        })?;
        store
            .create(raw)
            .await
            .map_err(|source| ApplyError::Create {
                kind,
                key: key.clone(),
                source,
            })?;
        debug!(kind, key = %key, "created object");
        return Ok(ApplyResult::Created);
    }

    if draft == snapshot {
        return Ok(ApplyResult::Unchanged);
    }

    let raw = RawObject::encode(&draft).map_err(|source| ApplyError::Patch {
        kind,
        key: key.clone(),
        source,
    })?;
    store.patch(raw).await.map_err(|source| ApplyError::Patch {
        kind,
        key: key.clone(),
        source,
    })?;
    debug!(kind, key = %key, "patched object");
    Ok(ApplyResult::Updated)
}

#[cfg(test)]
mod tests {
    use depfleet_store::{Kind, MemoryStore};

    use super::*;
    use crate::resources::ConfigRecord;

    fn key() -> ObjectKey {
        ObjectKey::new("fleet", "nightly-dispatch")
    }

    #[tokio::test]
    async fn creates_then_noops_then_updates() {
        let store = MemoryStore::new();
        let owner = OwnerRef::new(Kind::WorkGroup, "fleet", "nightly");

        let result = apply::<ConfigRecord, _>(&store, &key(), Some(&owner), |record| {
            record.data.insert("batches".into(), "[]".into());
        })
        .await
        .unwrap();
        assert_eq!(result, ApplyResult::Created);

        // Identical mutation: no write issued.
        let before = store.get(Kind::ConfigRecord, &key()).await.unwrap().unwrap();
        let result = apply::<ConfigRecord, _>(&store, &key(), Some(&owner), |record| {
            record.data.insert("batches".into(), "[]".into());
        })
        .await
        .unwrap();
        assert_eq!(result, ApplyResult::Unchanged);
        let after = store.get(Kind::ConfigRecord, &key()).await.unwrap().unwrap();
        assert_eq!(before.meta.resource_version, after.meta.resource_version);

        // Differing mutation patches.
        let result = apply::<ConfigRecord, _>(&store, &key(), Some(&owner), |record| {
            record.data.insert("batches".into(), "[1]".into());
        })
        .await
        .unwrap();
        assert_eq!(result, ApplyResult::Updated);

        let stored: ConfigRecord = store
            .get(Kind::ConfigRecord, &key())
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(stored.data.get("batches"), Some(&"[1]".to_string()));
        assert!(stored.meta.is_owned_by(&owner));
    }

    #[tokio::test]
    async fn mutation_preserves_unrelated_keys() {
        let store = MemoryStore::new();

        apply::<ConfigRecord, _>(&store, &key(), None, |record| {
            record.data.insert("repositories".into(), "[\"a\"]".into());
        })
        .await
        .unwrap();

        apply::<ConfigRecord, _>(&store, &key(), None, |record| {
            record.data.insert("batches".into(), "[]".into());
        })
        .await
        .unwrap();

        let stored: ConfigRecord = store
            .get(Kind::ConfigRecord, &key())
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(stored.data.len(), 2);
    }
}
