//! Set reconciliation: converge owned child objects onto a desired key set.
//!
//! Desired identifiers are mirrored as children named by their sanitized
//! form, stamped with the owner reference and the raw identifier; owned
//! children whose identifier is no longer desired are pruned. Objects with
//! a different or absent owner are never touched, even on a name collision.
//!
//! Per-item errors are collected, not short-circuited: one bad identifier
//! never blocks its siblings.

use std::collections::BTreeSet;

use depfleet_names::sanitize;
use depfleet_store::{ListFilter, ObjectKey, ObjectStore, OwnerRef, Resource};
use tracing::debug;

use crate::apply::apply;
use crate::error::{DispatchError, PartialFailure};
use crate::resources::ANNOTATION_SOURCE_ID;

/// Counts from a set reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOutcome {
    /// Children created or updated (unchanged applies are not counted).
    pub applied: usize,
    /// Owned children deleted because their identifier is gone.
    pub pruned: usize,
}

/// Reconcile the children of kind `T` owned by `owner` in `namespace`
/// against `desired` raw identifiers.
pub async fn reconcile_owned<T, F>(
    store: &dyn ObjectStore,
    namespace: &str,
    owner: &OwnerRef,
    desired: &[String],
    mut mutate: F,
) -> Result<SetOutcome, DispatchError>
where
    T: Resource + Default + PartialEq,
    F: FnMut(&str, &mut T),
{
    let mut outcome = SetOutcome::default();
    let mut errors: Vec<DispatchError> = Vec::new();
    let desired_ids: BTreeSet<&str> = desired.iter().map(String::as_str).collect();

    for id in desired {
        let name = match sanitize(id) {
            Ok(name) if !name.is_empty() => name,
            Ok(_) => {
                errors.push(DispatchError::Config(format!(
                    "identifier '{id}' sanitizes to an empty name"
                )));
                continue;
            }
            Err(e) => {
                errors.push(DispatchError::Config(format!(
                    "cannot derive object name for '{id}': {e}"
                )));
                continue;
            }
        };

        let key = ObjectKey::new(namespace, name);

        // A colliding name held by another owner is never adopted; the
        // item fails and its siblings continue.
        match store.get(T::KIND, &key).await {
            Ok(Some(existing)) if !existing.meta.is_owned_by(owner) => {
                errors.push(DispatchError::ForeignOwner {
                    key,
                    owner: owner.clone(),
                });
                continue;
            }
            Ok(_) => {}
            Err(e) => {
                errors.push(e.into());
                continue;
            }
        }

        let result = apply::<T, _>(store, &key, Some(owner), |draft| {
            draft
                .meta_mut()
                .annotations
                .insert(ANNOTATION_SOURCE_ID.to_string(), id.clone());
            mutate(id, draft);
        })
        .await;

        match result {
            Ok(r) if r.changed() => outcome.applied += 1,
            Ok(_) => {}
            Err(e) => errors.push(e.into()),
        }
    }

    // Prune owned children whose identifier is no longer desired.
    match store.list(T::KIND, namespace, &ListFilter::default()).await {
        Ok(existing) => {
            for raw in existing {
                if !raw.meta.is_owned_by(owner) {
                    continue;
                }
                let keep = raw
                    .meta
                    .annotations
                    .get(ANNOTATION_SOURCE_ID)
                    .is_some_and(|id| desired_ids.contains(id.as_str()));
                if keep {
                    continue;
                }
                debug!(kind = %T::KIND, key = %raw.key(), "pruning orphaned child");
                match store.delete(T::KIND, &raw.key()).await {
                    Ok(()) => outcome.pruned += 1,
                    Err(e) => errors.push(e.into()),
                }
            }
        }
        Err(e) => errors.push(e.into()),
    }

    if errors.is_empty() {
        Ok(outcome)
    } else {
        Err(PartialFailure::new(errors).into())
    }
}

#[cfg(test)]
mod tests {
    use depfleet_store::{Kind, MemoryStore, ObjectMeta, RawObject};

    use super::*;
    use crate::resources::Repository;

    fn owner() -> OwnerRef {
        OwnerRef::new(Kind::WorkGroup, "fleet", "nightly")
    }

    async fn seed_owned(store: &MemoryStore, name: &str, source_id: &str, owner: &OwnerRef) {
        let mut meta = ObjectMeta::new(&ObjectKey::new("fleet", name));
        meta.owner = Some(owner.clone());
        meta.annotations
            .insert(ANNOTATION_SOURCE_ID.into(), source_id.into());
        store
            .create(RawObject {
                kind: Kind::Repository,
                meta,
                data: serde_json::json!({"spec": {"source_id": source_id}}),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn creates_missing_and_prunes_orphaned() {
        let store = MemoryStore::new();
        let owner = owner();
        seed_owned(&store, "a", "a", &owner).await;
        seed_owned(&store, "c", "c", &owner).await;

        let desired = vec!["a".to_string(), "b".to_string()];
        let outcome = reconcile_owned::<Repository, _>(&store, "fleet", &owner, &desired, |id, r| {
            r.spec.source_id = id.to_string();
        })
        .await
        .unwrap();

        // "b" created, "a" left as-is or updated, "c" pruned.
        assert_eq!(outcome.pruned, 1);
        assert!(store
            .get(Kind::Repository, &ObjectKey::new("fleet", "b"))
            .await
            .unwrap()
            .is_some());
        assert!(store
            .get(Kind::Repository, &ObjectKey::new("fleet", "c"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn never_touches_objects_owned_by_someone_else() {
        let store = MemoryStore::new();
        let ours = owner();
        let theirs = OwnerRef::new(Kind::WorkGroup, "fleet", "weekly");
        seed_owned(&store, "c", "c", &theirs).await;

        let outcome =
            reconcile_owned::<Repository, _>(&store, "fleet", &ours, &[], |_, _| {}).await.unwrap();

        assert_eq!(outcome.pruned, 0);
        assert!(store
            .get(Kind::Repository, &ObjectKey::new("fleet", "c"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn colliding_name_held_by_another_owner_is_not_adopted() {
        let store = MemoryStore::new();
        let ours = owner();
        let theirs = OwnerRef::new(Kind::WorkGroup, "fleet", "weekly");
        // "org/a" sanitizes to "org-a", which the other group already holds.
        seed_owned(&store, "org-a", "org/x", &theirs).await;

        let desired = vec!["org/a".to_string()];
        let err = reconcile_owned::<Repository, _>(&store, "fleet", &ours, &desired, |id, r| {
            r.spec.source_id = id.to_string();
        })
        .await
        .unwrap_err();

        let DispatchError::Partial(partial) = err else {
            panic!("expected a joined failure, got {err}");
        };
        assert!(matches!(
            partial.errors[0],
            DispatchError::ForeignOwner { .. }
        ));

        // The colliding object keeps its owner and identifier.
        let raw = store
            .get(Kind::Repository, &ObjectKey::new("fleet", "org-a"))
            .await
            .unwrap()
            .unwrap();
        assert!(raw.meta.is_owned_by(&theirs));
        assert_eq!(
            raw.meta.annotations.get(ANNOTATION_SOURCE_ID),
            Some(&"org/x".to_string())
        );
    }

    #[tokio::test]
    async fn bad_identifier_does_not_block_siblings() {
        let store = MemoryStore::new();
        let owner = owner();

        let desired = vec!["!!!".to_string(), "owner/repo".to_string()];
        let err = reconcile_owned::<Repository, _>(&store, "fleet", &owner, &desired, |id, r| {
            r.spec.source_id = id.to_string();
        })
        .await
        .unwrap_err();

        assert!(matches!(err, DispatchError::Partial(_)));
        // The good sibling was still applied.
        assert!(store
            .get(Kind::Repository, &ObjectKey::new("fleet", "owner-repo"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn sanitized_names_key_the_children() {
        let store = MemoryStore::new();
        let owner = owner();

        let desired = vec!["Owner_Repo-123".to_string()];
        reconcile_owned::<Repository, _>(&store, "fleet", &owner, &desired, |id, r| {
            r.spec.source_id = id.to_string();
        })
        .await
        .unwrap();

        let raw = store
            .get(Kind::Repository, &ObjectKey::new("fleet", "owner-repo-123"))
            .await
            .unwrap()
            .expect("child present under sanitized name");
        assert_eq!(
            raw.meta.annotations.get(ANNOTATION_SOURCE_ID),
            Some(&"Owner_Repo-123".to_string())
        );
    }
}
