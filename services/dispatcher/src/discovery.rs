//! Reading the discovered repository set.
//!
//! Discovery itself is an external collaborator; it writes a JSON array of
//! raw repository identifier strings under the `repositories` key of the
//! group's dispatch config record. An absent record or key means "nothing
//! discovered yet"; a malformed payload is a configuration error.

use depfleet_store::{Kind, ObjectKey, ObjectStore};
use tracing::debug;

use crate::error::DispatchError;
use crate::resources::{ConfigRecord, WorkGroup, KEY_REPOSITORIES};

/// Fetch the discovered repository identifiers for a work group, in
/// discovery order.
pub async fn discovered_repositories(
    store: &dyn ObjectStore,
    group: &WorkGroup,
) -> Result<Vec<String>, DispatchError> {
    let key = ObjectKey::new(group.meta.namespace.clone(), group.dispatch_config_name());
    let Some(raw) = store.get(Kind::ConfigRecord, &key).await? else {
        debug!(config = %key, "no dispatch config record yet");
        return Ok(Vec::new());
    };

    let record: ConfigRecord = raw.decode().map_err(DispatchError::Store)?;
    let Some(payload) = record.data.get(KEY_REPOSITORIES) else {
        debug!(config = %key, "no repositories key in dispatch config record");
        return Ok(Vec::new());
    };

    serde_json::from_str::<Vec<String>>(payload).map_err(|e| {
        DispatchError::Config(format!(
            "malformed repository list in {key} '{KEY_REPOSITORIES}': {e}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use depfleet_store::{MemoryStore, ObjectMeta, RawObject};

    use super::*;

    fn group() -> WorkGroup {
        let mut g = WorkGroup::default();
        g.meta.namespace = "fleet".into();
        g.meta.name = "nightly".into();
        g
    }

    async fn seed_record(store: &MemoryStore, payload: Option<&str>) {
        let mut record = ConfigRecord::default();
        record.meta = ObjectMeta::new(&ObjectKey::new("fleet", "nightly-dispatch"));
        if let Some(payload) = payload {
            record
                .data
                .insert(KEY_REPOSITORIES.to_string(), payload.to_string());
        }
        store
            .create(RawObject::encode(&record).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn absent_record_yields_empty_set() {
        let store = MemoryStore::new();
        assert!(discovered_repositories(&store, &group())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn absent_key_yields_empty_set() {
        let store = MemoryStore::new();
        seed_record(&store, None).await;
        assert!(discovered_repositories(&store, &group())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn reads_identifiers_in_discovery_order() {
        let store = MemoryStore::new();
        seed_record(&store, Some(r#"["org/b", "org/a"]"#)).await;
        assert_eq!(
            discovered_repositories(&store, &group()).await.unwrap(),
            vec!["org/b".to_string(), "org/a".to_string()]
        );
    }

    #[tokio::test]
    async fn malformed_payload_is_a_config_error() {
        let store = MemoryStore::new();
        seed_record(&store, Some("{not json")).await;
        let err = discovered_repositories(&store, &group()).await.unwrap_err();
        assert!(err.is_config());
    }
}
