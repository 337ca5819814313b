//! Stored object representation and the typed resource seam.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::meta::{ObjectKey, ObjectMeta};

/// Object kinds known to the dispatch core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// User-declared intent to run scheduled work against a repository fleet.
    WorkGroup,
    /// One discovered repository, mirrored as an owned child object.
    Repository,
    /// String-keyed configuration data (discovered repositories, batch payloads).
    ConfigRecord,
    /// An execution unit dispatched for a work group.
    Job,
    /// A unit of work started under a job by the external runtime.
    Run,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::WorkGroup => "work_group",
            Kind::Repository => "repository",
            Kind::ConfigRecord => "config_record",
            Kind::Job => "job",
            Kind::Run => "run",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An object as the store holds it: kind, metadata envelope, and the
/// serialized body (spec/status/data fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObject {
    pub kind: Kind,
    pub meta: ObjectMeta,
    pub data: serde_json::Value,
}

impl RawObject {
    pub fn key(&self) -> ObjectKey {
        self.meta.key()
    }

    /// Encode a typed resource into its stored representation.
    ///
    /// The `meta` field moves onto the envelope; everything else becomes
    /// the body.
    pub fn encode<T: Resource>(value: &T) -> Result<Self, StoreError> {
        let mut body = serde_json::to_value(value)?;
        if let serde_json::Value::Object(map) = &mut body {
            map.remove("meta");
        }
        Ok(Self {
            kind: T::KIND,
            meta: value.meta().clone(),
            data: body,
        })
    }

    /// Decode the stored representation back into a typed resource.
    pub fn decode<T: Resource>(&self) -> Result<T, StoreError> {
        let mut body = self.data.clone();
        let meta = serde_json::to_value(&self.meta)?;
        match &mut body {
            serde_json::Value::Object(map) => {
                map.insert("meta".to_string(), meta);
            }
            other => {
                *other = serde_json::json!({ "meta": meta });
            }
        }
        Ok(serde_json::from_value(body)?)
    }
}

/// A typed resource that can round-trip through [`RawObject`].
///
/// Implementors are plain serde structs with a `meta: ObjectMeta` field.
pub trait Resource: Serialize + DeserializeOwned + Clone {
    const KIND: Kind;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;
}
