//! Object identity, metadata, and ownership types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::object::Kind;

/// Address of an object within a kind: namespace plus name.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Back-reference from a child object to its single owning parent.
///
/// Deleting the parent cascades to every object that carries a matching
/// owner reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
}

impl OwnerRef {
    pub fn new(kind: Kind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// The owner's object key.
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Metadata carried by every stored object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// At most one owning parent.
    #[serde(default)]
    pub owner: Option<OwnerRef>,

    /// Monotonic version used for optimistic concurrency. Zero means
    /// "never persisted".
    #[serde(default)]
    pub resource_version: u64,
}

impl ObjectMeta {
    pub fn new(key: &ObjectKey) -> Self {
        Self {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// True when this object carries an owner reference matching `owner`.
    pub fn is_owned_by(&self, owner: &OwnerRef) -> bool {
        self.owner.as_ref() == Some(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display_is_namespace_slash_name() {
        let key = ObjectKey::new("fleet", "nightly");
        assert_eq!(key.to_string(), "fleet/nightly");
    }

    #[test]
    fn ownership_match_requires_identical_reference() {
        let owner = OwnerRef::new(Kind::WorkGroup, "fleet", "nightly");
        let other = OwnerRef::new(Kind::WorkGroup, "fleet", "weekly");

        let mut meta = ObjectMeta::new(&ObjectKey::new("fleet", "child"));
        assert!(!meta.is_owned_by(&owner));

        meta.owner = Some(owner.clone());
        assert!(meta.is_owned_by(&owner));
        assert!(!meta.is_owned_by(&other));
    }
}
