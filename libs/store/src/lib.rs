//! # depfleet-store
//!
//! The narrow interface to the key-addressed object store that the dispatch
//! core runs against.
//!
//! The store holds typed objects addressed by `(kind, namespace, name)` and
//! supports get/list/create/update/patch/delete with:
//!
//! - **Optimistic concurrency**: every object carries a `resource_version`
//!   that `update` checks and every write bumps.
//! - **Ownership**: an object may carry a back-reference to exactly one
//!   parent; deleting the parent cascades to everything it owns.
//! - **Merge patch**: `patch` applies a partial document to the stored body
//!   without a version check.
//!
//! [`MemoryStore`] is the in-process implementation used by the dev binary
//! and by the test suites. Production deployments substitute a real backend
//! behind the same [`ObjectStore`] trait.

mod error;
mod memory;
mod meta;
mod object;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use meta::{ObjectKey, ObjectMeta, OwnerRef};
pub use object::{Kind, RawObject, Resource};
pub use store::{ListFilter, ObjectStore};
