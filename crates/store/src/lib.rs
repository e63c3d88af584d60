//! Courier metadata store
//!
//! The durable catalog behind the messaging API: projects, users, role
//! policies, topics, subscriptions (including their offset/ack state), and
//! per-resource ACLs.
//!
//! The store is accessed through the [`Store`] trait so the HTTP surface,
//! the push manager, and the tests can share one contract. Handlers hold an
//! `Arc<dyn Store>`; a per-request handle is just an `Arc` clone and is
//! released on every exit path by RAII.
//!
//! [`MemoryStore`] is the reference implementation: every operation runs
//! under a single mutex, which is all the serialization the consumption
//! state machine needs (mutations are per-subscription and short).

mod error;
mod memory;
mod records;
mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use records::{
    Acl, AclResource, ProjectRecord, ProjectRoles, RolePolicy, SubRecord, TopicRecord, UserRecord,
};
pub use store::Store;

/// Wire timestamp layout: UTC, second precision, trailing `Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
