//! The store trait
//!
//! One polymorphic contract over the metadata catalog. Implementations must
//! be safe under concurrent access from request tasks and push workers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::records::{
    Acl, AclResource, ProjectRecord, ProjectRoles, SubRecord, TopicRecord, UserRecord,
};

/// Metadata store operations
///
/// Update operations are field-wise: an empty string (or empty slice) means
/// "leave unchanged". Timestamps cross this boundary in the wire layout
/// (`2006-01-02T15:04:05Z` style, see [`crate::TIMESTAMP_FORMAT`]) so the
/// ack deadline arithmetic matches what clients observe.
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Projects
    // =========================================================================

    /// Query projects by uuid and/or name. Both empty returns all projects;
    /// a filtered query with no match fails with `NotFound`.
    async fn query_projects(&self, uuid: &str, name: &str) -> Result<Vec<ProjectRecord>>;

    /// Insert a project. Fails with `Exists` on duplicate uuid or name.
    async fn insert_project(&self, project: ProjectRecord) -> Result<()>;

    /// Update a project's name/description, stamping `modified_on`.
    async fn update_project(
        &self,
        uuid: &str,
        name: &str,
        description: &str,
        modified_on: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove a project row. Topic/subscription cascade is the caller's job.
    async fn remove_project(&self, uuid: &str) -> Result<()>;

    /// Whether a project with this name exists.
    async fn has_project(&self, name: &str) -> bool;

    // =========================================================================
    // Users
    // =========================================================================

    /// Query users. Priority: uuid > name > project-scoped > global.
    /// A filtered query with no match fails with `NotFound`.
    async fn query_users(
        &self,
        project_uuid: &str,
        uuid: &str,
        name: &str,
    ) -> Result<Vec<UserRecord>>;

    /// Insert a user. Fails with `Exists` on duplicate uuid, name, or token.
    async fn insert_user(&self, user: UserRecord) -> Result<()>;

    /// Field-wise user update. Empty name/email and empty projects slice
    /// leave the stored values unchanged.
    async fn update_user(
        &self,
        uuid: &str,
        projects: &[ProjectRoles],
        name: &str,
        email: &str,
    ) -> Result<()>;

    /// Check a list of usernames against the catalog. Returns the
    /// all-present flag together with the names that were not found.
    async fn has_users(&self, project_uuid: &str, names: &[String]) -> (bool, Vec<String>);

    /// Resolve a bearer token to `(roles-in-project, username)`.
    /// Unknown tokens yield an empty role set and an empty name.
    async fn get_user_roles(&self, project_uuid: &str, token: &str) -> (Vec<String>, String);

    // =========================================================================
    // Topics
    // =========================================================================

    async fn insert_topic(&self, project_uuid: &str, name: &str) -> Result<()>;

    async fn remove_topic(&self, project_uuid: &str, name: &str) -> Result<()>;

    /// Query topics in a project; empty name returns all of them.
    async fn query_topics(&self, project_uuid: &str, name: &str) -> Result<Vec<TopicRecord>>;

    /// Remove every topic belonging to a project.
    async fn remove_project_topics(&self, project_uuid: &str) -> Result<()>;

    // =========================================================================
    // Subscriptions
    // =========================================================================

    async fn insert_sub(&self, sub: SubRecord) -> Result<()>;

    async fn remove_sub(&self, project_uuid: &str, name: &str) -> Result<()>;

    /// Query subscriptions in a project; empty name returns all of them.
    async fn query_subs(&self, project_uuid: &str, name: &str) -> Result<Vec<SubRecord>>;

    /// Fetch exactly one subscription, `NotFound` otherwise.
    async fn query_one_sub(&self, project_uuid: &str, name: &str) -> Result<SubRecord>;

    /// Remove every subscription belonging to a project.
    async fn remove_project_subs(&self, project_uuid: &str) -> Result<()>;

    /// Subscriptions with a configured push endpoint, for boot rehydration.
    async fn query_push_subs(&self) -> Vec<SubRecord>;

    /// Record that a pull up to `next_offset` was issued at `ts`: opens the
    /// ack window. Last writer wins under concurrent pulls; non-failing for
    /// unknown subscriptions.
    async fn update_sub_pull(&self, project_uuid: &str, name: &str, next_offset: i64, ts: &str);

    /// The ack state machine. Accepts `offset` iff an ack window is open,
    /// the offset lies inside it, and `ts` is within the deadline; on accept
    /// the committed offset advances and the window closes. Fails with
    /// `NoAckPending`, `WrongAck`, or `AckTimeout` and leaves state intact.
    async fn update_sub_offset_ack(
        &self,
        project_uuid: &str,
        name: &str,
        offset: i64,
        ts: &str,
    ) -> Result<()>;

    /// Unconditional offset advance, used by push delivery as its implicit
    /// ack after a 2xx from the endpoint.
    async fn update_sub_offset(&self, project_uuid: &str, name: &str, offset: i64);

    /// Replace a subscription's push configuration.
    async fn mod_sub_push(
        &self,
        project_uuid: &str,
        name: &str,
        endpoint: &str,
        retry_policy: &str,
        retry_period_ms: u64,
    ) -> Result<()>;

    // =========================================================================
    // ACLs and role policy
    // =========================================================================

    /// Read a resource's ACL. `NotFound` when the resource has none.
    async fn query_acl(&self, project_uuid: &str, resource: AclResource, name: &str)
    -> Result<Acl>;

    /// Replace a resource's ACL with the given user list.
    async fn mod_acl(
        &self,
        project_uuid: &str,
        resource: AclResource,
        name: &str,
        users: &[String],
    ) -> Result<()>;

    /// Whether any of `roles` is allowed to invoke the named route.
    async fn has_resource_roles(&self, route: &str, roles: &[String]) -> bool;
}
