//! Store record types
//!
//! Plain data rows as the store keeps them. The API crate owns the wire
//! shapes; these records only carry what the catalog persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tenant boundary. Every other entity references a project through its UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub uuid: String,
    pub name: String,
    pub description: String,
    pub created_by: String,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

/// Per-project role assignment for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRoles {
    pub project_uuid: String,
    pub roles: Vec<String>,
}

/// A user identity. `token` is the opaque bearer credential; collisions are
/// an invariant violation and rejected on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub uuid: String,
    pub name: String,
    pub token: String,
    pub email: String,
    pub projects: Vec<ProjectRoles>,
    pub service_roles: Vec<String>,
}

impl UserRecord {
    /// Roles this user holds within the given project.
    pub fn project_roles(&self, project_uuid: &str) -> Vec<String> {
        self.projects
            .iter()
            .find(|p| p.project_uuid == project_uuid)
            .map(|p| p.roles.clone())
            .unwrap_or_default()
    }

    /// Whether the user is a member of the given project.
    pub fn in_project(&self, project_uuid: &str) -> bool {
        self.projects.iter().any(|p| p.project_uuid == project_uuid)
    }
}

/// Route-name to allowed-roles mapping. A role is authorized for a route iff
/// it appears in the route's entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePolicy {
    pub route: String,
    pub roles: Vec<String>,
}

/// A named append-only stream inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub project_uuid: String,
    pub name: String,
}

/// A named consumer position over one topic.
///
/// `offset` is the committed low-water mark (next broker offset to consume).
/// `next_offset` is the end of the outstanding pull window; `0` means no ack
/// is pending, and `offset <= next_offset` holds whenever it is non-zero.
/// `pending_ack` is the wire-format UTC timestamp of the outstanding pull,
/// empty when idle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRecord {
    pub project_uuid: String,
    pub name: String,
    pub topic: String,
    pub offset: i64,
    pub next_offset: i64,
    pub pending_ack: String,
    pub push_endpoint: String,
    pub ack_deadline_secs: i64,
    pub retry_policy: String,
    pub retry_period_ms: u64,
}

impl SubRecord {
    /// Whether push delivery is configured.
    pub fn has_push(&self) -> bool {
        !self.push_endpoint.is_empty()
    }

    /// Broker topic key, `<project_uuid>.<topic>`.
    pub fn full_topic(&self) -> String {
        format!("{}.{}", self.project_uuid, self.topic)
    }
}

/// Per-resource list of usernames permitted the resource's dominant action
/// (publish for topics, consume for subscriptions).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    pub users: Vec<String>,
}

/// Which resource class an ACL operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclResource {
    Topic,
    Subscription,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_project_roles_lookup() {
        let user = UserRecord {
            uuid: "u1".into(),
            name: "alice".into(),
            token: "t1".into(),
            email: "alice@example.com".into(),
            projects: vec![ProjectRoles {
                project_uuid: "p1".into(),
                roles: vec!["admin".into(), "publisher".into()],
            }],
            service_roles: vec![],
        };

        assert_eq!(user.project_roles("p1"), vec!["admin", "publisher"]);
        assert!(user.project_roles("p2").is_empty());
        assert!(user.in_project("p1"));
        assert!(!user.in_project("p2"));
    }

    #[test]
    fn sub_full_topic() {
        let sub = SubRecord {
            project_uuid: "p1".into(),
            name: "s1".into(),
            topic: "orders".into(),
            offset: 0,
            next_offset: 0,
            pending_ack: String::new(),
            push_endpoint: String::new(),
            ack_deadline_secs: 10,
            retry_policy: "linear".into(),
            retry_period_ms: 3000,
        };

        assert_eq!(sub.full_topic(), "p1.orders");
        assert!(!sub.has_push());
    }
}
