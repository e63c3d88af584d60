//! In-memory store
//!
//! Reference implementation of [`Store`]: every operation takes the one
//! mutex, mutates plain vectors and maps, and releases. Good enough for the
//! daemon's standalone mode and the entire test suite; a persistent backend
//! implements the same trait.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::records::{
    Acl, AclResource, ProjectRecord, ProjectRoles, RolePolicy, SubRecord, TopicRecord, UserRecord,
};
use crate::store::Store;
use crate::TIMESTAMP_FORMAT;

#[derive(Default)]
struct Inner {
    projects: Vec<ProjectRecord>,
    users: Vec<UserRecord>,
    topics: Vec<TopicRecord>,
    subs: Vec<SubRecord>,
    role_policies: Vec<RolePolicy>,
    topic_acls: HashMap<(String, String), Acl>,
    sub_acls: HashMap<(String, String), Acl>,
}

impl Inner {
    fn acls(&self, resource: AclResource) -> &HashMap<(String, String), Acl> {
        match resource {
            AclResource::Topic => &self.topic_acls,
            AclResource::Subscription => &self.sub_acls,
        }
    }

    fn acls_mut(&mut self, resource: AclResource) -> &mut HashMap<(String, String), Acl> {
        match resource {
            AclResource::Topic => &mut self.topic_acls,
            AclResource::Subscription => &mut self.sub_acls,
        }
    }
}

/// In-memory [`Store`] implementation, serialized under a single mutex.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store with the default route-policy table.
    pub fn new() -> Self {
        let store = Self::default();
        store.lock().role_policies = default_role_policies();
        store
    }

    /// Create a store populated with the demo fixture: one project, users
    /// covering the admin / publisher-only / consumer-only shapes, three
    /// topics with subscriptions (one push-enabled), and ACLs.
    pub fn seeded() -> Self {
        let store = Self::new();
        {
            let mut inner = store.lock();

            let project_uuid = Uuid::new_v4().to_string();
            let now = Utc::now();
            inner.projects.push(ProjectRecord {
                uuid: project_uuid.clone(),
                name: "demo".into(),
                description: "demo project".into(),
                created_by: "alice".into(),
                created_on: now,
                modified_on: now,
            });

            let member = |roles: &[&str]| {
                vec![ProjectRoles {
                    project_uuid: project_uuid.clone(),
                    roles: roles.iter().map(|r| r.to_string()).collect(),
                }]
            };
            let user = |name: &str, token: &str, projects: Vec<ProjectRoles>| UserRecord {
                uuid: Uuid::new_v4().to_string(),
                name: name.into(),
                token: token.into(),
                email: format!("{name}@example.com"),
                projects,
                service_roles: vec![],
            };
            inner
                .users
                .push(user("alice", "alice-key", member(&["admin"])));
            inner
                .users
                .push(user("paul", "paul-key", member(&["publisher"])));
            inner
                .users
                .push(user("carol", "carol-key", member(&["consumer"])));
            inner.users.push(user(
                "bob",
                "bob-key",
                member(&["publisher", "consumer"]),
            ));

            for name in ["orders", "invoices", "alerts"] {
                inner.topics.push(TopicRecord {
                    project_uuid: project_uuid.clone(),
                    name: name.into(),
                });
                inner
                    .topic_acls
                    .insert((project_uuid.clone(), name.into()), Acl::default());
            }

            let sub = |name: &str, topic: &str, endpoint: &str| SubRecord {
                project_uuid: project_uuid.clone(),
                name: name.into(),
                topic: topic.into(),
                offset: 0,
                next_offset: 0,
                pending_ack: String::new(),
                push_endpoint: endpoint.into(),
                ack_deadline_secs: 10,
                retry_policy: "linear".into(),
                retry_period_ms: 3000,
            };
            inner.subs.push(sub("orders-sub", "orders", ""));
            inner.subs.push(sub("invoices-sub", "invoices", ""));
            inner.subs.push(sub(
                "alerts-push",
                "alerts",
                "http://localhost:9100/receive",
            ));
            for name in ["orders-sub", "invoices-sub", "alerts-push"] {
                inner
                    .sub_acls
                    .insert((project_uuid.clone(), name.into()), Acl::default());
            }

            let acl = |users: &[&str]| Acl {
                users: users.iter().map(|u| u.to_string()).collect(),
            };
            inner
                .topic_acls
                .insert((project_uuid.clone(), "orders".into()), acl(&["alice", "paul"]));
            inner.sub_acls.insert(
                (project_uuid.clone(), "orders-sub".into()),
                acl(&["alice", "carol"]),
            );
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Recover from a poisoned mutex: the data is plain rows, a panicked
        // writer cannot leave them structurally broken.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn parse_ts(ts: &str) -> Result<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT)
            .map(|t| t.and_utc())
            .map_err(|e| StoreError::Internal(format!("bad timestamp {ts:?}: {e}")))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn query_projects(&self, uuid: &str, name: &str) -> Result<Vec<ProjectRecord>> {
        let inner = self.lock();
        if uuid.is_empty() && name.is_empty() {
            return Ok(inner.projects.clone());
        }
        let result: Vec<_> = inner
            .projects
            .iter()
            .filter(|p| {
                if !name.is_empty() {
                    p.name == name
                } else {
                    p.uuid == uuid
                }
            })
            .cloned()
            .collect();
        if result.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(result)
    }

    async fn insert_project(&self, project: ProjectRecord) -> Result<()> {
        let mut inner = self.lock();
        if inner
            .projects
            .iter()
            .any(|p| p.uuid == project.uuid || p.name == project.name)
        {
            return Err(StoreError::Exists);
        }
        inner.projects.push(project);
        Ok(())
    }

    async fn update_project(
        &self,
        uuid: &str,
        name: &str,
        description: &str,
        modified_on: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let project = inner
            .projects
            .iter_mut()
            .find(|p| p.uuid == uuid)
            .ok_or(StoreError::NotFound)?;
        if !name.is_empty() {
            project.name = name.to_string();
        }
        if !description.is_empty() {
            project.description = description.to_string();
        }
        project.modified_on = modified_on;
        Ok(())
    }

    async fn remove_project(&self, uuid: &str) -> Result<()> {
        let mut inner = self.lock();
        let before = inner.projects.len();
        inner.projects.retain(|p| p.uuid != uuid);
        if inner.projects.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn has_project(&self, name: &str) -> bool {
        self.lock().projects.iter().any(|p| p.name == name)
    }

    async fn query_users(
        &self,
        project_uuid: &str,
        uuid: &str,
        name: &str,
    ) -> Result<Vec<UserRecord>> {
        let inner = self.lock();
        let result: Vec<_> = if !uuid.is_empty() {
            inner.users.iter().filter(|u| u.uuid == uuid).cloned().collect()
        } else if !name.is_empty() {
            inner.users.iter().filter(|u| u.name == name).cloned().collect()
        } else if !project_uuid.is_empty() {
            inner
                .users
                .iter()
                .filter(|u| u.in_project(project_uuid))
                .cloned()
                .collect()
        } else {
            return Ok(inner.users.clone());
        };
        if result.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(result)
    }

    async fn insert_user(&self, user: UserRecord) -> Result<()> {
        let mut inner = self.lock();
        if inner
            .users
            .iter()
            .any(|u| u.uuid == user.uuid || u.name == user.name || u.token == user.token)
        {
            return Err(StoreError::Exists);
        }
        inner.users.push(user);
        Ok(())
    }

    async fn update_user(
        &self,
        uuid: &str,
        projects: &[ProjectRoles],
        name: &str,
        email: &str,
    ) -> Result<()> {
        let mut inner = self.lock();
        let user = inner
            .users
            .iter_mut()
            .find(|u| u.uuid == uuid)
            .ok_or(StoreError::NotFound)?;
        if !projects.is_empty() {
            user.projects = projects.to_vec();
        }
        if !name.is_empty() {
            user.name = name.to_string();
        }
        if !email.is_empty() {
            user.email = email.to_string();
        }
        Ok(())
    }

    async fn has_users(&self, project_uuid: &str, names: &[String]) -> (bool, Vec<String>) {
        let inner = self.lock();
        let missing: Vec<String> = names
            .iter()
            .filter(|name| {
                !inner
                    .users
                    .iter()
                    .any(|u| &u.name == *name && u.in_project(project_uuid))
            })
            .cloned()
            .collect();
        (missing.is_empty(), missing)
    }

    async fn get_user_roles(&self, project_uuid: &str, token: &str) -> (Vec<String>, String) {
        let inner = self.lock();
        inner
            .users
            .iter()
            .find(|u| u.token == token)
            .map(|u| (u.project_roles(project_uuid), u.name.clone()))
            .unwrap_or_default()
    }

    async fn insert_topic(&self, project_uuid: &str, name: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner
            .topics
            .iter()
            .any(|t| t.project_uuid == project_uuid && t.name == name)
        {
            return Err(StoreError::Exists);
        }
        inner.topics.push(TopicRecord {
            project_uuid: project_uuid.to_string(),
            name: name.to_string(),
        });
        inner
            .topic_acls
            .insert((project_uuid.to_string(), name.to_string()), Acl::default());
        Ok(())
    }

    async fn remove_topic(&self, project_uuid: &str, name: &str) -> Result<()> {
        let mut inner = self.lock();
        let before = inner.topics.len();
        inner
            .topics
            .retain(|t| !(t.project_uuid == project_uuid && t.name == name));
        if inner.topics.len() == before {
            return Err(StoreError::NotFound);
        }
        inner
            .topic_acls
            .remove(&(project_uuid.to_string(), name.to_string()));
        Ok(())
    }

    async fn query_topics(&self, project_uuid: &str, name: &str) -> Result<Vec<TopicRecord>> {
        let inner = self.lock();
        Ok(inner
            .topics
            .iter()
            .filter(|t| t.project_uuid == project_uuid && (name.is_empty() || t.name == name))
            .cloned()
            .collect())
    }

    async fn remove_project_topics(&self, project_uuid: &str) -> Result<()> {
        let mut inner = self.lock();
        let before = inner.topics.len();
        inner.topics.retain(|t| t.project_uuid != project_uuid);
        if inner.topics.len() == before {
            return Err(StoreError::NotFound);
        }
        inner.topic_acls.retain(|(p, _), _| p != project_uuid);
        Ok(())
    }

    async fn insert_sub(&self, sub: SubRecord) -> Result<()> {
        let mut inner = self.lock();
        if inner
            .subs
            .iter()
            .any(|s| s.project_uuid == sub.project_uuid && s.name == sub.name)
        {
            return Err(StoreError::Exists);
        }
        inner
            .sub_acls
            .insert((sub.project_uuid.clone(), sub.name.clone()), Acl::default());
        inner.subs.push(sub);
        Ok(())
    }

    async fn remove_sub(&self, project_uuid: &str, name: &str) -> Result<()> {
        let mut inner = self.lock();
        let before = inner.subs.len();
        inner
            .subs
            .retain(|s| !(s.project_uuid == project_uuid && s.name == name));
        if inner.subs.len() == before {
            return Err(StoreError::NotFound);
        }
        inner
            .sub_acls
            .remove(&(project_uuid.to_string(), name.to_string()));
        Ok(())
    }

    async fn query_subs(&self, project_uuid: &str, name: &str) -> Result<Vec<SubRecord>> {
        let inner = self.lock();
        Ok(inner
            .subs
            .iter()
            .filter(|s| s.project_uuid == project_uuid && (name.is_empty() || s.name == name))
            .cloned()
            .collect())
    }

    async fn query_one_sub(&self, project_uuid: &str, name: &str) -> Result<SubRecord> {
        let inner = self.lock();
        inner
            .subs
            .iter()
            .find(|s| s.project_uuid == project_uuid && s.name == name)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn remove_project_subs(&self, project_uuid: &str) -> Result<()> {
        let mut inner = self.lock();
        let before = inner.subs.len();
        inner.subs.retain(|s| s.project_uuid != project_uuid);
        if inner.subs.len() == before {
            return Err(StoreError::NotFound);
        }
        inner.sub_acls.retain(|(p, _), _| p != project_uuid);
        Ok(())
    }

    async fn query_push_subs(&self) -> Vec<SubRecord> {
        self.lock()
            .subs
            .iter()
            .filter(|s| s.has_push())
            .cloned()
            .collect()
    }

    async fn update_sub_pull(&self, project_uuid: &str, name: &str, next_offset: i64, ts: &str) {
        let mut inner = self.lock();
        if let Some(sub) = inner
            .subs
            .iter_mut()
            .find(|s| s.project_uuid == project_uuid && s.name == name)
        {
            sub.next_offset = next_offset;
            sub.pending_ack = ts.to_string();
        }
    }

    async fn update_sub_offset_ack(
        &self,
        project_uuid: &str,
        name: &str,
        offset: i64,
        ts: &str,
    ) -> Result<()> {
        let mut inner = self.lock();
        let sub = inner
            .subs
            .iter_mut()
            .find(|s| s.project_uuid == project_uuid && s.name == name)
            .ok_or(StoreError::NotFound)?;

        if sub.next_offset == 0 {
            return Err(StoreError::NoAckPending);
        }
        if offset < sub.offset || offset > sub.next_offset {
            return Err(StoreError::WrongAck);
        }

        let given = Self::parse_ts(ts)?;
        let pending = Self::parse_ts(&sub.pending_ack)?;
        if (given - pending).num_seconds() > sub.ack_deadline_secs {
            return Err(StoreError::AckTimeout);
        }

        sub.offset = offset;
        sub.next_offset = 0;
        sub.pending_ack.clear();
        Ok(())
    }

    async fn update_sub_offset(&self, project_uuid: &str, name: &str, offset: i64) {
        let mut inner = self.lock();
        if let Some(sub) = inner
            .subs
            .iter_mut()
            .find(|s| s.project_uuid == project_uuid && s.name == name)
        {
            sub.offset = offset;
        }
    }

    async fn mod_sub_push(
        &self,
        project_uuid: &str,
        name: &str,
        endpoint: &str,
        retry_policy: &str,
        retry_period_ms: u64,
    ) -> Result<()> {
        let mut inner = self.lock();
        let sub = inner
            .subs
            .iter_mut()
            .find(|s| s.project_uuid == project_uuid && s.name == name)
            .ok_or(StoreError::NotFound)?;
        sub.push_endpoint = endpoint.to_string();
        sub.retry_policy = retry_policy.to_string();
        sub.retry_period_ms = retry_period_ms;
        Ok(())
    }

    async fn query_acl(
        &self,
        project_uuid: &str,
        resource: AclResource,
        name: &str,
    ) -> Result<Acl> {
        let inner = self.lock();
        inner
            .acls(resource)
            .get(&(project_uuid.to_string(), name.to_string()))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn mod_acl(
        &self,
        project_uuid: &str,
        resource: AclResource,
        name: &str,
        users: &[String],
    ) -> Result<()> {
        let mut inner = self.lock();
        let acl = inner
            .acls_mut(resource)
            .get_mut(&(project_uuid.to_string(), name.to_string()))
            .ok_or(StoreError::NotFound)?;
        acl.users = users.to_vec();
        Ok(())
    }

    async fn has_resource_roles(&self, route: &str, roles: &[String]) -> bool {
        let inner = self.lock();
        inner
            .role_policies
            .iter()
            .filter(|p| p.route == route)
            .any(|p| p.roles.iter().any(|allowed| roles.contains(allowed)))
    }
}

/// The static route-policy table: admins everywhere, publishers on the topic
/// read/publish surface, consumers on the subscription read/consume surface.
fn default_role_policies() -> Vec<RolePolicy> {
    let policy = |route: &str, roles: &[&str]| RolePolicy {
        route: route.into(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
    };
    vec![
        policy("topics:list_all", &["admin", "publisher"]),
        policy("topics:list_one", &["admin", "publisher"]),
        policy("topics:create", &["admin"]),
        policy("topics:delete", &["admin"]),
        policy("topics:publish", &["admin", "publisher"]),
        policy("topics:acl", &["admin", "publisher"]),
        policy("topics:modifyAcl", &["admin"]),
        policy("subscriptions:list_all", &["admin", "consumer"]),
        policy("subscriptions:list_one", &["admin", "consumer"]),
        policy("subscriptions:create", &["admin"]),
        policy("subscriptions:delete", &["admin"]),
        policy("subscriptions:pull", &["admin", "consumer"]),
        policy("subscriptions:acknowledge", &["admin", "consumer"]),
        policy("subscriptions:modifyPushConfig", &["admin"]),
        policy("subscriptions:acl", &["admin", "consumer"]),
        policy("subscriptions:modifyAcl", &["admin"]),
    ]
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;
