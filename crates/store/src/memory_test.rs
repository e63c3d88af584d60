//! In-memory store tests: query semantics, field-wise updates, ACLs, and
//! the ack state machine.

use chrono::{Duration, Utc};

use super::*;

async fn demo_uuid(store: &MemoryStore) -> String {
    store
        .query_projects("", "demo")
        .await
        .unwrap()
        .remove(0)
        .uuid
}

fn ts(t: chrono::DateTime<Utc>) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

#[tokio::test]
async fn query_projects_filters() {
    let store = MemoryStore::seeded();

    let all = store.query_projects("", "").await.unwrap();
    assert_eq!(all.len(), 1);

    let by_name = store.query_projects("", "demo").await.unwrap();
    assert_eq!(by_name[0].name, "demo");

    let by_uuid = store.query_projects(&by_name[0].uuid, "").await.unwrap();
    assert_eq!(by_uuid[0].uuid, by_name[0].uuid);

    assert_eq!(
        store.query_projects("", "missing").await,
        Err(StoreError::NotFound)
    );
}

#[tokio::test]
async fn update_project_is_field_wise() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;
    let later = Utc::now();

    store
        .update_project(&uuid, "", "new description", later)
        .await
        .unwrap();

    let project = store.query_projects(&uuid, "").await.unwrap().remove(0);
    assert_eq!(project.name, "demo");
    assert_eq!(project.description, "new description");
    assert_eq!(project.modified_on, later);
}

#[tokio::test]
async fn project_insert_remove_and_cascade_helpers() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;
    let now = Utc::now();

    store
        .insert_project(ProjectRecord {
            uuid: "second-uuid".into(),
            name: "second".into(),
            description: String::new(),
            created_by: "alice".into(),
            created_on: now,
            modified_on: now,
        })
        .await
        .unwrap();

    // duplicate name rejected
    let err = store
        .insert_project(ProjectRecord {
            uuid: "third-uuid".into(),
            name: "second".into(),
            description: String::new(),
            created_by: "alice".into(),
            created_on: now,
            modified_on: now,
        })
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Exists);

    // caller-driven cascade: drop the demo project's topics and subs
    store.remove_project_topics(&uuid).await.unwrap();
    store.remove_project_subs(&uuid).await.unwrap();
    assert!(store.query_topics(&uuid, "").await.unwrap().is_empty());
    assert!(store.query_subs(&uuid, "").await.unwrap().is_empty());
    assert_eq!(
        store.remove_project_topics(&uuid).await,
        Err(StoreError::NotFound)
    );

    store.remove_project(&uuid).await.unwrap();
    assert!(!store.has_project("demo").await);
    assert!(store.has_project("second").await);
    assert_eq!(store.remove_project(&uuid).await, Err(StoreError::NotFound));
}

#[tokio::test]
async fn update_user_is_field_wise() {
    let store = MemoryStore::seeded();
    let alice = store.query_users("", "", "alice").await.unwrap().remove(0);

    store
        .update_user(&alice.uuid, &[], "", "new@example.com")
        .await
        .unwrap();

    let updated = store.query_users("", &alice.uuid, "").await.unwrap().remove(0);
    assert_eq!(updated.name, "alice");
    assert_eq!(updated.email, "new@example.com");
    assert_eq!(updated.projects, alice.projects);

    assert_eq!(
        store.update_user("ghost-uuid", &[], "", "").await,
        Err(StoreError::NotFound)
    );
}

#[tokio::test]
async fn query_users_priority() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;

    let alice = store.query_users("", "", "alice").await.unwrap().remove(0);
    assert_eq!(alice.name, "alice");

    // uuid wins over a conflicting name filter
    let by_uuid = store
        .query_users("", &alice.uuid, "paul")
        .await
        .unwrap()
        .remove(0);
    assert_eq!(by_uuid.name, "alice");

    let scoped = store.query_users(&uuid, "", "").await.unwrap();
    assert_eq!(scoped.len(), 4);

    let global = store.query_users("", "", "").await.unwrap();
    assert_eq!(global.len(), 4);
}

#[tokio::test]
async fn insert_user_rejects_token_collision() {
    let store = MemoryStore::seeded();
    let err = store
        .insert_user(UserRecord {
            uuid: "fresh-uuid".into(),
            name: "mallory".into(),
            token: "alice-key".into(),
            email: "mallory@example.com".into(),
            projects: vec![],
            service_roles: vec![],
        })
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Exists);
}

#[tokio::test]
async fn has_users_reports_missing() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;

    let (ok, missing) = store
        .has_users(&uuid, &["alice".into(), "carol".into()])
        .await;
    assert!(ok);
    assert!(missing.is_empty());

    let (ok, missing) = store
        .has_users(&uuid, &["alice".into(), "ghost".into(), "wraith".into()])
        .await;
    assert!(!ok);
    assert_eq!(missing, vec!["ghost".to_string(), "wraith".to_string()]);
}

#[tokio::test]
async fn get_user_roles_by_token() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;

    let (roles, user) = store.get_user_roles(&uuid, "paul-key").await;
    assert_eq!(roles, vec!["publisher".to_string()]);
    assert_eq!(user, "paul");

    let (roles, user) = store.get_user_roles(&uuid, "unknown-key").await;
    assert!(roles.is_empty());
    assert!(user.is_empty());

    // known token, different project: member name resolves, roles do not
    let (roles, user) = store.get_user_roles("other-project", "paul-key").await;
    assert!(roles.is_empty());
    assert_eq!(user, "paul");
}

#[tokio::test]
async fn topic_crud_and_acl_lifecycle() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;

    store.insert_topic(&uuid, "metrics").await.unwrap();
    assert_eq!(
        store.insert_topic(&uuid, "metrics").await,
        Err(StoreError::Exists)
    );

    // fresh topics start with an empty ACL
    let acl = store
        .query_acl(&uuid, AclResource::Topic, "metrics")
        .await
        .unwrap();
    assert!(acl.users.is_empty());

    store
        .mod_acl(&uuid, AclResource::Topic, "metrics", &["paul".into()])
        .await
        .unwrap();
    let acl = store
        .query_acl(&uuid, AclResource::Topic, "metrics")
        .await
        .unwrap();
    assert_eq!(acl.users, vec!["paul".to_string()]);

    store.remove_topic(&uuid, "metrics").await.unwrap();
    assert_eq!(
        store.remove_topic(&uuid, "metrics").await,
        Err(StoreError::NotFound)
    );
    assert_eq!(
        store.query_acl(&uuid, AclResource::Topic, "metrics").await,
        Err(StoreError::NotFound)
    );
}

#[tokio::test]
async fn removing_topic_keeps_subscriptions() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;

    store.remove_topic(&uuid, "orders").await.unwrap();

    // the subscription over the removed topic persists as an orphan
    let orphan = store.query_one_sub(&uuid, "orders-sub").await.unwrap();
    assert_eq!(orphan.topic, "orders");
}

#[tokio::test]
async fn query_push_subs_only_push_enabled() {
    let store = MemoryStore::seeded();
    let push = store.query_push_subs().await;
    assert_eq!(push.len(), 1);
    assert_eq!(push[0].name, "alerts-push");
}

#[tokio::test]
async fn ack_without_pull_fails() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;

    let err = store
        .update_sub_offset_ack(&uuid, "orders-sub", 1, &ts(Utc::now()))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::NoAckPending);
}

#[tokio::test]
async fn ack_inside_window_commits() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;
    let now = Utc::now();

    store.update_sub_pull(&uuid, "orders-sub", 2, &ts(now)).await;
    let sub = store.query_one_sub(&uuid, "orders-sub").await.unwrap();
    assert_eq!(sub.next_offset, 2);
    assert!(sub.offset <= sub.next_offset);

    store
        .update_sub_offset_ack(&uuid, "orders-sub", 2, &ts(now + Duration::seconds(3)))
        .await
        .unwrap();

    let sub = store.query_one_sub(&uuid, "orders-sub").await.unwrap();
    assert_eq!(sub.offset, 2);
    assert_eq!(sub.next_offset, 0);
    assert!(sub.pending_ack.is_empty());

    // the window is closed, a second ack has nothing to match
    let err = store
        .update_sub_offset_ack(&uuid, "orders-sub", 2, &ts(now + Duration::seconds(4)))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::NoAckPending);
}

#[tokio::test]
async fn ack_out_of_range_is_wrong_ack() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;
    let now = Utc::now();

    store.update_sub_pull(&uuid, "orders-sub", 2, &ts(now)).await;

    let err = store
        .update_sub_offset_ack(&uuid, "orders-sub", 6, &ts(now))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::WrongAck);

    // state untouched: the window is still open
    let sub = store.query_one_sub(&uuid, "orders-sub").await.unwrap();
    assert_eq!(sub.offset, 0);
    assert_eq!(sub.next_offset, 2);
}

#[tokio::test]
async fn ack_past_deadline_times_out() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;
    let now = Utc::now();

    store.update_sub_pull(&uuid, "orders-sub", 2, &ts(now)).await;

    let err = store
        .update_sub_offset_ack(&uuid, "orders-sub", 2, &ts(now + Duration::seconds(11)))
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::AckTimeout);

    // offset unchanged; a later re-pull re-arms the timer
    let sub = store.query_one_sub(&uuid, "orders-sub").await.unwrap();
    assert_eq!(sub.offset, 0);
    assert_eq!(sub.next_offset, 2);

    store
        .update_sub_pull(&uuid, "orders-sub", 2, &ts(now + Duration::seconds(20)))
        .await;
    store
        .update_sub_offset_ack(&uuid, "orders-sub", 2, &ts(now + Duration::seconds(25)))
        .await
        .unwrap();
}

#[tokio::test]
async fn accepted_ack_strictly_advances_offset() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;
    let now = Utc::now();

    store.update_sub_pull(&uuid, "orders-sub", 3, &ts(now)).await;
    let before = store.query_one_sub(&uuid, "orders-sub").await.unwrap().offset;

    store
        .update_sub_offset_ack(&uuid, "orders-sub", 3, &ts(now))
        .await
        .unwrap();

    let after = store.query_one_sub(&uuid, "orders-sub").await.unwrap().offset;
    assert!(after > before);
}

#[tokio::test]
async fn removed_sub_is_gone() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;

    store.remove_sub(&uuid, "orders-sub").await.unwrap();
    assert_eq!(
        store.query_one_sub(&uuid, "orders-sub").await,
        Err(StoreError::NotFound)
    );
    assert_eq!(
        store.remove_sub(&uuid, "orders-sub").await,
        Err(StoreError::NotFound)
    );
}

#[tokio::test]
async fn mod_sub_push_replaces_config() {
    let store = MemoryStore::seeded();
    let uuid = demo_uuid(&store).await;

    store
        .mod_sub_push(&uuid, "orders-sub", "http://push.example/hook", "linear", 500)
        .await
        .unwrap();

    let sub = store.query_one_sub(&uuid, "orders-sub").await.unwrap();
    assert_eq!(sub.push_endpoint, "http://push.example/hook");
    assert_eq!(sub.retry_period_ms, 500);

    assert_eq!(
        store
            .mod_sub_push(&uuid, "missing", "http://x/x", "linear", 3000)
            .await,
        Err(StoreError::NotFound)
    );
}

#[tokio::test]
async fn role_policy_intersection() {
    let store = MemoryStore::seeded();

    assert!(
        store
            .has_resource_roles("topics:publish", &["publisher".into()])
            .await
    );
    assert!(
        store
            .has_resource_roles("topics:publish", &["admin".into(), "consumer".into()])
            .await
    );
    assert!(
        !store
            .has_resource_roles("topics:publish", &["consumer".into()])
            .await
    );
    assert!(
        !store
            .has_resource_roles("no:such:route", &["admin".into()])
            .await
    );
}
