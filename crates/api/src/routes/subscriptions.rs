//! Subscription endpoints
//!
//! | Method | Path | Route policy |
//! |--------|------|--------------|
//! | GET    | `/subscriptions` | `subscriptions:list_all` |
//! | GET    | `/subscriptions/{s}` | `subscriptions:list_one` |
//! | GET    | `/subscriptions/{s}:acl` | `subscriptions:acl` |
//! | PUT    | `/subscriptions/{s}` | `subscriptions:create` |
//! | PUT    | `/subscriptions/{s}:modifyAcl` | `subscriptions:modifyAcl` |
//! | PUT    | `/subscriptions/{s}:modifyPushConfig` | `subscriptions:modifyPushConfig` |
//! | POST   | `/subscriptions/{s}:pull` | `subscriptions:pull` |
//! | POST   | `/subscriptions/{s}:acknowledge` | `subscriptions:acknowledge` |
//! | DELETE | `/subscriptions/{s}` | `subscriptions:delete` |

use axum::Extension;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Response;
use serde::Deserialize;

use courier_auth::Identity;
use courier_messaging::{MessagingError, PushTransition, parse_topic_ref};
use courier_store::AclResource;

use crate::error::{ApiError, Result};
use crate::guard;
use crate::routes::split_resource;
use crate::state::AppState;
use crate::types::{
    AclBody, AckRequest, PullRequest, PullResponse, SubscriptionBody, SubscriptionListResponse,
    SubscriptionResponse, empty_ok, json_ok, parse_body,
};

#[derive(Debug, Deserialize)]
pub struct ProjectPath {
    pub project: String,
}

#[derive(Debug, Deserialize)]
pub struct SubPath {
    pub project: String,
    pub subscription: String,
}

fn sub_error(err: MessagingError) -> ApiError {
    match err {
        MessagingError::NotFound => ApiError::not_found("Subscription does not exist"),
        MessagingError::Exists => ApiError::Conflict("Subscription already exists".into()),
        other => other.into(),
    }
}

/// GET `/subscriptions`, listing the project's subscriptions.
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<ProjectPath>,
) -> Result<Response> {
    guard::authorize(&state, &identity, "subscriptions:list_all").await?;

    let subs = state
        .subs()
        .get_subs_by_project(&identity.project_uuid)
        .await
        .map_err(sub_error)?;

    Ok(json_ok(&SubscriptionListResponse {
        subscriptions: subs
            .iter()
            .map(|s| SubscriptionResponse::from_record(&path.project, s))
            .collect(),
    }))
}

/// GET `/subscriptions/{s}` and `/subscriptions/{s}:acl`.
pub async fn get_dispatch(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<SubPath>,
) -> Result<Response> {
    let (name, action) = split_resource(&path.subscription);
    match action {
        None => {
            guard::authorize(&state, &identity, "subscriptions:list_one").await?;
            let sub = state
                .subs()
                .get_sub_by_name(&identity.project_uuid, name)
                .await
                .map_err(sub_error)?;
            Ok(json_ok(&SubscriptionResponse::from_record(
                &path.project,
                &sub,
            )))
        }
        Some("acl") => {
            guard::authorize(&state, &identity, "subscriptions:acl").await?;
            let acl = state
                .subs()
                .get_acl(&identity.project_uuid, name)
                .await
                .map_err(sub_error)?;
            Ok(json_ok(&AclBody {
                authorized_users: acl.users,
            }))
        }
        Some(_) => Err(ApiError::not_found("Resource does not exist")),
    }
}

/// PUT `/subscriptions/{s}`, `:modifyAcl`, and `:modifyPushConfig`.
pub async fn put_dispatch(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<SubPath>,
    body: Bytes,
) -> Result<Response> {
    let (name, action) = split_resource(&path.subscription);
    match action {
        None => create(&state, &identity, &path.project, name, &body).await,
        Some("modifyAcl") => modify_acl(&state, &identity, name, &body).await,
        Some("modifyPushConfig") => {
            modify_push_config(&state, &identity, &path.project, name, &body).await
        }
        Some(_) => Err(ApiError::not_found("Resource does not exist")),
    }
}

async fn create(
    state: &AppState,
    identity: &Identity,
    project: &str,
    name: &str,
    body: &Bytes,
) -> Result<Response> {
    guard::authorize(state, identity, "subscriptions:create").await?;

    let request: SubscriptionBody = parse_body(body, "Subscription")?;
    let (topic_project, topic) =
        parse_topic_ref(&request.topic).map_err(|_| ApiError::invalid("Invalid topic name"))?;
    if topic_project != project {
        return Err(ApiError::invalid("Invalid topic name"));
    }

    let sub = state
        .subs()
        .create_sub(
            &identity.project_uuid,
            name,
            &topic,
            &request.push_config.push_endpoint,
            request.ack_deadline_seconds,
            &request.push_config.retry_policy.policy,
            request.push_config.retry_policy.period,
        )
        .await
        .map_err(|e| match e {
            MessagingError::NotFound => ApiError::not_found("Topic does not exist"),
            MessagingError::Exists => ApiError::Conflict("Subscription already exists".into()),
            other => other.into(),
        })?;

    if sub.has_push() {
        state.manager.add(&identity.project_uuid, project, name);
        state.manager.launch(&identity.project_uuid, name);
    }

    Ok(json_ok(&SubscriptionResponse::from_record(project, &sub)))
}

async fn modify_acl(
    state: &AppState,
    identity: &Identity,
    name: &str,
    body: &Bytes,
) -> Result<Response> {
    guard::authorize(state, identity, "subscriptions:modifyAcl").await?;
    let acl: AclBody = parse_body(body, "Subscription ACL")?;

    courier_auth::are_valid_users(
        state.store.as_ref(),
        &identity.project_uuid,
        &acl.authorized_users,
    )
    .await
    .map_err(|e| ApiError::not_found(e.to_string()))?;

    state
        .subs()
        .mod_acl(&identity.project_uuid, name, &acl.authorized_users)
        .await
        .map_err(sub_error)?;
    Ok(empty_ok())
}

async fn modify_push_config(
    state: &AppState,
    identity: &Identity,
    project: &str,
    name: &str,
    body: &Bytes,
) -> Result<Response> {
    guard::authorize(state, identity, "subscriptions:modifyPushConfig").await?;
    let request: SubscriptionBody = parse_body(body, "Subscription")?;

    let transition = state
        .subs()
        .mod_sub_push(
            &identity.project_uuid,
            name,
            &request.push_config.push_endpoint,
            &request.push_config.retry_policy.policy,
            request.push_config.retry_policy.period,
        )
        .await
        .map_err(sub_error)?;

    match transition {
        PushTransition::Start => {
            state.manager.add(&identity.project_uuid, project, name);
            state.manager.launch(&identity.project_uuid, name);
        }
        PushTransition::Stop => state.manager.stop(&identity.project_uuid, name),
        PushTransition::Restart => state.manager.restart(&identity.project_uuid, project, name),
        PushTransition::None => {}
    }

    Ok(empty_ok())
}

/// POST `/subscriptions/{s}:pull` and `/subscriptions/{s}:acknowledge`.
pub async fn post_dispatch(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<SubPath>,
    body: Bytes,
) -> Result<Response> {
    let (name, action) = split_resource(&path.subscription);
    match action {
        Some("pull") => pull(&state, &identity, &path.project, name, &body).await,
        Some("acknowledge") => acknowledge(&state, &identity, &path.project, name, &body).await,
        _ => Err(ApiError::not_found("Resource does not exist")),
    }
}

async fn pull(
    state: &AppState,
    identity: &Identity,
    project: &str,
    name: &str,
    body: &Bytes,
) -> Result<Response> {
    guard::authorize(state, identity, "subscriptions:pull").await?;

    let subs = state.subs();
    if !subs.has_sub(&identity.project_uuid, name).await {
        return Err(ApiError::not_found("Subscription does not exist"));
    }

    // per-subscription ACL applies only to consumer-only callers
    if state.per_resource_auth
        && courier_auth::is_consumer(&identity.roles)
        && !courier_auth::per_resource(
            state.store.as_ref(),
            &identity.project_uuid,
            AclResource::Subscription,
            name,
            &identity.user,
        )
        .await
    {
        return Err(ApiError::Forbidden);
    }

    let request: PullRequest = parse_body(body, "pull")?;
    let received = subs
        .pull(
            &identity.project_uuid,
            project,
            name,
            request.limit(),
            request.immediate(),
        )
        .await
        .map_err(sub_error)?;

    Ok(json_ok(&PullResponse {
        received_messages: received,
    }))
}

async fn acknowledge(
    state: &AppState,
    identity: &Identity,
    project: &str,
    name: &str,
    body: &Bytes,
) -> Result<Response> {
    guard::authorize(state, identity, "subscriptions:acknowledge").await?;

    let subs = state.subs();
    if !subs.has_sub(&identity.project_uuid, name).await {
        return Err(ApiError::not_found("Subscription does not exist"));
    }

    let request: AckRequest = parse_body(body, "ack")?;
    let Some(ack_id) = request.ack_ids.first() else {
        return Err(ApiError::invalid("Invalid ack id"));
    };

    subs.ack(&identity.project_uuid, project, name, ack_id)
        .await
        .map_err(sub_error)?;

    Ok(json_ok(&serde_json::json!({})))
}

/// DELETE `/subscriptions/{s}`.
pub async fn delete_dispatch(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<SubPath>,
) -> Result<Response> {
    let (name, action) = split_resource(&path.subscription);
    match action {
        None => {
            guard::authorize(&state, &identity, "subscriptions:delete").await?;
            state
                .subs()
                .remove_sub(&identity.project_uuid, name)
                .await
                .map_err(sub_error)?;
            // idempotent for pull-only subscriptions
            state.manager.stop(&identity.project_uuid, name);
            Ok(empty_ok())
        }
        Some(_) => Err(ApiError::not_found("Resource does not exist")),
    }
}
