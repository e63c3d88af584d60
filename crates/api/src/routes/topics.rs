//! Topic endpoints
//!
//! | Method | Path | Route policy |
//! |--------|------|--------------|
//! | GET    | `/topics` | `topics:list_all` |
//! | GET    | `/topics/{t}` | `topics:list_one` |
//! | GET    | `/topics/{t}:acl` | `topics:acl` |
//! | PUT    | `/topics/{t}` | `topics:create` |
//! | PUT    | `/topics/{t}:modifyAcl` | `topics:modifyAcl` |
//! | POST   | `/topics/{t}:publish` | `topics:publish` |
//! | DELETE | `/topics/{t}` | `topics:delete` |

use axum::Extension;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Response;
use serde::Deserialize;

use courier_auth::Identity;
use courier_messaging::MessagingError;
use courier_store::AclResource;

use crate::error::{ApiError, Result};
use crate::guard;
use crate::routes::split_resource;
use crate::state::AppState;
use crate::types::{
    AclBody, PublishRequest, PublishResponse, TopicListResponse, TopicResponse, empty_ok, json_ok,
    parse_body,
};

#[derive(Debug, Deserialize)]
pub struct ProjectPath {
    pub project: String,
}

#[derive(Debug, Deserialize)]
pub struct TopicPath {
    pub project: String,
    pub topic: String,
}

fn topic_error(err: MessagingError) -> ApiError {
    match err {
        MessagingError::NotFound => ApiError::not_found("Topic does not exist"),
        MessagingError::Exists => ApiError::Conflict("Topic already exists".into()),
        other => other.into(),
    }
}

/// GET `/topics`, listing the project's topics.
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<ProjectPath>,
) -> Result<Response> {
    guard::authorize(&state, &identity, "topics:list_all").await?;

    let topics = state
        .topics()
        .get_topics_by_project(&identity.project_uuid)
        .await
        .map_err(topic_error)?;

    Ok(json_ok(&TopicListResponse {
        topics: topics
            .iter()
            .map(|t| TopicResponse::from_record(&path.project, t))
            .collect(),
    }))
}

/// GET `/topics/{t}` and `/topics/{t}:acl`.
pub async fn get_dispatch(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<TopicPath>,
) -> Result<Response> {
    let (name, action) = split_resource(&path.topic);
    match action {
        None => {
            guard::authorize(&state, &identity, "topics:list_one").await?;
            let topic = state
                .topics()
                .get_topic_by_name(&identity.project_uuid, name)
                .await
                .map_err(topic_error)?;
            Ok(json_ok(&TopicResponse::from_record(&path.project, &topic)))
        }
        Some("acl") => {
            guard::authorize(&state, &identity, "topics:acl").await?;
            let acl = state
                .topics()
                .get_acl(&identity.project_uuid, name)
                .await
                .map_err(topic_error)?;
            Ok(json_ok(&AclBody {
                authorized_users: acl.users,
            }))
        }
        Some(_) => Err(ApiError::not_found("Resource does not exist")),
    }
}

/// PUT `/topics/{t}` and `/topics/{t}:modifyAcl`.
pub async fn put_dispatch(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<TopicPath>,
    body: Bytes,
) -> Result<Response> {
    let (name, action) = split_resource(&path.topic);
    match action {
        None => {
            guard::authorize(&state, &identity, "topics:create").await?;
            let topic = state
                .topics()
                .create_topic(&identity.project_uuid, name)
                .await
                .map_err(topic_error)?;
            Ok(json_ok(&TopicResponse::from_record(&path.project, &topic)))
        }
        Some("modifyAcl") => {
            guard::authorize(&state, &identity, "topics:modifyAcl").await?;
            let acl: AclBody = parse_body(&body, "Topic ACL")?;

            courier_auth::are_valid_users(
                state.store.as_ref(),
                &identity.project_uuid,
                &acl.authorized_users,
            )
            .await
            .map_err(|e| ApiError::not_found(e.to_string()))?;

            state
                .topics()
                .mod_acl(&identity.project_uuid, name, &acl.authorized_users)
                .await
                .map_err(topic_error)?;
            Ok(empty_ok())
        }
        Some(_) => Err(ApiError::not_found("Resource does not exist")),
    }
}

/// POST `/topics/{t}:publish`.
pub async fn post_dispatch(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<TopicPath>,
    body: Bytes,
) -> Result<Response> {
    let (name, action) = split_resource(&path.topic);
    match action {
        Some("publish") => publish(&state, &identity, name, &body).await,
        _ => Err(ApiError::not_found("Resource does not exist")),
    }
}

async fn publish(
    state: &AppState,
    identity: &Identity,
    topic: &str,
    body: &Bytes,
) -> Result<Response> {
    guard::authorize(state, identity, "topics:publish").await?;

    let topics = state.topics();
    if !topics.has_topic(&identity.project_uuid, topic).await {
        return Err(ApiError::not_found("Topic does not exist"));
    }

    // per-topic ACL applies only to publisher-only callers
    if state.per_resource_auth
        && courier_auth::is_publisher(&identity.roles)
        && !courier_auth::per_resource(
            state.store.as_ref(),
            &identity.project_uuid,
            AclResource::Topic,
            topic,
            &identity.user,
        )
        .await
    {
        return Err(ApiError::Forbidden);
    }

    let request: PublishRequest = parse_body(body, "Message")?;
    let message_ids = topics
        .publish_batch(&identity.project_uuid, topic, request.messages)
        .await
        .map_err(topic_error)?;

    Ok(json_ok(&PublishResponse { message_ids }))
}

/// DELETE `/topics/{t}`.
pub async fn delete_dispatch(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(path): Path<TopicPath>,
) -> Result<Response> {
    let (name, action) = split_resource(&path.topic);
    match action {
        None => {
            guard::authorize(&state, &identity, "topics:delete").await?;
            state
                .topics()
                .remove_topic(&identity.project_uuid, name)
                .await
                .map_err(topic_error)?;
            Ok(empty_ok())
        }
        Some(_) => Err(ApiError::not_found("Resource does not exist")),
    }
}
