//! Wire types
//!
//! Request and response bodies for the topic and subscription routes, plus
//! the response helpers that stamp the charset-qualified content type.

use axum::Json;
use axum::body::Bytes;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use courier_messaging::{Message, ReceivedMessage};
use courier_store::{SubRecord, TopicRecord};

use crate::error::ApiError;

/// Content type every handler emits.
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// 200 with a JSON body.
pub fn json_ok<T: Serialize>(value: &T) -> Response {
    let mut response = (StatusCode::OK, Json(value)).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(CONTENT_TYPE_JSON),
    );
    response
}

/// 200 with an empty body, emitted by delete and modify operations.
pub fn empty_ok() -> Response {
    let mut response = StatusCode::OK.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(CONTENT_TYPE_JSON),
    );
    response
}

/// Parse a request body, mapping any failure to a 400 naming the payload.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes, what: &str) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::invalid(format!("Invalid {what} arguments")))
}

// =============================================================================
// Topics
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
pub struct PublishResponse {
    #[serde(rename = "messageIds")]
    pub message_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TopicResponse {
    pub name: String,
}

impl TopicResponse {
    pub fn from_record(project: &str, record: &TopicRecord) -> Self {
        Self {
            name: format!("projects/{project}/topics/{}", record.name),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TopicListResponse {
    pub topics: Vec<TopicResponse>,
}

// =============================================================================
// Subscriptions
// =============================================================================

/// `maxMessages` and `returnImmediately` arrive string-typed on the wire.
#[derive(Debug, Default, Deserialize)]
pub struct PullRequest {
    #[serde(rename = "maxMessages", default)]
    pub max_messages: String,
    #[serde(rename = "returnImmediately", default)]
    pub return_immediately: String,
}

impl PullRequest {
    /// Parsed message limit; anything unparseable means "no limit".
    pub fn limit(&self) -> usize {
        self.max_messages.parse().unwrap_or(0)
    }

    pub fn immediate(&self) -> bool {
        self.return_immediately == "true"
    }
}

#[derive(Debug, Serialize)]
pub struct PullResponse {
    #[serde(rename = "receivedMessages")]
    pub received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Deserialize)]
pub struct AckRequest {
    #[serde(rename = "ackIds", default)]
    pub ack_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetryPolicyBody {
    #[serde(rename = "type", default)]
    pub policy: String,
    #[serde(default)]
    pub period: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushConfigBody {
    #[serde(rename = "pushEndpoint", default)]
    pub push_endpoint: String,
    #[serde(rename = "retryPolicy", default)]
    pub retry_policy: RetryPolicyBody,
}

/// Body of subscription create and push-config modify.
#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionBody {
    /// Full topic reference, `projects/<p>/topics/<t>`
    #[serde(default)]
    pub topic: String,
    #[serde(rename = "pushConfig", default)]
    pub push_config: PushConfigBody,
    #[serde(rename = "ackDeadlineSeconds", default)]
    pub ack_deadline_seconds: i64,
}

#[derive(Debug, Serialize)]
pub struct RetryPolicyResponse {
    #[serde(rename = "type")]
    pub policy: String,
    pub period: u64,
}

#[derive(Debug, Serialize)]
pub struct PushConfigResponse {
    #[serde(rename = "pushEndpoint")]
    pub push_endpoint: String,
    #[serde(rename = "retryPolicy")]
    pub retry_policy: RetryPolicyResponse,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub name: String,
    pub topic: String,
    #[serde(rename = "pushConfig")]
    pub push_config: PushConfigResponse,
    #[serde(rename = "ackDeadlineSeconds")]
    pub ack_deadline_seconds: i64,
}

impl SubscriptionResponse {
    pub fn from_record(project: &str, record: &SubRecord) -> Self {
        Self {
            name: format!("projects/{project}/subscriptions/{}", record.name),
            topic: format!("projects/{project}/topics/{}", record.topic),
            push_config: PushConfigResponse {
                push_endpoint: record.push_endpoint.clone(),
                retry_policy: RetryPolicyResponse {
                    policy: record.retry_policy.clone(),
                    period: record.retry_period_ms,
                },
            },
            ack_deadline_seconds: record.ack_deadline_secs,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<SubscriptionResponse>,
}

// =============================================================================
// ACLs
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AclBody {
    #[serde(default)]
    pub authorized_users: Vec<String>,
}
