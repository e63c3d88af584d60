//! Message wire model
//!
//! What producers hand to publish and consumers read back from pull and
//! push. `data` is the base64 payload and passes through opaque: the service
//! never decodes it, the broker stores the serialized message as-is.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_store::TIMESTAMP_FORMAT;

use crate::error::{MessagingError, Result};

/// One message as it travels over the wire and through the broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Broker-assigned id, absent until publish accepts the message
    #[serde(
        rename = "messageId",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub message_id: String,

    /// Producer-supplied key/value metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,

    /// Base64-encoded payload, passed through untouched
    #[serde(default)]
    pub data: String,

    /// Stamped by the service at publish time
    #[serde(
        rename = "publishTime",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub publish_time: String,
}

impl Message {
    /// Serialize for the broker log.
    pub fn to_wire(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| MessagingError::Internal(format!("message encode: {e}")))
    }

    /// Parse a raw broker payload. A broker returning something that is not
    /// a message is an inconsistency, not caller error.
    pub fn from_wire(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| MessagingError::Inconsistent(format!("bad message from broker: {e}")))
    }

    /// Stamp the publish time in the wire timestamp layout.
    pub fn stamp_publish_time(&mut self, now: DateTime<Utc>) {
        self.publish_time = now.format(TIMESTAMP_FORMAT).to_string();
    }
}
