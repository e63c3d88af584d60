//! Courier messaging services
//!
//! The domain layer between the HTTP surface and the store/broker contracts:
//! the message wire model, the topic service (CRUD, ACLs, publish dispatch),
//! and the subscription service (CRUD, ACLs, the pull/ack consumption state
//! machine, push-config transitions).

mod error;
mod message;
mod subscriptions;
mod topics;

pub use error::{MessagingError, Result};
pub use message::Message;
pub use subscriptions::{PushTransition, ReceivedMessage, SubscriptionService};
pub use topics::TopicService;

/// Parse a full topic reference of the shape `projects/<p>/topics/<t>`.
pub fn parse_topic_ref(full: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = full.split('/').collect();
    match parts.as_slice() {
        ["projects", project, "topics", topic] if !project.is_empty() && !topic.is_empty() => {
            Ok((project.to_string(), topic.to_string()))
        }
        _ => Err(MessagingError::Invalid(format!(
            "invalid topic reference {full:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_ref_round_trip() {
        let (project, topic) = parse_topic_ref("projects/demo/topics/orders").unwrap();
        assert_eq!(project, "demo");
        assert_eq!(topic, "orders");
    }

    #[test]
    fn topic_ref_rejects_deviations() {
        for bad in [
            "projects/demo/topics",
            "projects/demo/subscriptions/orders",
            "projects//topics/orders",
            "projects/demo/topics/",
            "demo/orders",
            "",
        ] {
            assert!(parse_topic_ref(bad).is_err(), "accepted {bad:?}");
        }
    }
}
