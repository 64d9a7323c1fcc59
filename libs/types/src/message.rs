//! Chat message types
//!
//! Messages live as an append-only ordered array embedded in their match
//! document. The `read` flag is the only mutable field and may only be
//! flipped by the participant who did not author the message.

use crate::ids::{MessageId, UserId};
use serde::{Deserialize, Serialize};

/// Maximum message length in characters (counted after trimming)
pub const MAX_MESSAGE_LEN: usize = 1000;

/// A single chat message inside a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: MessageId,
    pub sender: UserId,
    pub content: String,
    /// Unix nanoseconds
    pub sent_at: i64,
    pub read: bool,
}

impl Message {
    /// Create a new unread message
    pub fn new(sender: UserId, content: String, sent_at: i64) -> Self {
        Self {
            message_id: MessageId::new(),
            sender,
            content,
            sent_at,
            read: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_is_unread() {
        let msg = Message::new(UserId::new(), "hello".to_string(), 1_700_000_000_000_000_000);
        assert!(!msg.read);
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn test_message_serialization_field_names() {
        let msg = Message::new(UserId::new(), "hi".to_string(), 1_700_000_000_000_000_000);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("messageId").is_some());
        assert!(json.get("sentAt").is_some());
        assert_eq!(json.get("read").unwrap(), false);
    }
}
