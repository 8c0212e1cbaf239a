//! Direct message entity definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A direct message mirrored from the chat service for notification
/// purposes. The chat service stays the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Chat service message ID.
    pub id: String,
    /// Author.
    pub sender_id: Uuid,
    /// Addressee.
    pub receiver_id: Uuid,
    /// Direct channel the message was posted in.
    pub channel_id: String,
    /// Message text.
    pub text: String,
    /// Whether the receiver has viewed it.
    pub seen: bool,
    /// When the message was sent.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates a new unseen message.
    pub fn new(
        id: impl Into<String>,
        sender_id: Uuid,
        receiver_id: Uuid,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender_id,
            receiver_id,
            channel_id: channel_id.into(),
            text: text.into(),
            seen: false,
            created_at: Utc::now(),
        }
    }

    /// Overrides the send time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_starts_unseen() {
        let message = Message::new("m-1", Uuid::new_v4(), Uuid::new_v4(), "a-b", "hola");

        assert!(!message.seen);
        assert_eq!(message.text, "hola");
    }
}
