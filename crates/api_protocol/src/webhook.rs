//! Events pushed by the chat service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user reference inside a webhook payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookUser {
    pub id: Uuid,
}

/// A message inside a `message.new` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookMessage {
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub user: WebhookUser,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Webhook event, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChatWebhookEvent {
    /// A message was posted to a channel.
    #[serde(rename = "message.new")]
    MessageNew {
        channel_id: String,
        message: WebhookMessage,
    },

    /// A user read a channel up to its latest message.
    #[serde(rename = "message.read")]
    MessageRead { channel_id: String, user: WebhookUser },

    /// Any event type this server does not track.
    #[serde(other)]
    Other,
}

impl ChatWebhookEvent {
    /// Returns the channel the event belongs to, if any.
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            Self::MessageNew { channel_id, .. } | Self::MessageRead { channel_id, .. } => {
                Some(channel_id)
            }
            Self::Other => None,
        }
    }
}
