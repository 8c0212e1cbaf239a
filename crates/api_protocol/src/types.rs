//! API type definitions.

use chrono::{DateTime, Utc};
use entities::{FriendRequest, FriendRequestStatus, Message, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub profile_pic: String,
    pub native_language: String,
    pub learning_language: String,
    pub bio: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            profile_pic: user.profile_pic.clone(),
            native_language: user.native_language.clone(),
            learning_language: user.learning_language.clone(),
            bio: user.bio.clone(),
            location: user.location.clone(),
            created_at: user.created_at,
        }
    }
}

/// The signed-in user's own record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub email: String,
    pub friends: Vec<Uuid>,
}

impl From<&User> for Account {
    fn from(user: &User) -> Self {
        Self {
            profile: UserProfile::from(user),
            email: user.email.clone(),
            friends: user.friends.iter().copied().collect(),
        }
    }
}

/// The parts of a user shown next to a friend request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub full_name: String,
    pub profile_pic: String,
    pub native_language: String,
    pub learning_language: String,
}

impl UserSummary {
    /// Summary for a user that is no longer in the directory.
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            full_name: String::new(),
            profile_pic: String::new(),
            native_language: String::new(),
            learning_language: String::new(),
        }
    }
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            profile_pic: user.profile_pic.clone(),
            native_language: user.native_language.clone(),
            learning_language: user.learning_language.clone(),
        }
    }
}

/// A friend request with both parties resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestView {
    pub id: Uuid,
    pub sender: UserSummary,
    pub recipient: UserSummary,
    pub status: FriendRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FriendRequestView {
    /// Builds a view, falling back to bare IDs for parties that cannot be
    /// resolved.
    pub fn new(request: &FriendRequest, sender: Option<&User>, recipient: Option<&User>) -> Self {
        Self {
            id: request.id,
            sender: sender.map_or_else(
                || UserSummary::unknown(request.sender_id),
                UserSummary::from,
            ),
            recipient: recipient.map_or_else(
                || UserSummary::unknown(request.recipient_id),
                UserSummary::from,
            ),
            status: request.status,
            created_at: request.created_at,
            updated_at: request.updated_at,
        }
    }
}

/// Sender fields attached to an unseen message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    pub id: Uuid,
    pub full_name: String,
    pub profile_pic: String,
}

impl From<&User> for MessageSender {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            profile_pic: user.profile_pic.clone(),
        }
    }
}

/// An unseen message as shown in notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    /// Null when the sender is no longer in the directory.
    pub sender: Option<MessageSender>,
    pub receiver_id: Uuid,
    pub channel_id: String,
    pub text: String,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageView {
    /// Builds a view from a message and its resolved sender.
    pub fn new(message: &Message, sender: Option<&User>) -> Self {
        Self {
            id: message.id.clone(),
            sender: sender.map(MessageSender::from),
            receiver_id: message.receiver_id,
            channel_id: message.channel_id.clone(),
            text: message.text.clone(),
            seen: message.seen,
            created_at: message.created_at,
        }
    }
}
