//! Friend request entity definitions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a friend request.
///
/// Both states count as "active" for the one-request-per-pair rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestStatus {
    /// Waiting for the recipient.
    #[default]
    Pending,
    /// Accepted by the recipient. Terminal.
    Accepted,
}

impl FriendRequestStatus {
    /// Converts the status to a string for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            _ => None,
        }
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: FriendRequestStatus) -> bool {
        matches!((self, next), (Self::Pending, Self::Accepted))
    }
}

impl fmt::Display for FriendRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unordered pair of users a request connects, normalized so that
/// `low <= high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserPair {
    low: Uuid,
    high: Uuid,
}

impl UserPair {
    /// Creates the pair for `a` and `b` in either order.
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    /// The smaller user ID.
    pub fn low(&self) -> Uuid {
        self.low
    }

    /// The larger user ID.
    pub fn high(&self) -> Uuid {
        self.high
    }

    /// Returns true if `user_id` is one side of the pair.
    pub fn contains(&self, user_id: Uuid) -> bool {
        self.low == user_id || self.high == user_id
    }
}

impl fmt::Display for UserPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}

/// A directed proposal from one user to another to become friends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequest {
    /// Unique identifier.
    pub id: Uuid,
    /// User who sent the request.
    pub sender_id: Uuid,
    /// User who may accept it.
    pub recipient_id: Uuid,
    /// Current status.
    pub status: FriendRequestStatus,
    /// When this record was created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl FriendRequest {
    /// Creates a new pending request.
    pub fn new(sender_id: Uuid, recipient_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            sender_id,
            recipient_id,
            status: FriendRequestStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the unordered pair this request connects.
    pub fn pair(&self) -> UserPair {
        UserPair::new(self.sender_id, self.recipient_id)
    }

    /// Returns true if the request is still waiting for the recipient.
    pub fn is_pending(&self) -> bool {
        self.status == FriendRequestStatus::Pending
    }

    /// Returns the other side of the request, if `user_id` is a party to it.
    pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
        if self.sender_id == user_id {
            Some(self.recipient_id)
        } else if self.recipient_id == user_id {
            Some(self.sender_id)
        } else {
            None
        }
    }
}
