//! Social store trait definitions.

use async_trait::async_trait;
use entities::{FriendRequest, FriendRequestStatus, Message, User};
use uuid::Uuid;

use crate::StoreResult;

/// Filter options for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

/// Filter options for listing friend requests.
#[derive(Debug, Clone, Default)]
pub struct FriendRequestFilter {
    /// Filter by sender.
    pub sender_id: Option<Uuid>,
    /// Filter by recipient.
    pub recipient_id: Option<Uuid>,
    /// Filter by either side of the request.
    pub involving: Option<Uuid>,
    /// Filter by status.
    pub status: Option<FriendRequestStatus>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

impl FriendRequestFilter {
    /// Requests sent by `user_id`.
    pub fn sent_by(user_id: Uuid) -> Self {
        Self {
            sender_id: Some(user_id),
            ..Default::default()
        }
    }

    /// Requests addressed to `user_id`.
    pub fn received_by(user_id: Uuid) -> Self {
        Self {
            recipient_id: Some(user_id),
            ..Default::default()
        }
    }

    /// Requests where `user_id` is either side.
    pub fn involving(user_id: Uuid) -> Self {
        Self {
            involving: Some(user_id),
            ..Default::default()
        }
    }

    /// Restricts the filter to one status.
    pub fn with_status(mut self, status: FriendRequestStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns true if `request` passes every set criterion.
    pub fn matches(&self, request: &FriendRequest) -> bool {
        self.sender_id.is_none_or(|id| request.sender_id == id)
            && self.recipient_id.is_none_or(|id| request.recipient_id == id)
            && self
                .involving
                .is_none_or(|id| request.sender_id == id || request.recipient_id == id)
            && self.status.is_none_or(|s| request.status == s)
    }
}

/// Trait for friend graph storage.
///
/// Implementations must make `create_friend_request` and
/// `accept_friend_request` atomic with respect to each other and to
/// themselves; the ledger relies on it for its pair and symmetry invariants.
#[async_trait]
pub trait SocialStore: Send + Sync {
    // =========================================================================
    // User operations
    // =========================================================================

    /// Creates a new user.
    async fn create_user(&self, user: User) -> StoreResult<User>;

    /// Gets a user by ID.
    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Gets every user whose ID is in `ids`. Unknown IDs are skipped.
    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;

    /// Lists users, newest first.
    async fn list_users(&self, filter: UserFilter) -> StoreResult<Vec<User>>;

    // =========================================================================
    // Friend request operations
    // =========================================================================

    /// Inserts a new request.
    ///
    /// Fails with `AlreadyExists` if any request already exists for the
    /// same unordered user pair, in either direction.
    async fn create_friend_request(&self, request: FriendRequest)
        -> StoreResult<FriendRequest>;

    /// Gets a request by ID.
    async fn get_friend_request(&self, id: Uuid) -> StoreResult<Option<FriendRequest>>;

    /// Gets the request between two users, in either direction.
    async fn find_friend_request_between(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> StoreResult<Option<FriendRequest>>;

    /// Lists requests matching the filter, newest first.
    async fn list_friend_requests(
        &self,
        filter: FriendRequestFilter,
    ) -> StoreResult<Vec<FriendRequest>>;

    /// Marks a pending request accepted and adds each party to the other's
    /// friends set, as one atomic unit.
    ///
    /// Fails with `InvalidStateTransition` if the request is not pending.
    async fn accept_friend_request(&self, id: Uuid) -> StoreResult<FriendRequest>;

    // =========================================================================
    // Message operations
    // =========================================================================

    /// Records a message.
    async fn create_message(&self, message: Message) -> StoreResult<Message>;

    /// Lists unseen messages addressed to `receiver_id`, newest first.
    async fn list_unseen_messages(&self, receiver_id: Uuid) -> StoreResult<Vec<Message>>;

    /// Flags every unseen message to `receiver_id` in `channel_id` as seen.
    ///
    /// Returns the number of messages updated.
    async fn mark_messages_seen(&self, receiver_id: Uuid, channel_id: &str)
        -> StoreResult<u64>;
}
