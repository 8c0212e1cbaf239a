//! In-memory social store implementation.
//!
//! All tables live behind one lock so that multi-record operations such as
//! accepting a request are applied as a single unit.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use entities::{FriendRequest, FriendRequestStatus, Message, User, UserPair};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{FriendRequestFilter, SocialStore, StoreError, StoreResult, UserFilter};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    friend_requests: HashMap<Uuid, FriendRequest>,
    /// One request ID per unordered pair.
    pairs: HashMap<UserPair, Uuid>,
    messages: HashMap<String, Message>,
}

/// In-memory store for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(items: Vec<T>, offset: Option<u32>, limit: Option<u32>) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.unwrap_or(0) as usize)
        .take(limit.map_or(usize::MAX, |l| l as usize))
        .collect()
}

#[async_trait]
impl SocialStore for MemoryStore {
    // =========================================================================
    // User operations
    // =========================================================================

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&user.id) {
            return Err(StoreError::already_exists("User", user.id.to_string()));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::already_exists("User", user.email.clone()));
        }
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).cloned())
    }

    async fn get_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn list_users(&self, filter: UserFilter) -> StoreResult<Vec<User>> {
        let state = self.state.read().await;
        let mut result: Vec<User> = state.users.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(result, filter.offset, filter.limit))
    }

    // =========================================================================
    // Friend request operations
    // =========================================================================

    async fn create_friend_request(&self, request: FriendRequest) -> StoreResult<FriendRequest> {
        let mut state = self.state.write().await;
        let pair = request.pair();
        if state.pairs.contains_key(&pair) {
            return Err(StoreError::already_exists("FriendRequest", pair.to_string()));
        }
        if state.friend_requests.contains_key(&request.id) {
            return Err(StoreError::already_exists("FriendRequest", request.id.to_string()));
        }
        state.pairs.insert(pair, request.id);
        state.friend_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_friend_request(&self, id: Uuid) -> StoreResult<Option<FriendRequest>> {
        let state = self.state.read().await;
        Ok(state.friend_requests.get(&id).cloned())
    }

    async fn find_friend_request_between(
        &self,
        a: Uuid,
        b: Uuid,
    ) -> StoreResult<Option<FriendRequest>> {
        let state = self.state.read().await;
        Ok(state
            .pairs
            .get(&UserPair::new(a, b))
            .and_then(|id| state.friend_requests.get(id))
            .cloned())
    }

    async fn list_friend_requests(
        &self,
        filter: FriendRequestFilter,
    ) -> StoreResult<Vec<FriendRequest>> {
        let state = self.state.read().await;
        let mut result: Vec<FriendRequest> = state
            .friend_requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(result, filter.offset, filter.limit))
    }

    async fn accept_friend_request(&self, id: Uuid) -> StoreResult<FriendRequest> {
        let mut state = self.state.write().await;

        // Validate everything before the first write so a failure leaves
        // no partial state behind.
        let request = state
            .friend_requests
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("FriendRequest", id.to_string()))?;
        if !request.status.can_transition_to(FriendRequestStatus::Accepted) {
            return Err(StoreError::invalid_transition(
                request.status,
                FriendRequestStatus::Accepted,
            ));
        }
        for user_id in [request.sender_id, request.recipient_id] {
            if !state.users.contains_key(&user_id) {
                return Err(StoreError::not_found("User", user_id.to_string()));
            }
        }

        let now = Utc::now();
        let mut accepted = request;
        accepted.status = FriendRequestStatus::Accepted;
        accepted.updated_at = now;
        state.friend_requests.insert(id, accepted.clone());

        for (user_id, friend_id) in [
            (accepted.sender_id, accepted.recipient_id),
            (accepted.recipient_id, accepted.sender_id),
        ] {
            if let Some(user) = state.users.get_mut(&user_id) {
                user.friends.insert(friend_id);
                user.updated_at = now;
            }
        }

        Ok(accepted)
    }

    // =========================================================================
    // Message operations
    // =========================================================================

    async fn create_message(&self, message: Message) -> StoreResult<Message> {
        let mut state = self.state.write().await;
        if state.messages.contains_key(&message.id) {
            return Err(StoreError::already_exists("Message", message.id.clone()));
        }
        state.messages.insert(message.id.clone(), message.clone());
        Ok(message)
    }

    async fn list_unseen_messages(&self, receiver_id: Uuid) -> StoreResult<Vec<Message>> {
        let state = self.state.read().await;
        let mut result: Vec<Message> = state
            .messages
            .values()
            .filter(|m| m.receiver_id == receiver_id && !m.seen)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(result)
    }

    async fn mark_messages_seen(&self, receiver_id: Uuid, channel_id: &str) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let mut updated = 0;
        for message in state.messages.values_mut().filter(|m| {
            m.receiver_id == receiver_id && m.channel_id == channel_id && !m.seen
        }) {
            message.seen = true;
            updated += 1;
        }
        Ok(updated)
    }
}
