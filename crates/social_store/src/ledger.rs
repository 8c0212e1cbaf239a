//! Friend request ledger.
//!
//! Owns the friend request lifecycle: create (pending), accept (recipient
//! only, terminal). Pair uniqueness and the atomic accept are delegated to
//! the store; the ledger adds the precondition checks and maps store
//! failures onto its own error taxonomy.

use std::{collections::HashSet, sync::Arc};

use entities::{FriendRequest, FriendRequestStatus, User};
use thiserror::Error;
use uuid::Uuid;

use crate::{FriendRequestFilter, SocialStore, StoreError, UserFilter};

/// Errors returned by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The request targets the sender.
    #[error("You can't send a friend request to yourself")]
    InvalidTarget,

    /// The two users are already friends.
    #[error("You are already friends with this user")]
    AlreadyFriends,

    /// A request already exists for the pair, in either direction.
    #[error("A friend request already exists between you and this user")]
    DuplicateRequest,

    /// A referenced user or request does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor may not act on the request.
    #[error("You are not authorized to accept this request")]
    Forbidden,

    /// The transition is not legal from the current status.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState { from: String, to: String },

    /// Transient persistence failure. Not retried internally.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

impl LedgerError {
    fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Returns true if the caller may retry the same call.
    ///
    /// Only database failures qualify; a corrupt row fails the same way on
    /// every retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageUnavailable(StoreError::Database(_)))
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity_type, id } => Self::NotFound {
                entity: entity_type,
                id,
            },
            StoreError::InvalidStateTransition { from, to } => Self::InvalidState { from, to },
            other => Self::StorageUnavailable(other),
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// The friend request ledger.
pub struct FriendLedger<S> {
    store: Arc<S>,
}

impl<S> Clone for FriendLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: SocialStore> FriendLedger<S> {
    /// Creates a new ledger over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Resolves a user or fails with `NotFound`.
    pub async fn user(&self, user_id: Uuid) -> LedgerResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("User", user_id))
    }

    /// Sends a friend request from `sender_id` to `recipient_id`.
    pub async fn send_request(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
    ) -> LedgerResult<FriendRequest> {
        if sender_id == recipient_id {
            tracing::debug!(user_id = %sender_id, "Rejected self friend request");
            return Err(LedgerError::InvalidTarget);
        }

        self.user(recipient_id).await?;
        let sender = self.user(sender_id).await?;

        if sender.is_friend_of(recipient_id) {
            return Err(LedgerError::AlreadyFriends);
        }

        if let Some(existing) = self
            .store
            .find_friend_request_between(sender_id, recipient_id)
            .await?
        {
            return Err(conflict_with(&existing));
        }

        match self
            .store
            .create_friend_request(FriendRequest::new(sender_id, recipient_id))
            .await
        {
            Ok(request) => {
                tracing::info!(
                    request_id = %request.id,
                    sender_id = %sender_id,
                    recipient_id = %recipient_id,
                    "Friend request sent"
                );
                Ok(request)
            }
            Err(StoreError::AlreadyExists { .. }) => {
                // A concurrent send for the same pair won the insert.
                tracing::debug!(
                    sender_id = %sender_id,
                    recipient_id = %recipient_id,
                    "Lost friend request race"
                );
                let existing = self
                    .store
                    .find_friend_request_between(sender_id, recipient_id)
                    .await?;
                Err(existing
                    .as_ref()
                    .map_or(LedgerError::DuplicateRequest, conflict_with))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to store friend request");
                Err(e.into())
            }
        }
    }

    /// Accepts a pending request on behalf of its recipient.
    pub async fn accept_request(
        &self,
        request_id: Uuid,
        acting_user_id: Uuid,
    ) -> LedgerResult<FriendRequest> {
        let request = self
            .store
            .get_friend_request(request_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("FriendRequest", request_id))?;

        if request.recipient_id != acting_user_id {
            tracing::warn!(
                request_id = %request_id,
                user_id = %acting_user_id,
                "Non-recipient tried to accept friend request"
            );
            return Err(LedgerError::Forbidden);
        }

        if !request.status.can_transition_to(FriendRequestStatus::Accepted) {
            return Err(LedgerError::InvalidState {
                from: request.status.to_string(),
                to: FriendRequestStatus::Accepted.to_string(),
            });
        }

        let accepted = self.store.accept_friend_request(request_id).await?;

        tracing::info!(
            request_id = %request_id,
            sender_id = %accepted.sender_id,
            recipient_id = %accepted.recipient_id,
            "Friend request accepted"
        );

        Ok(accepted)
    }

    /// Requests sent by `user_id`, any status, newest first.
    pub async fn list_outgoing(&self, user_id: Uuid) -> LedgerResult<Vec<FriendRequest>> {
        Ok(self
            .store
            .list_friend_requests(FriendRequestFilter::sent_by(user_id))
            .await?)
    }

    /// Pending requests addressed to `user_id`, newest first.
    pub async fn list_incoming_pending(&self, user_id: Uuid) -> LedgerResult<Vec<FriendRequest>> {
        Ok(self
            .store
            .list_friend_requests(
                FriendRequestFilter::received_by(user_id)
                    .with_status(FriendRequestStatus::Pending),
            )
            .await?)
    }

    /// Requests sent by `user_id` that the recipient accepted, newest first.
    pub async fn list_accepted_outgoing(&self, user_id: Uuid) -> LedgerResult<Vec<FriendRequest>> {
        Ok(self
            .store
            .list_friend_requests(
                FriendRequestFilter::sent_by(user_id).with_status(FriendRequestStatus::Accepted),
            )
            .await?)
    }

    /// Resolves the friends set of `user_id` to full user records.
    pub async fn list_friends(&self, user_id: Uuid) -> LedgerResult<Vec<User>> {
        let user = self.user(user_id).await?;
        let ids: Vec<Uuid> = user.friends.iter().copied().collect();
        Ok(self.store.get_users(&ids).await?)
    }

    /// Users `user_id` could send a request to.
    ///
    /// Excludes the user, their friends, and anyone with a request to or from
    /// them. Language-exchange matches come first, then newest profiles.
    pub async fn recommend(&self, user_id: Uuid) -> LedgerResult<Vec<User>> {
        let user = self.user(user_id).await?;

        let mut excluded: HashSet<Uuid> = user.friends.iter().copied().collect();
        excluded.insert(user.id);

        let requests = self
            .store
            .list_friend_requests(FriendRequestFilter::involving(user_id))
            .await?;
        excluded.extend(requests.iter().filter_map(|r| r.counterpart(user_id)));

        let mut candidates: Vec<User> = self
            .store
            .list_users(UserFilter::default())
            .await?
            .into_iter()
            .filter(|candidate| !excluded.contains(&candidate.id))
            .collect();

        // Stable sort keeps newest-first within each group.
        candidates.sort_by_key(|candidate| !user.is_language_match(candidate));

        Ok(candidates)
    }
}

fn conflict_with(existing: &FriendRequest) -> LedgerError {
    match existing.status {
        FriendRequestStatus::Accepted => LedgerError::AlreadyFriends,
        FriendRequestStatus::Pending => LedgerError::DuplicateRequest,
    }
}
