//! Notification read-model.
//!
//! Composes unseen direct messages with the ledger's pending incoming and
//! accepted outgoing requests. Listing failures degrade to an empty part
//! plus a warning; ingest writes always report their errors.

use std::collections::HashMap;

use entities::{FriendRequest, Message, User};
use uuid::Uuid;

use crate::{FriendLedger, LedgerResult, SocialStore, StoreError};

/// An unseen message joined with its sender.
#[derive(Debug, Clone)]
pub struct UnseenMessage {
    /// The message.
    pub message: Message,
    /// The sender, if they are still in the directory.
    pub sender: Option<User>,
}

/// Everything the notifications page shows for one user.
#[derive(Debug, Clone, Default)]
pub struct NotificationSummary {
    /// Pending requests addressed to the user.
    pub incoming_requests: Vec<FriendRequest>,
    /// Requests the user sent that were accepted.
    pub accepted_requests: Vec<FriendRequest>,
    /// Unseen messages addressed to the user, newest first.
    pub unseen_messages: Vec<UnseenMessage>,
    /// One entry per part that could not be loaded.
    pub warnings: Vec<String>,
}

/// Notification feed built on the friend request ledger.
pub struct NotificationFeed<S> {
    ledger: FriendLedger<S>,
}

impl<S> Clone for NotificationFeed<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
        }
    }
}

impl<S: SocialStore> NotificationFeed<S> {
    /// Creates a new feed.
    pub fn new(ledger: FriendLedger<S>) -> Self {
        Self { ledger }
    }

    /// Unseen messages for `receiver_id`, newest first, with senders resolved.
    pub async fn unseen_messages(&self, receiver_id: Uuid) -> LedgerResult<Vec<UnseenMessage>> {
        let store = self.ledger.store();
        let messages = store.list_unseen_messages(receiver_id).await?;

        let mut sender_ids: Vec<Uuid> = messages.iter().map(|m| m.sender_id).collect();
        sender_ids.sort_unstable();
        sender_ids.dedup();

        let senders: HashMap<Uuid, User> = store
            .get_users(&sender_ids)
            .await?
            .into_iter()
            .map(|user| (user.id, user))
            .collect();

        Ok(messages
            .into_iter()
            .map(|message| UnseenMessage {
                sender: senders.get(&message.sender_id).cloned(),
                message,
            })
            .collect())
    }

    /// Builds the full notification summary for `user_id`.
    pub async fn feed(&self, user_id: Uuid) -> NotificationSummary {
        let mut summary = NotificationSummary::default();

        match self.ledger.list_incoming_pending(user_id).await {
            Ok(requests) => summary.incoming_requests = requests,
            Err(e) => degrade(&mut summary.warnings, "incoming requests", user_id, &e),
        }

        match self.ledger.list_accepted_outgoing(user_id).await {
            Ok(requests) => summary.accepted_requests = requests,
            Err(e) => degrade(&mut summary.warnings, "accepted requests", user_id, &e),
        }

        match self.unseen_messages(user_id).await {
            Ok(messages) => summary.unseen_messages = messages,
            Err(e) => degrade(&mut summary.warnings, "unseen messages", user_id, &e),
        }

        summary
    }

    /// Stores a message pushed by the chat service.
    ///
    /// Returns false if a message with the same ID was already recorded, so
    /// redelivered webhooks are harmless.
    pub async fn record_message(&self, message: Message) -> LedgerResult<bool> {
        let message_id = message.id.clone();
        match self.ledger.store().create_message(message).await {
            Ok(message) => {
                tracing::debug!(
                    message_id = %message.id,
                    receiver_id = %message.receiver_id,
                    "Recorded unseen message"
                );
                Ok(true)
            }
            Err(StoreError::AlreadyExists { .. }) => {
                tracing::debug!(message_id = %message_id, "Message already recorded");
                Ok(false)
            }
            Err(e) => {
                tracing::error!(message_id = %message_id, error = %e, "Failed to record message");
                Err(e.into())
            }
        }
    }

    /// Flags every unseen message to `receiver_id` in `channel_id` as seen.
    pub async fn mark_seen(&self, receiver_id: Uuid, channel_id: &str) -> LedgerResult<u64> {
        let updated = self
            .ledger
            .store()
            .mark_messages_seen(receiver_id, channel_id)
            .await?;

        tracing::debug!(
            receiver_id = %receiver_id,
            channel_id = %channel_id,
            updated,
            "Marked messages seen"
        );

        Ok(updated)
    }
}

fn degrade(warnings: &mut Vec<String>, part: &str, user_id: Uuid, error: &dyn std::error::Error) {
    tracing::warn!(user_id = %user_id, part, error = %error, "Notification part unavailable");
    warnings.push(format!("Could not load {part}"));
}
