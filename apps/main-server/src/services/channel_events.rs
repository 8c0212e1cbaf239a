//! Per-channel event fan-out.
//!
//! Every channel has at most one broadcast sender, created by the first
//! subscriber. Subscriptions deregister on drop and the sender is removed
//! with its last subscriber, so disconnected clients leave nothing behind.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

/// Capacity for channel broadcast queues
const CHANNEL_CAPACITY: usize = 256;

/// An event relayed to clients watching a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ChannelEvent {
    /// A message was posted.
    #[serde(rename = "message.new")]
    MessageNew {
        channel_id: String,
        message_id: String,
        sender_id: Uuid,
        text: String,
        created_at: DateTime<Utc>,
    },

    /// A member read the channel.
    #[serde(rename = "message.read")]
    MessageRead { channel_id: String, user_id: Uuid },
}

impl ChannelEvent {
    /// Returns the channel the event belongs to.
    pub fn channel_id(&self) -> &str {
        match self {
            Self::MessageNew { channel_id, .. } | Self::MessageRead { channel_id, .. } => {
                channel_id
            }
        }
    }

    /// Returns the SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MessageNew { .. } => "message.new",
            Self::MessageRead { .. } => "message.read",
        }
    }
}

type Senders = HashMap<String, broadcast::Sender<ChannelEvent>>;

/// Registry of channel broadcast senders.
#[derive(Debug, Clone, Default)]
pub struct ChannelEventHub {
    senders: Arc<Mutex<Senders>>,
}

fn lock(senders: &Mutex<Senders>) -> MutexGuard<'_, Senders> {
    senders.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChannelEventHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to events for `channel_id`.
    pub fn subscribe(&self, channel_id: &str) -> ChannelSubscription {
        let mut senders = lock(&self.senders);
        let receiver = senders
            .entry(channel_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();

        tracing::debug!(channel_id = %channel_id, "Channel subscriber added");

        ChannelSubscription {
            senders: Arc::clone(&self.senders),
            channel_id: channel_id.to_string(),
            receiver: Some(receiver),
        }
    }

    /// Delivers `event` to the channel's subscribers.
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, event: ChannelEvent) -> usize {
        let senders = lock(&self.senders);
        match senders.get(event.channel_id()) {
            // Only fails when every receiver is gone between drop and cleanup.
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Returns the number of live subscriptions on `channel_id`.
    pub fn subscriber_count(&self, channel_id: &str) -> usize {
        lock(&self.senders)
            .get(channel_id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Returns the number of channels with at least one subscriber.
    pub fn active_channels(&self) -> usize {
        lock(&self.senders).len()
    }
}

/// A live subscription to one channel.
#[derive(Debug)]
pub struct ChannelSubscription {
    senders: Arc<Mutex<Senders>>,
    channel_id: String,
    receiver: Option<broadcast::Receiver<ChannelEvent>>,
}

impl ChannelSubscription {
    /// Returns the subscribed channel.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Waits for the next event. Events missed by a slow reader are
    /// skipped.
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(channel_id = %self.channel_id, skipped, "Subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        let mut senders = lock(&self.senders);

        // Release the receiver under the lock so the count below is exact.
        drop(self.receiver.take());

        let empty = senders
            .get(&self.channel_id)
            .is_some_and(|sender| sender.receiver_count() == 0);
        if empty {
            senders.remove(&self.channel_id);
            tracing::debug!(channel_id = %self.channel_id, "Channel closed");
        }
    }
}
