//! Application state.

use std::sync::Arc;

use auth::{ChatTokenIssuer, JwtManager};
use social_store::{FriendLedger, NotificationFeed, SocialStore};

use crate::config::Config;
use crate::error::{ServerError, ServerResult};
use crate::services::channel_events::ChannelEventHub;

/// Shared application state.
pub struct AppState<S: SocialStore> {
    /// Server configuration.
    pub config: Config,
    /// Friend request ledger. Also owns the store handle.
    pub ledger: FriendLedger<S>,
    /// Notification read-model.
    pub notifications: NotificationFeed<S>,
    /// Session token validation.
    pub jwt_manager: JwtManager,
    /// Chat token issuer (absent when chat credentials are not configured).
    pub chat: Option<ChatTokenIssuer>,
    /// Per-channel event fan-out for connected clients.
    pub channel_events: ChannelEventHub,
}

impl<S: SocialStore> AppState<S> {
    /// Creates new application state.
    pub fn new(
        config: Config,
        store: Arc<S>,
        jwt_manager: JwtManager,
        chat: Option<ChatTokenIssuer>,
    ) -> Self {
        let ledger = FriendLedger::new(store);
        let notifications = NotificationFeed::new(ledger.clone());

        Self {
            config,
            ledger,
            notifications,
            jwt_manager,
            chat,
            channel_events: ChannelEventHub::new(),
        }
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<S> {
        self.ledger.store()
    }

    /// Returns the chat token issuer, or `ChatUnavailable`.
    pub fn chat(&self) -> ServerResult<&ChatTokenIssuer> {
        self.chat.as_ref().ok_or(ServerError::ChatUnavailable)
    }
}

/// Type alias for shared state.
pub type SharedState<S> = Arc<AppState<S>>;

/// Creates shared state from its parts.
pub fn create_shared_state<S: SocialStore>(
    config: Config,
    store: Arc<S>,
    jwt_manager: JwtManager,
    chat: Option<ChatTokenIssuer>,
) -> SharedState<S> {
    Arc::new(AppState::new(config, store, jwt_manager, chat))
}
