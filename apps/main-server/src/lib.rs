//! ChatMate Server
//!
//! The server owns the friend-request ledger and the notification read-model
//! of a language-exchange chat app. Chat itself runs on an external chat
//! service; this server issues its tokens and ingests its webhooks.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

use std::{sync::Arc, time::Duration};

use auth::{ChatTokenIssuer, JwtConfig, JwtManager};
use axum::Router;
use social_store::SocialStore;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::state::{AppState, create_shared_state};

/// Creates the application router with all routes configured.
pub fn create_app<S: SocialStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let timeout = TimeoutLayer::new(Duration::from_secs(state.config.request_timeout_secs));

    api::create_router(state)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Creates the application state with the given configuration and store.
pub fn create_state<S: SocialStore>(
    config: Config,
    store: Arc<S>,
) -> anyhow::Result<Arc<AppState<S>>> {
    let jwt_config =
        JwtConfig::new(&config.jwt_secret).with_expiration_hours(config.jwt_expiration_hours);
    let jwt_manager = JwtManager::new(jwt_config);

    let chat = match (&config.stream_api_key, &config.stream_api_secret) {
        (Some(key), Some(secret)) => Some(ChatTokenIssuer::new(key, secret)?),
        _ => {
            tracing::warn!("Chat service credentials not set; chat endpoints are disabled");
            None
        }
    };

    Ok(create_shared_state(config, store, jwt_manager, chat))
}

/// Initializes tracing with the given log level.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
