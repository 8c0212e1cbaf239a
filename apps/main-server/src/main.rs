//! ChatMate Server binary.

use std::{net::SocketAddr, sync::Arc};

use chatmate_server::{
    config::{Config, StorageBackend},
    create_app, create_state, init_tracing,
    services::directory::import_users,
};
use social_store::{MemoryStore, SocialStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    tracing::info!(
        chat_enabled = config.chat_configured(),
        "Starting ChatMate Server"
    );

    match config.storage() {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            serve(config, MemoryStore::new()).await
        }
        StorageBackend::Sqlite(url) => {
            let store = SqliteStore::connect(&url).await?;
            tracing::info!(url = %url, "Connected to SQLite");
            serve(config, store).await
        }
    }
}

async fn serve<S: SocialStore + 'static>(config: Config, store: S) -> anyhow::Result<()> {
    let store = Arc::new(store);

    if let Some(path) = &config.users_file {
        import_users(store.as_ref(), path).await?;
    }

    // Parse server address
    let addr: SocketAddr = config.server_addr().parse()?;

    let state = create_state(config, store)?;
    let app = create_app(state);

    tracing::info!(addr = %addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
