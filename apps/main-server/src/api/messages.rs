//! Unseen message endpoints.

use std::sync::Arc;

use api_protocol::UnseenMessagesResponse;
use axum::{
    Extension, Json,
    extract::{Path, State},
};
use social_store::{LedgerError, SocialStore};

use crate::api::parse_id;
use crate::error::{ServerError, ServerResult};
use crate::middleware::AuthenticatedUser;
use crate::services::directory::message_views;
use crate::state::AppState;

/// Lists unseen messages addressed to `user_id`, newest first.
///
/// Only the user themself may read their messages.
pub async fn get_unseen_messages<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
) -> ServerResult<Json<UnseenMessagesResponse>> {
    let user_id = parse_id(&user_id, "user id")?;
    if user_id != auth.id {
        return Err(ServerError::PermissionDenied(
            "You can only read your own messages".to_string(),
        ));
    }

    let messages = state
        .notifications
        .unseen_messages(user_id)
        .await
        .map_err(|e| match e {
            LedgerError::StorageUnavailable(source) => {
                ServerError::Internal(format!("failed to fetch unseen messages: {source}"))
            }
            other => other.into(),
        })?;

    Ok(Json(UnseenMessagesResponse {
        unseen_messages: message_views(&messages),
    }))
}
