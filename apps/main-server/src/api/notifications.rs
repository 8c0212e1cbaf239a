//! Notification feed endpoint.

use std::sync::Arc;

use api_protocol::{FriendRequestView, NotificationsResponse};
use axum::{Extension, Json, extract::State};
use entities::FriendRequest;
use social_store::SocialStore;
use uuid::Uuid;

use crate::middleware::AuthenticatedUser;
use crate::services::directory::{message_views, request_views};
use crate::state::AppState;

/// Gets the caller's notification feed.
///
/// Parts that fail to load are returned empty and named in `warnings`.
pub async fn get_notifications<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Json<NotificationsResponse> {
    let mut summary = state.notifications.feed(auth.id).await;
    let store = state.store().as_ref();

    let incoming_requests = resolve_or_warn(
        store,
        auth.id,
        &summary.incoming_requests,
        "incoming requests",
        &mut summary.warnings,
    )
    .await;
    let accepted_requests = resolve_or_warn(
        store,
        auth.id,
        &summary.accepted_requests,
        "accepted requests",
        &mut summary.warnings,
    )
    .await;

    Json(NotificationsResponse {
        incoming_requests,
        accepted_requests,
        unseen_messages: message_views(&summary.unseen_messages),
        warnings: summary.warnings,
    })
}

async fn resolve_or_warn<S: SocialStore>(
    store: &S,
    user_id: Uuid,
    requests: &[FriendRequest],
    part: &str,
    warnings: &mut Vec<String>,
) -> Vec<FriendRequestView> {
    match request_views(store, requests).await {
        Ok(views) => views,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                part,
                error = %e,
                "Could not resolve request parties"
            );
            warnings.push(format!("Could not load {part}"));
            Vec::new()
        }
    }
}
