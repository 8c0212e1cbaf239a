//! Friend request and discovery endpoints.

use std::sync::Arc;

use api_protocol::{FriendRequestView, FriendRequestsResponse, UserProfile};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use social_store::SocialStore;

use crate::api::parse_id;
use crate::error::ServerResult;
use crate::middleware::AuthenticatedUser;
use crate::services::directory::{request_view, request_views};
use crate::state::AppState;

/// Sends a friend request from the caller to `recipient_id`.
pub async fn send_friend_request<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(recipient_id): Path<String>,
) -> ServerResult<(StatusCode, Json<FriendRequestView>)> {
    let recipient_id = parse_id(&recipient_id, "recipient id")?;

    let request = state.ledger.send_request(auth.id, recipient_id).await?;
    let view = request_view(state.store().as_ref(), &request).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Accepts a friend request addressed to the caller.
pub async fn accept_friend_request<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(request_id): Path<String>,
) -> ServerResult<Json<FriendRequestView>> {
    let request_id = parse_id(&request_id, "request id")?;

    let request = state.ledger.accept_request(request_id, auth.id).await?;
    Ok(Json(request_view(state.store().as_ref(), &request).await?))
}

/// Lists pending incoming requests and the caller's accepted requests.
pub async fn get_friend_requests<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ServerResult<Json<FriendRequestsResponse>> {
    let incoming = state.ledger.list_incoming_pending(auth.id).await?;
    let accepted = state.ledger.list_accepted_outgoing(auth.id).await?;

    let store = state.store().as_ref();
    Ok(Json(FriendRequestsResponse {
        incoming_reqs: request_views(store, &incoming).await?,
        accepted_reqs: request_views(store, &accepted).await?,
    }))
}

/// Lists every request the caller has sent.
pub async fn get_outgoing_friend_requests<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ServerResult<Json<Vec<FriendRequestView>>> {
    let outgoing = state.ledger.list_outgoing(auth.id).await?;
    Ok(Json(request_views(state.store().as_ref(), &outgoing).await?))
}

/// Lists the caller's friends.
pub async fn get_friends<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ServerResult<Json<Vec<UserProfile>>> {
    let friends = state.ledger.list_friends(auth.id).await?;
    Ok(Json(friends.iter().map(UserProfile::from).collect()))
}

/// Lists users the caller could befriend.
pub async fn get_recommended_users<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ServerResult<Json<Vec<UserProfile>>> {
    let users = state.ledger.recommend(auth.id).await?;
    Ok(Json(users.iter().map(UserProfile::from).collect()))
}
