//! Chat service endpoints.
//!
//! Token issuance for the client SDK, the signed webhook the chat service
//! pushes message events to, and a Server-Sent Events relay of those events
//! for clients watching a direct channel.

use std::{convert::Infallible, sync::Arc};

use api_protocol::{ChatTokenResponse, ChatWebhookEvent};
use auth::{AuthError, ChatIdentity, parse_direct_channel_id, verify_webhook_signature};
use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use chrono::Utc;
use entities::{Message, UserPair};
use futures_util::Stream;
use social_store::SocialStore;

use crate::error::{ServerError, ServerResult};
use crate::middleware::AuthenticatedUser;
use crate::services::channel_events::{ChannelEvent, ChannelSubscription};
use crate::state::AppState;

/// Header carrying the hex HMAC-SHA256 of the webhook body.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Issues a chat-service token for the caller.
pub async fn get_chat_token<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> ServerResult<Json<ChatTokenResponse>> {
    let issuer = state.chat()?;
    let token = issuer.issue(auth.id)?;

    tracing::debug!(user_id = %auth.id, "Issued chat token");

    Ok(Json(ChatTokenResponse {
        token,
        api_key: issuer.api_key().to_string(),
        user: ChatIdentity::new(
            auth.id.to_string(),
            auth.user.full_name.clone(),
            auth.user.profile_pic.clone(),
        ),
    }))
}

/// Receives message events from the chat service.
pub async fn handle_webhook<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let secret = state
        .config
        .stream_api_secret
        .as_deref()
        .ok_or(ServerError::ChatUnavailable)?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::InvalidSignature)?;
    verify_webhook_signature(secret, &body, signature)?;

    let event: ChatWebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ServerError::InvalidRequest(format!("Malformed webhook body: {e}")))?;

    tracing::debug!(channel_id = ?event.channel_id(), "Received chat webhook");

    match event {
        ChatWebhookEvent::MessageNew {
            channel_id,
            message,
        } => {
            let Some((low, high)) = parse_direct_channel_id(&channel_id) else {
                tracing::debug!(
                    channel_id = %channel_id,
                    "Ignoring message outside a direct channel"
                );
                return Ok(StatusCode::NO_CONTENT);
            };

            let sender_id = message.user.id;
            let receiver_id = if sender_id == low {
                high
            } else if sender_id == high {
                low
            } else {
                return Err(ServerError::InvalidRequest(
                    "Message sender is not a member of the channel".to_string(),
                ));
            };

            let created_at = message.created_at.unwrap_or_else(Utc::now);
            let record = Message::new(
                message.id.clone(),
                sender_id,
                receiver_id,
                channel_id.clone(),
                message.text.clone(),
            )
            .with_created_at(created_at);

            if state.notifications.record_message(record).await? {
                state.channel_events.publish(ChannelEvent::MessageNew {
                    channel_id,
                    message_id: message.id,
                    sender_id,
                    text: message.text,
                    created_at,
                });
            }
        }
        ChatWebhookEvent::MessageRead { channel_id, user } => {
            state.notifications.mark_seen(user.id, &channel_id).await?;
            state.channel_events.publish(ChannelEvent::MessageRead {
                channel_id,
                user_id: user.id,
            });
        }
        ChatWebhookEvent::Other => {
            tracing::trace!("Ignoring untracked webhook event");
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Streams events for a direct channel the caller belongs to.
///
/// GET /api/chat/channels/:channelId/events
pub async fn channel_events<S: SocialStore>(
    State(state): State<Arc<AppState<S>>>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(channel_id): Path<String>,
) -> ServerResult<impl IntoResponse> {
    let is_member = parse_direct_channel_id(&channel_id)
        .is_some_and(|(low, high)| UserPair::new(low, high).contains(auth.id));
    if !is_member {
        return Err(ServerError::PermissionDenied(
            "You are not a member of this channel".to_string(),
        ));
    }

    tracing::info!(user_id = %auth.id, channel_id = %channel_id, "SSE client connected");

    let subscription = state.channel_events.subscribe(&channel_id);
    Ok(Sse::new(event_stream(subscription)).keep_alive(KeepAlive::default()))
}

fn event_stream(
    mut subscription: ChannelSubscription,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        while let Some(event) = subscription.recv().await {
            match serde_json::to_string(&event) {
                Ok(json) => yield Ok(Event::default().event(event.name()).data(json)),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize channel event"),
            }
        }

        tracing::debug!(channel_id = %subscription.channel_id(), "Channel stream ended");
    }
}
