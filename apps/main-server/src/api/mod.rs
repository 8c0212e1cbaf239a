//! API endpoints.

pub mod auth;
pub mod chat;
pub mod friends;
pub mod messages;
pub mod notifications;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use social_store::SocialStore;
use uuid::Uuid;

use crate::error::{ServerError, ServerResult};
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Creates the API router with all endpoints.
pub fn create_router<S: SocialStore + 'static>(state: Arc<AppState<S>>) -> Router {
    let protected = Router::new()
        // Session endpoints
        .route("/api/auth/me", get(auth::get_current_user))
        // Friend endpoints
        .route(
            "/api/users/friend-request/:id",
            post(friends::send_friend_request::<S>),
        )
        .route(
            "/api/users/friend-request/:id/accept",
            patch(friends::accept_friend_request::<S>),
        )
        .route(
            "/api/users/friend-requests",
            get(friends::get_friend_requests::<S>),
        )
        .route(
            "/api/users/friend-requests/outgoing",
            get(friends::get_outgoing_friend_requests::<S>),
        )
        .route("/api/users/friends", get(friends::get_friends::<S>))
        .route(
            "/api/users/recommended",
            get(friends::get_recommended_users::<S>),
        )
        // Notification endpoints
        .route(
            "/api/messages/:user_id",
            get(messages::get_unseen_messages::<S>),
        )
        .route(
            "/api/notifications",
            get(notifications::get_notifications::<S>),
        )
        // Chat endpoints
        .route("/api/chat/token", get(chat::get_chat_token::<S>))
        .route(
            "/api/chat/channels/:channel_id/events",
            get(chat::channel_events::<S>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::<S>,
        ));

    Router::new()
        .merge(protected)
        // Chat service webhook (signed, no session)
        .route("/api/chat/webhook", post(chat::handle_webhook::<S>))
        // Health check
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Parses a path segment as an ID.
pub(crate) fn parse_id(raw: &str, what: &str) -> ServerResult<Uuid> {
    raw.parse()
        .map_err(|_| ServerError::InvalidRequest(format!("Invalid {what}: {raw}")))
}

#[cfg(test)]
mod tests {
    use ::auth::{ChatTokenIssuer, JwtConfig, JwtManager, direct_channel_id, sign_webhook_body};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use entities::User;
    use serde_json::{Value, json};
    use social_store::MemoryStore;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::state::create_shared_state;

    const JWT_SECRET: &str = "test-secret-key-must-be-long-enough-for-security";
    const CHAT_SECRET: &str = "chat-secret";

    struct Harness {
        app: Router,
        state: Arc<AppState<MemoryStore>>,
        jwt: JwtManager,
    }

    impl Harness {
        async fn new(with_chat: bool) -> Self {
            let config = Config::from_lookup(|key| match key {
                "CHATMATE_JWT_SECRET" => Some(JWT_SECRET.to_string()),
                "STREAM_API_KEY" if with_chat => Some("chat-key".to_string()),
                "STREAM_API_SECRET" if with_chat => Some(CHAT_SECRET.to_string()),
                _ => None,
            })
            .unwrap();

            let jwt = JwtManager::new(JwtConfig::new(JWT_SECRET));
            let chat = with_chat.then(|| ChatTokenIssuer::new("chat-key", CHAT_SECRET).unwrap());
            let state =
                create_shared_state(config, Arc::new(MemoryStore::new()), jwt.clone(), chat);

            Self {
                app: create_router(state.clone()),
                state,
                jwt,
            }
        }

        async fn user(&self, name: &str, native: &str, learning: &str) -> User {
            self.state
                .store()
                .create_user(
                    User::new(format!("{name}@example.com"), name).with_languages(native, learning),
                )
                .await
                .unwrap()
        }

        fn token(&self, user: &User) -> String {
            self.jwt
                .generate_token(user.id, user.email.clone(), Some(user.full_name.clone()))
                .unwrap()
        }

        async fn call(&self, method: &str, uri: &str, user: Option<&User>) -> Response {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(user) = user {
                let bearer = format!("Bearer {}", self.token(user));
                builder = builder.header(header::AUTHORIZATION, bearer);
            }
            self.app
                .clone()
                .oneshot(builder.body(Body::empty()).unwrap())
                .await
                .unwrap()
        }

        async fn webhook(&self, body: Value, signature: Option<String>) -> Response {
            let body = serde_json::to_vec(&body).unwrap();
            let mut builder = Request::builder()
                .method("POST")
                .uri("/api/chat/webhook")
                .header(header::CONTENT_TYPE, "application/json");
            if let Some(signature) = signature {
                builder = builder.header(chat::SIGNATURE_HEADER, signature);
            }
            self.app
                .clone()
                .oneshot(builder.body(Body::from(body)).unwrap())
                .await
                .unwrap()
        }

        async fn signed_webhook(&self, body: Value) -> Response {
            let signature =
                sign_webhook_body(CHAT_SECRET, &serde_json::to_vec(&body).unwrap()).unwrap();
            self.webhook(body, Some(signature)).await
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let harness = Harness::new(false).await;
        let response = harness.call("GET", "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_routes_need_a_known_user() {
        let harness = Harness::new(false).await;

        let response = harness.call("GET", "/api/users/friends", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["code"], "unauthorized");

        let stranger = User::new("ghost@example.com", "Ghost");
        let response = harness.call("GET", "/api/users/friends", Some(&stranger)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me() {
        let harness = Harness::new(false).await;
        let ana = harness.user("ana", "spanish", "english").await;

        let response = harness.call("GET", "/api/auth/me", Some(&ana)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["user"]["fullName"], "ana");
        assert_eq!(body["user"]["email"], "ana@example.com");
    }

    #[tokio::test]
    async fn test_friend_request_flow() {
        let harness = Harness::new(false).await;
        let ana = harness.user("ana", "spanish", "english").await;
        let ben = harness.user("ben", "english", "spanish").await;

        let response = harness
            .call(
                "POST",
                &format!("/api/users/friend-request/{}", ben.id),
                Some(&ana),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let request = json_body(response).await;
        assert_eq!(request["status"], "pending");
        assert_eq!(request["sender"]["fullName"], "ana");
        assert_eq!(request["recipient"]["id"], ben.id.to_string());
        let request_id = request["id"].as_str().unwrap().to_string();

        // Same pair, other direction.
        let response = harness
            .call(
                "POST",
                &format!("/api/users/friend-request/{}", ana.id),
                Some(&ben),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["code"], "duplicate_request");

        let response = harness.call("GET", "/api/users/friend-requests", Some(&ben)).await;
        let body = json_body(response).await;
        assert_eq!(body["incomingReqs"].as_array().unwrap().len(), 1);

        // Only the recipient may accept.
        let accept_uri = format!("/api/users/friend-request/{request_id}/accept");
        let response = harness.call("PATCH", &accept_uri, Some(&ana)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = harness.call("PATCH", &accept_uri, Some(&ben)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "accepted");

        let response = harness.call("PATCH", &accept_uri, Some(&ben)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(response).await["code"], "invalid_state");

        let response = harness.call("GET", "/api/users/friends", Some(&ana)).await;
        let friends = json_body(response).await;
        assert_eq!(friends[0]["id"], ben.id.to_string());

        let response = harness
            .call("GET", "/api/users/friend-requests/outgoing", Some(&ana))
            .await;
        let outgoing = json_body(response).await;
        assert_eq!(outgoing[0]["status"], "accepted");

        let response = harness.call("GET", "/api/users/friend-requests", Some(&ana)).await;
        let body = json_body(response).await;
        assert_eq!(body["acceptedReqs"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_friend_request_errors() {
        let harness = Harness::new(false).await;
        let ana = harness.user("ana", "spanish", "english").await;

        let response = harness
            .call(
                "POST",
                &format!("/api/users/friend-request/{}", ana.id),
                Some(&ana),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "invalid_target");

        let response = harness
            .call(
                "POST",
                &format!("/api/users/friend-request/{}", Uuid::new_v4()),
                Some(&ana),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = harness
            .call("POST", "/api/users/friend-request/not-an-id", Some(&ana))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "invalid_request");
    }

    #[tokio::test]
    async fn test_recommended_excludes_requested_users() {
        let harness = Harness::new(false).await;
        let ana = harness.user("ana", "spanish", "english").await;
        let ben = harness.user("ben", "english", "spanish").await;
        let kim = harness.user("kim", "korean", "japanese").await;

        let response = harness.call("GET", "/api/users/recommended", Some(&ana)).await;
        let ids: Vec<String> = json_body(response)
            .await
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec![ben.id.to_string(), kim.id.to_string()]);

        harness
            .call(
                "POST",
                &format!("/api/users/friend-request/{}", ben.id),
                Some(&ana),
            )
            .await;

        let response = harness.call("GET", "/api/users/recommended", Some(&ana)).await;
        let body = json_body(response).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["id"], kim.id.to_string());
    }

    #[tokio::test]
    async fn test_chat_token() {
        let harness = Harness::new(true).await;
        let ana = harness.user("ana", "spanish", "english").await;

        let response = harness.call("GET", "/api/chat/token", Some(&ana)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["apiKey"], "chat-key");
        assert_eq!(body["user"]["id"], ana.id.to_string());
        assert_eq!(body["user"]["name"], "ana");

        let issuer = ChatTokenIssuer::new("chat-key", CHAT_SECRET).unwrap();
        let claims = issuer.verify(body["token"].as_str().unwrap()).unwrap();
        assert_eq!(claims.user_id, ana.id.to_string());
    }

    #[tokio::test]
    async fn test_chat_unconfigured() {
        let harness = Harness::new(false).await;
        let ana = harness.user("ana", "spanish", "english").await;

        let response = harness.call("GET", "/api/chat/token", Some(&ana)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["code"], "chat_unavailable");

        let response = harness.webhook(json!({ "type": "message.read" }), None).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_webhook_feeds_unseen_messages() {
        let harness = Harness::new(true).await;
        let ana = harness.user("ana", "spanish", "english").await;
        let ben = harness.user("ben", "english", "spanish").await;
        let channel_id = direct_channel_id(ana.id, ben.id);

        let new_message = json!({
            "type": "message.new",
            "channel_id": channel_id,
            "message": {
                "id": "msg-1",
                "text": "hola",
                "user": { "id": ana.id },
                "created_at": "2024-05-01T10:00:00Z"
            }
        });

        let response = harness.webhook(new_message.clone(), Some("00".to_string())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = harness.signed_webhook(new_message).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = harness
            .call("GET", &format!("/api/messages/{}", ben.id), Some(&ben))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let unseen = body["unseenMessages"].as_array().unwrap();
        assert_eq!(unseen.len(), 1);
        assert_eq!(unseen[0]["text"], "hola");
        assert_eq!(unseen[0]["sender"]["fullName"], "ana");

        // Nobody else may read ben's messages.
        let response = harness
            .call("GET", &format!("/api/messages/{}", ben.id), Some(&ana))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = harness.call("GET", "/api/notifications", Some(&ben)).await;
        let body = json_body(response).await;
        assert_eq!(body["unseenMessages"].as_array().unwrap().len(), 1);
        assert!(body["warnings"].as_array().unwrap().is_empty());

        let response = harness
            .signed_webhook(json!({
                "type": "message.read",
                "channel_id": channel_id,
                "user": { "id": ben.id }
            }))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = harness
            .call("GET", &format!("/api/messages/{}", ben.id), Some(&ben))
            .await;
        let body = json_body(response).await;
        assert!(body["unseenMessages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_webhook_ignores_other_events() {
        let harness = Harness::new(true).await;

        let response = harness
            .signed_webhook(json!({ "type": "typing.start", "channel_id": "x" }))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = harness
            .signed_webhook(json!({
                "type": "message.new",
                "channel_id": "general",
                "message": { "id": "m", "user": { "id": Uuid::new_v4() } }
            }))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_channel_events_membership() {
        let harness = Harness::new(true).await;
        let ana = harness.user("ana", "spanish", "english").await;
        let ben = harness.user("ben", "english", "spanish").await;
        let kim = harness.user("kim", "korean", "japanese").await;
        let channel_id = direct_channel_id(ana.id, ben.id);
        let uri = format!("/api/chat/channels/{channel_id}/events");

        let response = harness.call("GET", &uri, Some(&kim)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = harness.call("GET", &uri, Some(&ben)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(harness.state.channel_events.subscriber_count(&channel_id), 1);

        drop(response);
        assert_eq!(harness.state.channel_events.subscriber_count(&channel_id), 0);
    }
}
