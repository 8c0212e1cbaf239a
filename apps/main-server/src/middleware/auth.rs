//! Authentication middleware.

use std::sync::Arc;

use auth::Claims;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use entities::User;
use social_store::{LedgerError, SocialStore};
use uuid::Uuid;

use crate::error::ServerError;
use crate::state::AppState;

/// The signed-in user, resolved against the directory.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// User ID.
    pub id: Uuid,
    /// The user's directory record at the time of the request.
    pub user: User,
}

/// Extracts the bearer token from the Authorization header.
fn extract_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

async fn authenticate<S: SocialStore>(
    state: &AppState<S>,
    token: Option<String>,
) -> Result<AuthenticatedUser, ServerError> {
    let token = token.ok_or(ServerError::AuthenticationRequired)?;
    let claims: Claims = state.jwt_manager.validate_token(&token)?;
    let id = claims.user_id()?;

    let user = match state.ledger.user(id).await {
        Ok(user) => user,
        Err(LedgerError::NotFound { .. }) => {
            tracing::debug!(user_id = %id, "Token subject is not in the directory");
            return Err(ServerError::AuthenticationRequired);
        }
        Err(e) => return Err(e.into()),
    };

    Ok(AuthenticatedUser { id, user })
}

/// Authentication middleware.
///
/// Validates the session token from the Authorization header, loads the
/// user it names, and stores an `AuthenticatedUser` in the request
/// extensions.
pub async fn auth_middleware<S: SocialStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    mut request: Request,
    next: Next,
) -> Response {
    // Owned so the request is not borrowed across the store lookup.
    let token = extract_token(&request).map(str::to_owned);

    match authenticate(&state, token).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}
