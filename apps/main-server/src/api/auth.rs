//! Authentication API endpoints.

use api_protocol::{Account, MeResponse};
use axum::{Extension, Json};

use crate::middleware::AuthenticatedUser;

/// Gets the current user.
pub async fn get_current_user(Extension(auth): Extension<AuthenticatedUser>) -> Json<MeResponse> {
    Json(MeResponse {
        user: Account::from(&auth.user),
    })
}
