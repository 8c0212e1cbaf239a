//! Server error types.

use api_protocol::{ErrorBody, ErrorCode};
use auth::AuthError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use social_store::LedgerError;

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication required.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// The caller may not read or change the resource.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Friend ledger error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Authentication error.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Chat service credentials are not configured.
    #[error("Chat service is not configured")]
    ChatUnavailable,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn parts(&self) -> (StatusCode, ErrorCode, String) {
        match self {
            ServerError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidRequest, msg.clone())
            }
            ServerError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                ErrorCode::Unauthorized,
                "Authentication required".to_string(),
            ),
            ServerError::PermissionDenied(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::Forbidden, msg.clone())
            }
            ServerError::Ledger(e) => ledger_parts(e),
            ServerError::Auth(e) => match e {
                AuthError::JwtEncoding(_) | AuthError::Configuration(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::InternalError,
                    "Internal server error".to_string(),
                ),
                _ => (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized, e.to_string()),
            },
            ServerError::ChatUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::ChatUnavailable,
                self.to_string(),
            ),
            ServerError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                "Internal server error".to_string(),
            ),
        }
    }
}

fn ledger_parts(error: &LedgerError) -> (StatusCode, ErrorCode, String) {
    let (status, code) = match error {
        LedgerError::InvalidTarget => (StatusCode::BAD_REQUEST, ErrorCode::InvalidTarget),
        LedgerError::AlreadyFriends => (StatusCode::CONFLICT, ErrorCode::AlreadyFriends),
        LedgerError::DuplicateRequest => (StatusCode::CONFLICT, ErrorCode::DuplicateRequest),
        LedgerError::NotFound { .. } => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
        LedgerError::Forbidden => (StatusCode::FORBIDDEN, ErrorCode::Forbidden),
        LedgerError::InvalidState { .. } => (StatusCode::CONFLICT, ErrorCode::InvalidState),
        LedgerError::StorageUnavailable(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::StorageUnavailable,
                "Storage is temporarily unavailable".to_string(),
            );
        }
    };
    (status, code, error.to_string())
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            tracing::error!(error = %self, code = %code, "Request failed");
        } else {
            tracing::debug!(error = %self, code = %code, "Request rejected");
        }

        (status, Json(ErrorBody::new(code, message))).into_response()
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
