//! API error types

use serde::{Deserialize, Serialize};

/// Machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request was malformed
    InvalidRequest,
    /// The target of the operation is structurally invalid
    InvalidTarget,
    /// The two users are already friends
    AlreadyFriends,
    /// A friend request already exists for the pair
    DuplicateRequest,
    /// The referenced resource does not exist
    NotFound,
    /// Authentication required or invalid
    Unauthorized,
    /// The caller may not act on the resource
    Forbidden,
    /// The transition is not legal from the current state
    InvalidState,
    /// Storage failed transiently; the call may be retried
    StorageUnavailable,
    /// The chat service is not configured
    ChatUnavailable,
    /// Unexpected server failure
    InternalError,
}

impl ErrorCode {
    /// Returns the wire name of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidTarget => "invalid_target",
            ErrorCode::AlreadyFriends => "already_friends",
            ErrorCode::DuplicateRequest => "duplicate_request",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::InvalidState => "invalid_state",
            ErrorCode::StorageUnavailable => "storage_unavailable",
            ErrorCode::ChatUnavailable => "chat_unavailable",
            ErrorCode::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
    /// Machine-readable code
    pub code: ErrorCode,
}

impl ErrorBody {
    /// Creates a new error body
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code,
        }
    }
}

impl std::fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.error)
    }
}

impl std::error::Error for ErrorBody {}
