//! API response types.

use auth::ChatIdentity;
use serde::{Deserialize, Serialize};

use crate::types::*;

// ============================================================================
// Auth Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: Account,
}

// ============================================================================
// Friend Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestsResponse {
    pub incoming_reqs: Vec<FriendRequestView>,
    pub accepted_reqs: Vec<FriendRequestView>,
}

// ============================================================================
// Notification Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnseenMessagesResponse {
    pub unseen_messages: Vec<MessageView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsResponse {
    pub incoming_requests: Vec<FriendRequestView>,
    pub accepted_requests: Vec<FriendRequestView>,
    pub unseen_messages: Vec<MessageView>,
    pub warnings: Vec<String>,
}

// ============================================================================
// Chat Responses
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTokenResponse {
    pub token: String,
    pub api_key: String,
    pub user: ChatIdentity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_token_response_shape() {
        let response = ChatTokenResponse {
            token: "t".to_string(),
            api_key: "k".to_string(),
            user: ChatIdentity::new("u-1", "Ana", "https://a/1.png"),
        };
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["apiKey"], "k");
        assert_eq!(json["user"]["name"], "Ana");
        assert_eq!(json["user"]["image"], "https://a/1.png");
    }

    #[test]
    fn test_notifications_response_keys() {
        let response = NotificationsResponse {
            incoming_requests: Vec::new(),
            accepted_requests: Vec::new(),
            unseen_messages: Vec::new(),
            warnings: vec!["Could not load unseen messages".to_string()],
        };
        let json = serde_json::to_value(&response).unwrap();

        for key in ["incomingRequests", "acceptedRequests", "unseenMessages", "warnings"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
