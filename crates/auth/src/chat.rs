//! Hosted chat service integration.
//!
//! The chat service owns transport, presence and read state. This side signs
//! user tokens for its client SDK, names direct channels, and checks the
//! signature on webhooks it pushes back.

use chrono::Utc;
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::{AuthError, AuthResult};

type HmacSha256 = Hmac<Sha256>;

/// Length of a hyphenated UUID.
const UUID_LEN: usize = 36;

/// Claims carried by a chat-service user token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatClaims {
    /// The user the token authenticates.
    pub user_id: String,
    /// Issued at timestamp.
    pub iat: i64,
}

/// The identity the chat client connects with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatIdentity {
    /// User ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub image: String,
}

impl ChatIdentity {
    /// Creates a new chat identity.
    pub fn new(id: impl Into<String>, name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: image.into(),
        }
    }
}

/// Signs user tokens for the chat service.
#[derive(Clone)]
pub struct ChatTokenIssuer {
    api_key: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for ChatTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatTokenIssuer")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl ChatTokenIssuer {
    /// Creates a new issuer from the chat service credentials.
    pub fn new(api_key: impl Into<String>, api_secret: &str) -> AuthResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() || api_secret.is_empty() {
            return Err(AuthError::Configuration(
                "chat API key and secret must not be empty".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            encoding_key: EncodingKey::from_secret(api_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(api_secret.as_bytes()),
        })
    }

    /// Returns the public API key the client SDK needs.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Issues a token for `user_id`.
    pub fn issue(&self, user_id: Uuid) -> AuthResult<String> {
        let claims = ChatClaims {
            user_id: user_id.to_string(),
            iat: Utc::now().timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::JwtEncoding(e.to_string()))
    }

    /// Decodes a token this issuer signed.
    ///
    /// Chat tokens carry no expiry, so only the signature is checked.
    pub fn verify(&self, token: &str) -> AuthResult<ChatClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        Ok(decode::<ChatClaims>(token, &self.decoding_key, &validation)?.claims)
    }
}

/// Returns the ID of the one-to-one channel between two users.
///
/// Both sides compute the same ID regardless of who opens the chat.
pub fn direct_channel_id(a: Uuid, b: Uuid) -> String {
    let (a, b) = (a.to_string(), b.to_string());
    if a <= b {
        format!("{a}-{b}")
    } else {
        format!("{b}-{a}")
    }
}

/// Splits a direct channel ID back into its two members.
///
/// Returns `None` for anything `direct_channel_id` would not produce.
pub fn parse_direct_channel_id(channel_id: &str) -> Option<(Uuid, Uuid)> {
    if channel_id.len() != UUID_LEN * 2 + 1 || channel_id.as_bytes()[UUID_LEN] != b'-' {
        return None;
    }

    let low: Uuid = channel_id.get(..UUID_LEN)?.parse().ok()?;
    let high: Uuid = channel_id.get(UUID_LEN + 1..)?.parse().ok()?;

    (direct_channel_id(low, high) == channel_id).then_some((low, high))
}

/// Computes the hex HMAC-SHA256 signature of a webhook body.
pub fn sign_webhook_body(secret: &str, body: &[u8]) -> AuthResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::Configuration(format!("HMAC key init failed: {e}")))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a webhook body against its hex HMAC-SHA256 signature.
///
/// The comparison runs in constant time.
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature: &str) -> AuthResult<()> {
    let expected = hex::decode(signature.trim()).map_err(|_| AuthError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::Configuration(format!("HMAC key init failed: {e}")))?;
    mac.update(body);

    mac.verify_slice(&expected).map_err(|_| {
        tracing::warn!("Webhook signature mismatch");
        AuthError::InvalidSignature
    })
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[test]
    fn test_issue_and_verify_token() {
        let issuer = ChatTokenIssuer::new("key-123", "chat-secret").unwrap();
        let user_id = Uuid::new_v4();

        let token = issuer.issue(user_id).unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.user_id, user_id.to_string());
        assert!(claims.iat <= Utc::now().timestamp());
        assert_eq!(issuer.api_key(), "key-123");
    }

    #[test]
    fn test_token_from_other_secret_fails() {
        let ours = ChatTokenIssuer::new("key", "secret-a").unwrap();
        let theirs = ChatTokenIssuer::new("key", "secret-b").unwrap();

        let token = theirs.issue(Uuid::new_v4()).unwrap();
        assert_err!(ours.verify(&token));
    }

    #[test]
    fn test_empty_credentials_rejected() {
        assert!(matches!(
            ChatTokenIssuer::new("", "secret"),
            Err(AuthError::Configuration(_))
        ));
        assert_err!(ChatTokenIssuer::new("key", ""));
    }

    #[test]
    fn test_direct_channel_id_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let id = direct_channel_id(a, b);
        assert_eq!(id, direct_channel_id(b, a));

        let (low, high) = parse_direct_channel_id(&id).unwrap();
        let mut expected = [a, b];
        expected.sort_by_key(|u| u.to_string());
        assert_eq!([low, high], expected);
    }

    #[test]
    fn test_parse_rejects_foreign_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (low, high) = if a.to_string() <= b.to_string() { (a, b) } else { (b, a) };

        assert!(parse_direct_channel_id("general").is_none());
        assert!(parse_direct_channel_id(&format!("{high}-{low}")).is_none());
        assert!(parse_direct_channel_id(&format!("{low}_{high}")).is_none());
    }

    #[test]
    fn test_webhook_signature() {
        let body = br#"{"type":"message.read"}"#;
        let signature = sign_webhook_body("hook-secret", body).unwrap();

        assert_ok!(verify_webhook_signature("hook-secret", body, &signature));
        assert!(matches!(
            verify_webhook_signature("other-secret", body, &signature),
            Err(AuthError::InvalidSignature)
        ));
        assert!(matches!(
            verify_webhook_signature("hook-secret", b"tampered", &signature),
            Err(AuthError::InvalidSignature)
        ));
        assert!(matches!(
            verify_webhook_signature("hook-secret", body, "zz-not-hex"),
            Err(AuthError::InvalidSignature)
        ));
    }
}
