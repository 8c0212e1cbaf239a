//! Authentication for ChatMate.
//!
//! This crate provides:
//! - Session JWT generation and validation
//! - Token issuance for the hosted chat service
//! - Webhook signature verification and direct channel IDs

mod chat;
mod error;
mod jwt;

pub use chat::*;
pub use error::*;
pub use jwt::*;

/// Default JWT expiration time in hours.
pub const DEFAULT_JWT_EXPIRATION_HOURS: u64 = 24;

/// Default JWT issuer.
pub const DEFAULT_JWT_ISSUER: &str = "chatmate";
