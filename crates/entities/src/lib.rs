//! Core entity definitions for ChatMate.
//!
//! This crate defines the data types shared across the ChatMate backend:
//! users, friend requests and mirrored direct messages.

mod friend_request;
mod message;
mod user;

pub use friend_request::*;
pub use message::*;
pub use user::*;
