//! Friend graph storage for ChatMate
//!
//! This crate provides a storage abstraction for users, friend requests, and
//! the unseen-message read-model, with an in-memory backend and an SQLite
//! backend. On top of the store sit the friend request ledger, which owns
//! the request state machine, and the notification feed.

mod error;
mod ledger;
mod memory;
mod notifications;
mod sqlite;
mod traits;

pub use error::*;
pub use ledger::*;
pub use memory::*;
pub use notifications::*;
pub use sqlite::*;
pub use traits::*;
