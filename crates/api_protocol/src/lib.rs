//! JSON wire types for the ChatMate HTTP API
//!
//! Request paths carry all inputs, so this crate only defines response
//! bodies, the error body, and the events the chat service pushes to the
//! webhook. Field names are camelCase except for webhook payloads, which
//! follow the chat service's snake_case format.

mod error;
mod responses;
mod types;
mod webhook;

pub use error::*;
pub use responses::*;
pub use types::*;
pub use webhook::*;
