//! Server-side services.

pub mod channel_events;
pub mod directory;
