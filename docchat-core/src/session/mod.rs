//! Conversation session management
//!
//! Sessions hold the ordered transcript of a conversation plus an optional
//! document context, and are persisted as JSONL for easy reading.

pub mod manager;
pub mod store;

pub use manager::SessionManager;
pub use store::{DocumentContext, Role, Session, Turn};
