//! SQLite persistence for Souk conversations.
//!
//! Stores conversations and their messages, including the immutable
//! tool-call audit trail attached to assistant messages. The repository
//! exposes append-only message writes: there is deliberately no update
//! path, which is what makes persisted tool-call records an audit trail.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::ConversationRepository;
