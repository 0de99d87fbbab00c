//! HTTP surface for Souk.
//!
//! Exposes the conversational agent, semantic search, catalog ingestion,
//! and the buyer/vendor inquiry operations over an axum router. All
//! responses are JSON; errors map to a consistent error body with the
//! inquiry legality violations surfacing as 409 Conflict.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
