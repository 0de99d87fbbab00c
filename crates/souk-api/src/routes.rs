//! Router setup with all API routes and middleware.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/chat/message", post(handlers::chat_message))
        .route(
            "/conversations/{id}/messages",
            get(handlers::conversation_messages),
        )
        .route(
            "/conversations/{id}",
            axum::routing::delete(handlers::delete_conversation),
        )
        .route("/search", get(handlers::search))
        .route("/datasets", post(handlers::create_dataset))
        .route("/datasets/{id}", get(handlers::get_dataset))
        .route("/inquiries", post(handlers::create_inquiry))
        .route("/inquiries/{id}", get(handlers::get_inquiry))
        .route("/inquiries/{id}/submit", post(handlers::submit_inquiry))
        .route("/inquiries/{id}/review", post(handlers::review_inquiry))
        .route("/inquiries/{id}/respond", post(handlers::respond_inquiry))
        .route("/inquiries/{id}/accept", post(handlers::accept_inquiry))
        .route("/inquiries/{id}/reject", post(handlers::reject_inquiry))
        .route("/vendors/{id}/inquiries", get(handlers::vendor_inquiries))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
