//! Route handler functions for all API endpoints.
//!
//! Each handler extracts parameters via axum extractors, drives the
//! shared services, and returns JSON. The inquiry endpoints act on behalf
//! of the vendor or buyer UI; the chat endpoint drives the agent.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use souk_core::types::{
    Dataset, Message, PricingModel, ToolCallRecord, Visibility,
};
use souk_inquiry::Inquiry;
use souk_vector::{DatasetMatch, SearchFilters, SearchRequest};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub datasets: usize,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub user_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessageResponse {
    pub conversation_id: Uuid,
    pub reply: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub exhausted: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub top_k: Option<usize>,
    pub domain: Option<String>,
    pub pricing: Option<String>,
    /// Vendor identity for private-catalog visibility.
    pub vendor_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<DatasetMatch>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDatasetRequest {
    pub vendor_id: Uuid,
    pub title: String,
    pub description: String,
    pub domain: String,
    pub pricing: PricingModel,
    #[serde(default)]
    pub topics: Vec<String>,
    pub temporal_coverage: Option<String>,
    pub geographic_coverage: Option<String>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInquiryRequest {
    pub buyer_id: Uuid,
    pub dataset_id: Uuid,
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
pub struct SubmitInquiryRequest {
    /// Structured confirmation from the buyer UI; must be true.
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub payload: Value,
}

// =============================================================================
// Health
// =============================================================================

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        datasets: state.catalog.len(),
    })
}

// =============================================================================
// Chat
// =============================================================================

pub async fn chat_message(
    State(state): State<AppState>,
    Json(req): Json<ChatMessageRequest>,
) -> Result<Json<ChatMessageResponse>, ApiError> {
    let outcome = state
        .orchestrator
        .handle_message(req.user_id, req.conversation_id, &req.message)
        .await?;
    Ok(Json(ChatMessageResponse {
        conversation_id: outcome.conversation_id,
        reply: outcome.reply,
        tool_calls: outcome.tool_calls,
        exhausted: outcome.exhausted,
    }))
}

pub async fn conversation_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.orchestrator.history(id)?))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.orchestrator.delete_conversation(id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

// =============================================================================
// Search and catalog
// =============================================================================

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let pricing = match params.pricing.as_deref() {
        Some(raw) => Some(
            raw.parse::<PricingModel>()
                .map_err(ApiError::BadRequest)?,
        ),
        None => None,
    };

    let request = SearchRequest {
        query: params.q.clone(),
        top_k: params.top_k,
        filters: SearchFilters {
            domain: params.domain,
            pricing,
            visibility: None,
        },
        caller_vendor: params.vendor_id,
    };
    let results = state.catalog.search(&request).await?;
    Ok(Json(SearchResponse {
        query: params.q,
        results,
    }))
}

pub async fn create_dataset(
    State(state): State<AppState>,
    Json(req): Json<CreateDatasetRequest>,
) -> Result<Json<Dataset>, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let mut dataset = Dataset::new(req.vendor_id, req.title, req.description, req.domain, req.pricing);
    dataset.topics = req.topics;
    dataset.temporal_coverage = req.temporal_coverage;
    dataset.geographic_coverage = req.geographic_coverage;
    if let Some(visibility) = req.visibility {
        dataset.visibility = visibility;
    }

    // Embedding generation is the blocking part of ingestion; bound it.
    tokio::time::timeout(
        std::time::Duration::from_secs(state.config.embedding.timeout_secs),
        state.catalog.upsert(dataset.clone()),
    )
    .await
    .map_err(|_| ApiError::Internal("embedding generation timed out".to_string()))??;
    tracing::info!(dataset = %dataset.id, vendor = %dataset.vendor_id, "Dataset listed");
    Ok(Json(dataset))
}

pub async fn get_dataset(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Dataset>, ApiError> {
    state
        .catalog
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("dataset not found: {}", id)))
}

// =============================================================================
// Inquiries
// =============================================================================

pub async fn create_inquiry(
    State(state): State<AppState>,
    Json(req): Json<CreateInquiryRequest>,
) -> Result<Json<Inquiry>, ApiError> {
    let dataset = state
        .catalog
        .get(req.dataset_id)
        .ok_or_else(|| ApiError::NotFound(format!("dataset not found: {}", req.dataset_id)))?;

    let payload = if req.payload.is_null() {
        serde_json::json!({})
    } else {
        req.payload
    };
    let inquiry = state.inquiries.create_draft(
        req.buyer_id,
        dataset.vendor_id,
        dataset.id,
        req.conversation_id,
        payload,
    )?;
    Ok(Json(inquiry))
}

pub async fn get_inquiry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Inquiry>, ApiError> {
    Ok(Json(state.inquiries.get(id)?))
}

/// Structured submit: the explicit buyer confirmation the free-text
/// affirmation check approximates in chat.
pub async fn submit_inquiry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitInquiryRequest>,
) -> Result<Json<Inquiry>, ApiError> {
    if !req.confirmed {
        return Err(ApiError::BadRequest(
            "submission requires confirmed=true".to_string(),
        ));
    }
    Ok(Json(state.inquiries.submit(id)?))
}

pub async fn review_inquiry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Inquiry>, ApiError> {
    Ok(Json(state.inquiries.begin_review(id)?))
}

pub async fn respond_inquiry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<Inquiry>, ApiError> {
    Ok(Json(state.inquiries.respond(id, req.payload)?))
}

pub async fn accept_inquiry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Inquiry>, ApiError> {
    Ok(Json(state.inquiries.accept(id)?))
}

pub async fn reject_inquiry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Inquiry>, ApiError> {
    Ok(Json(state.inquiries.reject(id)?))
}

pub async fn vendor_inquiries(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Inquiry>>, ApiError> {
    Ok(Json(state.inquiries.list_pending_for_vendor(id)?))
}
