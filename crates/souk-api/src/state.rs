//! Application state shared across all route handlers.
//!
//! All fields are `Arc`-shared services; handlers clone the state cheaply
//! via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use souk_chat::AgentOrchestrator;
use souk_core::config::SoukConfig;
use souk_inquiry::InquiryStore;
use souk_vector::DatasetCatalog;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<SoukConfig>,
    /// The conversational agent.
    pub orchestrator: Arc<AgentOrchestrator>,
    /// Semantic dataset catalog.
    pub catalog: Arc<DatasetCatalog>,
    /// Inquiry workflow store.
    pub inquiries: Arc<InquiryStore>,
    /// Server start time for uptime reporting.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState around the wired services.
    pub fn new(
        config: SoukConfig,
        orchestrator: Arc<AgentOrchestrator>,
        catalog: Arc<DatasetCatalog>,
        inquiries: Arc<InquiryStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            catalog,
            inquiries,
            start_time: Instant::now(),
        }
    }
}
