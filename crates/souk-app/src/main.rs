//! Souk server binary - composition root.
//!
//! Ties the crates together into one executable:
//! 1. Parse CLI args and load TOML configuration
//! 2. Initialize tracing
//! 3. Open SQLite storage
//! 4. Build the embedding backend (ONNX model if configured, hashing
//!    fallback otherwise) and the dataset catalog
//! 5. Wire the inquiry store, dispatcher, and orchestrator
//! 6. Serve the axum API

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use souk_api::{create_router, AppState};
use souk_chat::{AgentOrchestrator, RuleModel, ToolDispatcher};
use souk_core::config::SoukConfig;
use souk_inquiry::InquiryStore;
use souk_storage::{ConversationRepository, Database};
use souk_vector::{DatasetCatalog, DynEmbeddingService, HashEmbedder, OnnxEmbedder};

use cli::CliArgs;

/// Expand ~ to the home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if let Some(rest) = data_dir.strip_prefix("~/") {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(data_dir)
    }
}

/// Select the embedding backend from configuration.
///
/// An ONNX model directory that fails to load (including a dimensionality
/// mismatch) is a fatal startup error, not something to limp past.
fn build_embedder(
    config: &SoukConfig,
) -> Result<Box<dyn DynEmbeddingService>, Box<dyn std::error::Error>> {
    match config.embedding.model_dir {
        Some(ref dir) => {
            let embedder =
                OnnxEmbedder::load(&PathBuf::from(dir), config.embedding.dimensions)?;
            tracing::info!(model_dir = %dir, "ONNX embedding backend ready");
            Ok(Box::new(embedder))
        }
        None => {
            tracing::info!(
                dimensions = config.embedding.dimensions,
                "No embedding model configured; using deterministic hashing backend"
            );
            Ok(Box::new(HashEmbedder::with_dimensions(
                config.embedding.dimensions,
            )))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first, so the CLI can override it.
    let config_file = args.resolve_config_path();
    let config = SoukConfig::load_or_default(&config_file);
    let log_level = args.resolve_log_level(&config.general.log_level);
    let port = args.resolve_port(config.general.port);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting Souk v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| resolve_data_dir(&config.general.data_dir));
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("souk.db");
    let database = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Catalog over the configured embedding backend.
    let embedder = build_embedder(&config)?;
    let catalog = Arc::new(
        DatasetCatalog::new_dyn(embedder).with_search_settings(
            config.search.default_top_k,
            config.search.candidate_factor,
        ),
    );
    tracing::info!("Dataset catalog ready");

    // Inquiry workflow and the conversational agent.
    let inquiries = Arc::new(InquiryStore::new());
    let repo = Arc::new(ConversationRepository::new(Arc::clone(&database)));
    let dispatcher = ToolDispatcher::new(Arc::clone(&catalog), Arc::clone(&inquiries));
    let orchestrator = Arc::new(AgentOrchestrator::new(
        Box::new(RuleModel::new()),
        dispatcher,
        repo,
        Arc::clone(&inquiries),
        config.chat.clone(),
    ));
    tracing::info!("Agent orchestrator ready (rule-based planner)");

    // API server.
    let state = AppState::new(config, orchestrator, catalog, inquiries);
    let router = create_router(state);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "API server listening");
    axum::serve(listener, router).await?;

    Ok(())
}
