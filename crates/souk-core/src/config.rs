use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SoukError};

/// Top-level configuration for the Souk application.
///
/// Loaded from `~/.souk/config.toml` by default. Each section corresponds
/// to one concern; unknown keys are ignored so older configs keep loading.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoukConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl SoukConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SoukConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not
    /// exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SoukError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.souk".to_string(),
            log_level: "info".to_string(),
            port: 4040,
        }
    }
}

/// Embedding backend settings.
///
/// The configured dimensionality is the single source of truth: both the
/// index and the embedder are constructed against it, and a backend that
/// produces vectors of a different length is rejected at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Vector dimensionality shared by index and embedder.
    pub dimensions: usize,
    /// Directory containing `model.onnx` and `tokenizer.json`. When unset
    /// the deterministic hashing embedder is used instead.
    pub model_dir: Option<String>,
    /// Timeout for a single embedding call, in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: 384,
            model_dir: None,
            timeout_secs: 10,
        }
    }
}

/// Semantic search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Result count when the caller does not specify one.
    pub default_top_k: usize,
    /// Hard cap on requested result counts.
    pub max_top_k: usize,
    /// Over-fetch multiplier applied before filtering.
    pub candidate_factor: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 50,
            candidate_factor: 4,
        }
    }
}

/// Conversational agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum interpret/execute rounds per turn before the agent is
    /// forced to respond with partial results.
    pub max_tool_rounds: usize,
    /// Timeout for a single language-model call, in seconds.
    pub model_timeout_secs: u64,
    /// Timeout for a single tool execution, in seconds.
    pub tool_timeout_secs: u64,
    /// Maximum user message length in characters.
    pub max_message_length: usize,
    /// How many recent dataset/inquiry references to carry across turns.
    pub context_entities: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 4,
            model_timeout_secs: 60,
            tool_timeout_secs: 20,
            max_message_length: 4000,
            context_entities: 8,
        }
    }
}
