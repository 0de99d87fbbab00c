//! Semantic dataset matcher.
//!
//! `DatasetCatalog` owns the dataset metadata, the embedding index, and
//! the embedding service. Upserting a dataset re-renders its canonical
//! text and re-embeds it; searching embeds the query with the same
//! service, over-fetches candidates, applies structured filters, and
//! returns a deterministically ordered page.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use souk_core::error::SoukError;
use souk_core::types::{Dataset, DatasetSummary, PricingModel, Visibility};

use crate::embedding::{DynEmbeddingService, EmbeddingService};
use crate::index::EmbeddingIndex;

/// Structured filters applied to a semantic search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Case-insensitive exact domain match.
    pub domain: Option<String>,
    pub pricing: Option<PricingModel>,
    pub visibility: Option<Visibility>,
}

/// A semantic search request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Desired result count; `None` uses the catalog default.
    pub top_k: Option<usize>,
    #[serde(default)]
    pub filters: SearchFilters,
    /// When set, private datasets owned by this vendor are visible.
    pub caller_vendor: Option<Uuid>,
}

impl SearchRequest {
    /// A plain query with default paging and no filters.
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            query: text.into(),
            top_k: None,
            filters: SearchFilters::default(),
            caller_vendor: None,
        }
    }
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMatch {
    #[serde(flatten)]
    pub dataset: DatasetSummary,
    /// Cosine similarity in [-1, 1].
    pub score: f64,
}

/// The semantic dataset catalog.
///
/// Metadata and vectors are kept in step: every upsert re-embeds the
/// canonical rendering, and a failed embedding stores a null marker so
/// the dataset drops out of semantic results (but stays retrievable by
/// id) instead of surfacing with a fabricated score.
pub struct DatasetCatalog {
    datasets: RwLock<HashMap<Uuid, Dataset>>,
    index: EmbeddingIndex,
    embedder: Box<dyn DynEmbeddingService>,
    default_top_k: usize,
    candidate_factor: usize,
}

impl DatasetCatalog {
    /// Create a catalog around an embedding service.
    ///
    /// The index is sized from the service, so the indexing and query
    /// sides can never disagree on dimensionality.
    pub fn new(embedder: impl EmbeddingService + 'static) -> Self {
        Self::new_dyn(Box::new(embedder))
    }

    /// Create a catalog from a pre-boxed dynamic embedding service.
    pub fn new_dyn(embedder: Box<dyn DynEmbeddingService>) -> Self {
        let dims = embedder.dimensions();
        Self {
            datasets: RwLock::new(HashMap::new()),
            index: EmbeddingIndex::new(dims),
            embedder,
            default_top_k: 5,
            candidate_factor: 4,
        }
    }

    /// Override the default result count and over-fetch factor.
    pub fn with_search_settings(mut self, default_top_k: usize, candidate_factor: usize) -> Self {
        self.default_top_k = default_top_k.max(1);
        self.candidate_factor = candidate_factor.max(1);
        self
    }

    /// Insert or update a dataset, regenerating its embedding.
    ///
    /// Embedding failure is not fatal: the dataset is stored with a null
    /// marker, excluded from semantic search, and a warning is logged.
    pub async fn upsert(&self, dataset: Dataset) -> Result<(), SoukError> {
        let text = dataset.canonical_text();
        let id = dataset.id;

        let vector = match self.embedder.embed_boxed(&text).await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(dataset = %id, error = %e, "Embedding unavailable; dataset excluded from semantic search");
                None
            }
        };
        self.index.upsert(id, vector)?;

        let mut datasets = self
            .datasets
            .write()
            .map_err(|e| SoukError::Catalog(format!("lock poisoned: {}", e)))?;
        datasets.insert(id, dataset);
        Ok(())
    }

    /// Exact lookup by id, independent of embedding presence.
    pub fn get(&self, id: Uuid) -> Option<Dataset> {
        self.datasets.read().ok().and_then(|d| d.get(&id).cloned())
    }

    /// Remove a dataset and its vector.
    pub fn remove(&self, id: Uuid) -> Result<(), SoukError> {
        self.index.remove(id)?;
        let mut datasets = self
            .datasets
            .write()
            .map_err(|e| SoukError::Catalog(format!("lock poisoned: {}", e)))?;
        datasets.remove(&id);
        Ok(())
    }

    /// Number of datasets in the catalog.
    pub fn len(&self) -> usize {
        self.datasets.read().map(|d| d.len()).unwrap_or(0)
    }

    /// True if the catalog holds no datasets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Semantic search with structured filters.
    ///
    /// Ordering is fully deterministic: descending score, then most
    /// recently updated, then ascending id. An empty result list is a
    /// normal outcome, not an error.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<DatasetMatch>, SoukError> {
        let top_k = request.top_k.unwrap_or(self.default_top_k);
        if top_k == 0 || request.query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_boxed(&request.query).await?;

        // Over-fetch to compensate for entries the filters drop.
        let fetch = top_k.saturating_mul(self.candidate_factor).max(top_k);
        let hits = self.index.query(&query_vec, fetch)?;
        debug!(candidates = hits.len(), top_k, "Semantic search candidates");

        let datasets = self
            .datasets
            .read()
            .map_err(|e| SoukError::Catalog(format!("lock poisoned: {}", e)))?;

        let mut matches: Vec<DatasetMatch> = hits
            .into_iter()
            .filter_map(|hit| {
                let ds = datasets.get(&hit.id)?;
                if !passes_filters(ds, &request.filters, request.caller_vendor) {
                    return None;
                }
                Some(DatasetMatch {
                    dataset: ds.summary(),
                    score: hit.score,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.dataset.updated_at.cmp(&a.dataset.updated_at))
                .then_with(|| a.dataset.id.cmp(&b.dataset.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}

/// Apply structured filters, including the visibility rule: private
/// datasets are visible only to their owning vendor.
fn passes_filters(ds: &Dataset, filters: &SearchFilters, caller_vendor: Option<Uuid>) -> bool {
    if ds.visibility == Visibility::Private && caller_vendor != Some(ds.vendor_id) {
        return false;
    }
    if let Some(ref wanted) = filters.visibility {
        if ds.visibility != *wanted {
            return false;
        }
    }
    if let Some(ref domain) = filters.domain {
        if !ds.domain.eq_ignore_ascii_case(domain) {
            return false;
        }
    }
    if let Some(pricing) = filters.pricing {
        if ds.pricing != pricing {
            return false;
        }
    }
    true
}
