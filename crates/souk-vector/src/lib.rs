//! Souk Vector crate - embedding services, the embedding index, and the
//! semantic dataset matcher.
//!
//! Provides the cosine-similarity index with null-marker exclusion for
//! datasets whose embedding generation failed, an embedding service trait
//! with ONNX and deterministic hashing implementations, and the catalog
//! that ranks datasets against free-text queries with structured filters.

pub mod embedding;
pub mod index;
pub mod matcher;

pub use embedding::{DynEmbeddingService, EmbeddingService, HashEmbedder, OnnxEmbedder};
pub use index::{EmbeddingIndex, IndexHit};
pub use matcher::{DatasetCatalog, DatasetMatch, SearchFilters, SearchRequest};
