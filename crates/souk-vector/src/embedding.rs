//! Embedding service trait and implementations.
//!
//! - `OnnxEmbedder` runs a sentence-transformer ONNX export via ort with a
//!   HuggingFace tokenizer. Construction validates the model's output
//!   width against the configured dimensionality and fails fast on a
//!   mismatch; that is a startup configuration fault, never a runtime
//!   condition to paper over.
//! - `HashEmbedder` produces deterministic bag-of-tokens vectors: texts
//!   that share vocabulary score higher under cosine, which makes
//!   relevance reproducible in tests and offline runs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::Tokenizer;
use tracing::info;

use souk_core::error::SoukError;

/// Service for converting text into fixed-dimension vectors.
///
/// The same service instance embeds both catalog entries and queries; the
/// matcher is constructed against a single service so the two sides can
/// never disagree on dimensionality.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding for the given text.
    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Vec<f32>, SoukError>> + Send;

    /// Dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService::embed` returns `impl Future`, which is not object
/// safe; this trait boxes the future so `Box<dyn DynEmbeddingService>` can
/// be stored without generics. A blanket impl covers every service.
pub trait DynEmbeddingService: Send + Sync {
    /// Generate an embedding for the given text (boxed future).
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, SoukError>> + Send + 'a>,
    >;

    /// Dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(
        &'a self,
        text: &'a str,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<f32>, SoukError>> + Send + 'a>,
    > {
        Box::pin(self.embed(text))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

// ---------------------------------------------------------------------------
// OnnxEmbedder - ONNX Runtime inference
// ---------------------------------------------------------------------------

/// ONNX-backed sentence embedder.
///
/// Expects a model directory containing `model.onnx` and `tokenizer.json`.
/// The model takes `input_ids`, `attention_mask`, and `token_type_ids` as
/// i64 tensors and produces token-level embeddings; masked mean pooling
/// plus L2 normalization yields one unit vector per input.
pub struct OnnxEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    dimensions: usize,
}

// ort::Session is internally reference-counted and safe to share.
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}

impl std::fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedder")
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl OnnxEmbedder {
    /// Load a model directory and verify it produces `expected_dims`-wide
    /// vectors. A width mismatch between the model and the configured
    /// index dimensionality is rejected here, before any data flows.
    pub fn load(model_dir: &Path, expected_dims: usize) -> Result<Self, SoukError> {
        let model_path = model_dir.join("model.onnx");
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !model_path.exists() {
            return Err(SoukError::Config(format!(
                "ONNX model not found at {}",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(SoukError::Config(format!(
                "tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| SoukError::Embedding(format!("ONNX session builder: {}", e)))?
            .with_intra_threads(1)
            .map_err(|e| SoukError::Embedding(format!("ONNX set threads: {}", e)))?
            .commit_from_file(&model_path)
            .map_err(|e| SoukError::Embedding(format!("ONNX load model: {}", e)))?;

        // Sentence-transformer output is [batch, seq_len, hidden_dim]; the
        // last axis is the embedding width.
        let model_dims = session
            .outputs()
            .first()
            .and_then(|out| out.dtype().tensor_shape())
            .and_then(|shape| shape.last().copied())
            .filter(|d| *d > 0)
            .map(|d| d as usize);

        if let Some(dims) = model_dims {
            if dims != expected_dims {
                return Err(SoukError::Config(format!(
                    "embedding model produces {}-dim vectors, configuration requires {}",
                    dims, expected_dims
                )));
            }
        }

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| SoukError::Embedding(format!("failed to load tokenizer: {}", e)))?;

        info!(
            model = %model_path.display(),
            dimensions = expected_dims,
            "Loaded ONNX embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            dimensions: expected_dims,
        })
    }

    /// Tokenize, run inference, mean-pool, and normalize.
    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, SoukError> {
        if text.trim().is_empty() {
            return Err(SoukError::Embedding("cannot embed empty text".to_string()));
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| SoukError::Embedding(format!("tokenization failed: {}", e)))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .map(|&t| t as i64)
            .collect();
        let seq_len = input_ids.len();

        let ids_array = ndarray::Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| SoukError::Embedding(format!("input_ids array: {}", e)))?;
        let mask_array = ndarray::Array2::from_shape_vec((1, seq_len), attention_mask.clone())
            .map_err(|e| SoukError::Embedding(format!("attention_mask array: {}", e)))?;
        let type_array = ndarray::Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| SoukError::Embedding(format!("token_type_ids array: {}", e)))?;

        let ids_ref = TensorRef::from_array_view(&ids_array)
            .map_err(|e| SoukError::Embedding(format!("TensorRef input_ids: {}", e)))?;
        let mask_ref = TensorRef::from_array_view(&mask_array)
            .map_err(|e| SoukError::Embedding(format!("TensorRef attention_mask: {}", e)))?;
        let type_ref = TensorRef::from_array_view(&type_array)
            .map_err(|e| SoukError::Embedding(format!("TensorRef token_type_ids: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| SoukError::Embedding(format!("session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![ids_ref, mask_ref, type_ref])
            .map_err(|e| SoukError::Embedding(format!("ONNX inference failed: {}", e)))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| SoukError::Embedding(format!("extract embeddings: {}", e)))?;
        let shape_dims: Vec<i64> = shape.iter().copied().collect();
        if shape_dims.len() < 2 {
            return Err(SoukError::Embedding(format!(
                "unexpected output shape: {:?}",
                shape_dims
            )));
        }
        let hidden_dim = *shape_dims.last().unwrap_or(&0) as usize;
        if hidden_dim != self.dimensions {
            return Err(SoukError::Config(format!(
                "embedding model produced {}-dim output, configuration requires {}",
                hidden_dim, self.dimensions
            )));
        }

        Ok(mean_pool(data, &attention_mask, hidden_dim))
    }
}

impl EmbeddingService for OnnxEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SoukError> {
        // Inference is CPU-bound; keep it off the async worker threads.
        let session = Arc::clone(&self.session);
        let tokenizer = Arc::clone(&self.tokenizer);
        let dims = self.dimensions;
        let text_owned = text.to_string();

        tokio::task::spawn_blocking(move || {
            let svc = OnnxEmbedder {
                session,
                tokenizer,
                dimensions: dims,
            };
            svc.embed_sync(&text_owned)
        })
        .await
        .map_err(|e| SoukError::Embedding(format!("embedding task panicked: {}", e)))?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Masked mean pooling over token embeddings followed by L2 normalization.
fn mean_pool(data: &[f32], attention_mask: &[i64], hidden_dim: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut count = 0.0f32;

    for (tok_idx, &mask_val) in attention_mask.iter().enumerate() {
        if mask_val > 0 {
            let offset = tok_idx * hidden_dim;
            if offset + hidden_dim > data.len() {
                break;
            }
            for dim in 0..hidden_dim {
                pooled[dim] += data[offset + dim];
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for val in &mut pooled {
            *val /= count;
        }
    }

    let norm: f32 = pooled.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut pooled {
            *val /= norm;
        }
    }
    pooled
}

// ---------------------------------------------------------------------------
// HashEmbedder - deterministic bag-of-tokens vectors
// ---------------------------------------------------------------------------

/// Deterministic feature-hashing embedder.
///
/// Each lowercased alphanumeric token hashes to a fixed pseudo-random
/// direction; the text embedding is the normalized sum of its token
/// directions. Texts sharing vocabulary therefore have higher cosine
/// similarity, which is enough for reproducible relevance ordering in
/// tests and offline deployments without a model file.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Create an embedder with the default 384-dimension width.
    pub fn new() -> Self {
        Self { dimensions: 384 }
    }

    /// Create an embedder with an explicit width.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn token_direction(&self, token: &str) -> Vec<f32> {
        let mut direction = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            i.hash(&mut hasher);
            let h = hasher.finish();
            let val = ((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0;
            direction.push(val as f32);
        }
        direction
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>, SoukError> {
        let tokens: Vec<String> = text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        if tokens.is_empty() {
            return Err(SoukError::Embedding(
                "cannot embed text with no tokens".to_string(),
            ));
        }

        let mut sum = vec![0.0f32; self.dimensions];
        for token in &tokens {
            let dir = self.token_direction(token);
            for (s, d) in sum.iter_mut().zip(dir.iter()) {
                *s += d;
            }
        }

        let norm: f32 = sum.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut sum {
                *val /= norm;
            }
        }
        Ok(sum)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingService for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SoukError> {
        self.embed_sync(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (*x as f64) * (*y as f64))
            .sum()
    }

    #[tokio::test]
    async fn test_hash_embedder_dimension() {
        let svc = HashEmbedder::new();
        let vec = svc.embed("credit risk data").await.unwrap();
        assert_eq!(vec.len(), 384);
    }

    #[tokio::test]
    async fn test_hash_embedder_deterministic() {
        let svc = HashEmbedder::new();
        let v1 = svc.embed("same text").await.unwrap();
        let v2 = svc.embed("same text").await.unwrap();
        assert_eq!(v1, v2);
    }

    #[tokio::test]
    async fn test_hash_embedder_output_is_unit_length() {
        let svc = HashEmbedder::new();
        let v = svc.embed("financial time series").await.unwrap();
        let norm: f64 = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_hash_embedder_empty_text_errors() {
        let svc = HashEmbedder::new();
        assert!(svc.embed("").await.is_err());
        assert!(svc.embed("   ...   ").await.is_err());
    }

    #[tokio::test]
    async fn test_shared_vocabulary_scores_higher() {
        let svc = HashEmbedder::new();
        let doc = svc
            .embed("credit risk modeling for consumer lending portfolios")
            .await
            .unwrap();
        let close = svc.embed("credit risk data").await.unwrap();
        let far = svc.embed("satellite imagery of glaciers").await.unwrap();

        assert!(
            cosine(&doc, &close) > cosine(&doc, &far),
            "overlapping vocabulary must rank closer"
        );
    }

    #[tokio::test]
    async fn test_tokenization_ignores_case_and_punctuation() {
        let svc = HashEmbedder::new();
        let a = svc.embed("Credit, Risk!").await.unwrap();
        let b = svc.embed("credit risk").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_custom_dimensions() {
        let svc = HashEmbedder::with_dimensions(64);
        assert_eq!(EmbeddingService::dimensions(&svc), 64);
        let v = svc.embed("anything").await.unwrap();
        assert_eq!(v.len(), 64);
    }

    #[tokio::test]
    async fn test_dyn_dispatch_blanket_impl() {
        let boxed: Box<dyn DynEmbeddingService> = Box::new(HashEmbedder::new());
        let v = boxed.embed_boxed("dynamic dispatch").await.unwrap();
        assert_eq!(v.len(), boxed.dimensions());
    }

    #[test]
    fn test_onnx_missing_model_dir() {
        let result = OnnxEmbedder::load(Path::new("/nonexistent"), 384);
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), SoukError::Config(_)));
    }

    #[test]
    fn test_mean_pool_masks_padding() {
        // Two tokens, hidden dim 2; the second token is masked out.
        let data = [1.0, 3.0, 100.0, 100.0];
        let mask = [1i64, 0i64];
        let pooled = mean_pool(&data, &mask, 2);
        // Only the first token contributes; result is its normalized value.
        let norm = (1.0f32 + 9.0).sqrt();
        assert!((pooled[0] - 1.0 / norm).abs() < 1e-6);
        assert!((pooled[1] - 3.0 / norm).abs() < 1e-6);
    }

    #[test]
    fn test_mean_pool_all_masked_is_zero() {
        let data = [1.0, 2.0];
        let mask = [0i64];
        let pooled = mean_pool(&data, &mask, 2);
        assert_eq!(pooled, vec![0.0, 0.0]);
    }
}
