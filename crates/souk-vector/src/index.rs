//! Embedding index with exact cosine-similarity queries.
//!
//! Entries are L2-normalized at insert time so a query reduces to a dot
//! product. Datasets whose embedding generation failed are stored as null
//! markers and excluded from query results entirely, never scored as
//! zero-similarity matches.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use souk_core::error::SoukError;

/// A single hit returned from an index query.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    /// Id of the matching entry.
    pub id: Uuid,
    /// Cosine similarity in [-1, 1].
    pub score: f64,
}

/// One slot in the index: either a normalized vector or a null marker
/// recording that embedding generation failed for this id.
#[derive(Debug, Clone)]
enum Slot {
    Vector(Arc<Vec<f32>>),
    Missing,
}

/// Thread-safe embedding index over fixed-dimension vectors.
///
/// `query` holds a read lock and never mutates; `upsert` replaces the
/// whole slot under a write lock, so concurrent writers are last-write-
/// wins and a reader never observes a half-written vector.
#[derive(Debug)]
pub struct EmbeddingIndex {
    dimensions: usize,
    slots: RwLock<HashMap<Uuid, Slot>>,
}

impl EmbeddingIndex {
    /// Create an empty index for vectors of the given dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// The dimensionality this index accepts.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Insert or replace the vector for `id`.
    ///
    /// `None` (or a vector with zero norm, the degenerate fallback some
    /// backends produce) stores a null marker: the id stays known but is
    /// excluded from queries. A vector of the wrong length is rejected;
    /// that is a configuration fault, not a condition to tolerate.
    pub fn upsert(&self, id: Uuid, vector: Option<Vec<f32>>) -> Result<(), SoukError> {
        let slot = match vector {
            Some(v) => {
                if v.len() != self.dimensions {
                    return Err(SoukError::Index(format!(
                        "vector for {} has {} dimensions, index requires {}",
                        id,
                        v.len(),
                        self.dimensions
                    )));
                }
                match normalize(&v) {
                    Some(unit) => Slot::Vector(Arc::new(unit)),
                    None => Slot::Missing,
                }
            }
            None => Slot::Missing,
        };

        let mut slots = self
            .slots
            .write()
            .map_err(|e| SoukError::Index(format!("lock poisoned: {}", e)))?;
        slots.insert(id, slot);
        Ok(())
    }

    /// Return up to `k` nearest entries by cosine similarity.
    ///
    /// Results are ordered by descending score; equal scores are broken by
    /// ascending id so identical inputs always produce identical output.
    /// Null-marked entries never appear.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<IndexHit>, SoukError> {
        if vector.len() != self.dimensions {
            return Err(SoukError::Index(format!(
                "query vector has {} dimensions, index requires {}",
                vector.len(),
                self.dimensions
            )));
        }
        let Some(unit_query) = normalize(vector) else {
            // A zero-norm query matches nothing meaningfully.
            return Ok(Vec::new());
        };

        let slots = self
            .slots
            .read()
            .map_err(|e| SoukError::Index(format!("lock poisoned: {}", e)))?;

        let mut hits: Vec<IndexHit> = slots
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Vector(v) => Some(IndexHit {
                    id: *id,
                    score: dot(&unit_query, v),
                }),
                Slot::Missing => None,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Remove an entry entirely. Removing an unknown id is not an error.
    pub fn remove(&self, id: Uuid) -> Result<(), SoukError> {
        let mut slots = self
            .slots
            .write()
            .map_err(|e| SoukError::Index(format!("lock poisoned: {}", e)))?;
        slots.remove(&id);
        Ok(())
    }

    /// True if the id is present with a usable vector (not a null marker).
    pub fn has_vector(&self, id: Uuid) -> bool {
        self.slots
            .read()
            .map(|s| matches!(s.get(&id), Some(Slot::Vector(_))))
            .unwrap_or(false)
    }

    /// Number of entries, null markers included.
    pub fn len(&self) -> usize {
        self.slots.read().map(|s| s.len()).unwrap_or(0)
    }

    /// True if the index holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// L2-normalize a vector into an owned unit vector.
///
/// Returns `None` for a zero-norm input.
fn normalize(v: &[f32]) -> Option<Vec<f32>> {
    let norm: f64 = v.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return None;
    }
    Some(v.iter().map(|x| (*x as f64 / norm) as f32).collect())
}

/// Dot product of two equal-length vectors in f64.
fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: usize = 8;

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMS];
        v[i] = 1.0;
        v
    }

    #[test]
    fn test_upsert_and_query() {
        let index = EmbeddingIndex::new(DIMS);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        index.upsert(a, Some(axis(0))).unwrap();
        index.upsert(b, Some(axis(1))).unwrap();

        let hits = index.query(&axis(0), 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, a);
        assert!((hits[0].score - 1.0).abs() < 1e-9);
        assert!(hits[1].score.abs() < 1e-9);
    }

    #[test]
    fn test_query_respects_k() {
        let index = EmbeddingIndex::new(DIMS);
        for _ in 0..10 {
            index.upsert(Uuid::new_v4(), Some(axis(0))).unwrap();
        }
        let hits = index.query(&axis(0), 3).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_query_empty_index() {
        let index = EmbeddingIndex::new(DIMS);
        assert!(index.query(&axis(0), 5).unwrap().is_empty());
    }

    #[test]
    fn test_null_marker_excluded_from_results() {
        let index = EmbeddingIndex::new(DIMS);
        let present = Uuid::new_v4();
        let missing = Uuid::new_v4();

        index.upsert(present, Some(axis(0))).unwrap();
        index.upsert(missing, None).unwrap();

        assert_eq!(index.len(), 2);
        let hits = index.query(&axis(0), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, present);
    }

    #[test]
    fn test_zero_vector_stored_as_null_marker() {
        let index = EmbeddingIndex::new(DIMS);
        let id = Uuid::new_v4();
        index.upsert(id, Some(vec![0.0; DIMS])).unwrap();

        // Present in the index, but never a zero-similarity match.
        assert_eq!(index.len(), 1);
        assert!(!index.has_vector(id));
        assert!(index.query(&axis(0), 10).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let index = EmbeddingIndex::new(DIMS);
        let err = index.upsert(Uuid::new_v4(), Some(vec![1.0; DIMS + 1]));
        assert!(err.is_err());
        assert!(err.unwrap_err().to_string().contains("dimensions"));

        let err = index.query(&vec![1.0; DIMS - 1], 5);
        assert!(err.is_err());
    }

    #[test]
    fn test_upsert_overwrites_and_can_demote_to_marker() {
        let index = EmbeddingIndex::new(DIMS);
        let id = Uuid::new_v4();

        index.upsert(id, Some(axis(0))).unwrap();
        assert!(index.has_vector(id));

        // A failed re-embed demotes the entry; it must vanish from results.
        index.upsert(id, None).unwrap();
        assert_eq!(index.len(), 1);
        assert!(!index.has_vector(id));
        assert!(index.query(&axis(0), 10).unwrap().is_empty());
    }

    #[test]
    fn test_ordering_descending_with_id_tie_break() {
        let index = EmbeddingIndex::new(DIMS);

        // Two entries with identical vectors tie exactly; order must be
        // ascending by id.
        let mut ids = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        for id in &ids {
            index.upsert(*id, Some(axis(0))).unwrap();
        }
        ids.sort();

        let hits = index.query(&axis(0), 10).unwrap();
        let got: Vec<Uuid> = hits.iter().map(|h| h.id).collect();
        assert_eq!(got, ids);
    }

    #[test]
    fn test_query_is_deterministic() {
        let index = EmbeddingIndex::new(DIMS);
        for i in 0..DIMS {
            index.upsert(Uuid::new_v4(), Some(axis(i))).unwrap();
        }
        let query = vec![0.5f32; DIMS];
        let first = index.query(&query, 5).unwrap();
        for _ in 0..10 {
            assert_eq!(index.query(&query, 5).unwrap(), first);
        }
    }

    #[test]
    fn test_negative_similarity_is_reported_not_clamped() {
        let index = EmbeddingIndex::new(DIMS);
        let id = Uuid::new_v4();
        let mut opposite = axis(0);
        opposite[0] = -1.0;
        index.upsert(id, Some(opposite)).unwrap();

        let hits = index.query(&axis(0), 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_norm_query_returns_empty() {
        let index = EmbeddingIndex::new(DIMS);
        index.upsert(Uuid::new_v4(), Some(axis(0))).unwrap();
        assert!(index.query(&vec![0.0; DIMS], 5).unwrap().is_empty());
    }

    #[test]
    fn test_remove() {
        let index = EmbeddingIndex::new(DIMS);
        let id = Uuid::new_v4();
        index.upsert(id, Some(axis(0))).unwrap();
        index.remove(id).unwrap();
        assert!(index.is_empty());
        // Removing again is fine.
        index.remove(id).unwrap();
    }

    #[test]
    fn test_concurrent_upsert_and_query() {
        use std::sync::Arc;
        use std::thread;

        let index = Arc::new(EmbeddingIndex::new(DIMS));
        let id = Uuid::new_v4();
        index.upsert(id, Some(axis(0))).unwrap();

        let writer = {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for i in 0..500 {
                    index.upsert(id, Some(axis(i % DIMS))).unwrap();
                }
            })
        };
        let reader = {
            let index = Arc::clone(&index);
            thread::spawn(move || {
                for _ in 0..500 {
                    let hits = index.query(&axis(0), 1).unwrap();
                    // The entry always has a fully-written unit vector, so
                    // any observed score is a valid cosine value.
                    if let Some(hit) = hits.first() {
                        assert!(hit.score >= -1.0 - 1e-9 && hit.score <= 1.0 + 1e-9);
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
    }
}
