//! Vector-store collaborator interface (spec.md §6): this crate never
//! embeds a concrete vector database. Callers hand it an implementation of
//! `VectorStore` (an in-process flat file, Qdrant, LanceDB, whatever fits
//! the deployment) and `IndexManager`/`HybridSearcher` talk to it only
//! through the trait below.
//!
//! Grounded on the teacher's `IndexStore`/`CodebaseIndex` in this same file:
//! the path-keyed upsert/remove/search shape and `cosine_similarity` helper
//! are kept, generalized from "the one JSON-backed store this crate ships"
//! into "any store a caller plugs in".

use crate::error::Result;

/// One chunk's embedding vector, ready to be upserted into a vector store.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk_id: String,
    pub path: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    pub score: f32,
}

/// A pluggable vector database collaborator. Implementations own their own
/// storage and search strategy; this crate only needs path-scoped upsert,
/// path-scoped removal, and top-k similarity search.
pub trait VectorStore: Send + Sync {
    fn upsert(&self, path: &str, records: &[VectorRecord]) -> Result<()>;

    fn remove_by_path(&self, path: &str) -> Result<()>;

    fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<VectorHit>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn clear(&self) -> Result<()>;
}

/// Cosine similarity of two vectors. Returns `0.0` on length mismatch or
/// when either vector has zero norm, rather than producing `NaN`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// A trivial in-memory `VectorStore` used by this crate's own tests and
/// available to downstream integration tests that need a store without
/// pulling in a real vector database.
#[cfg(test)]
pub struct NullVectorStore {
    records: std::sync::Mutex<Vec<VectorRecord>>,
}

#[cfg(test)]
impl NullVectorStore {
    pub fn new() -> Self {
        Self { records: std::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(test)]
impl Default for NullVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl VectorStore for NullVectorStore {
    fn upsert(&self, path: &str, records: &[VectorRecord]) -> Result<()> {
        let mut guard = self.records.lock().unwrap();
        guard.retain(|r| r.path != path);
        guard.extend(records.iter().cloned());
        Ok(())
    }

    fn remove_by_path(&self, path: &str) -> Result<()> {
        let mut guard = self.records.lock().unwrap();
        guard.retain(|r| r.path != path);
        Ok(())
    }

    fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        let guard = self.records.lock().unwrap();
        let mut hits: Vec<VectorHit> = guard
            .iter()
            .map(|r| VectorHit { chunk_id: r.chunk_id.clone(), score: cosine_similarity(query_vector, &r.vector) })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.records.lock().unwrap().len())
    }

    fn clear(&self) -> Result<()> {
        self.records.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, path: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord { chunk_id: id.to_string(), path: path.to_string(), vector }
    }

    #[test]
    fn cosine_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn cosine_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn null_store_upsert_replaces_by_path() {
        let store = NullVectorStore::new();
        store.upsert("a.rs", &[record("a.rs#0", "a.rs", vec![1.0, 0.0])]).unwrap();
        store.upsert("a.rs", &[record("a.rs#1", "a.rs", vec![0.0, 1.0])]).unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn null_store_search_ranks_by_cosine() {
        let store = NullVectorStore::new();
        store.upsert("a.rs", &[record("a.rs#0", "a.rs", vec![1.0, 0.0])]).unwrap();
        store.upsert("b.rs", &[record("b.rs#0", "b.rs", vec![0.0, 1.0])]).unwrap();

        let hits = store.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits[0].chunk_id, "a.rs#0");
        assert_eq!(hits[1].chunk_id, "b.rs#0");
    }
}
