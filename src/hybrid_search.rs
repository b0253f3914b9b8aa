//! Fuses vector and keyword search via Reciprocal Rank Fusion (spec.md
//! §4.9). `HybridSearcher` never owns a store itself — it's handed a
//! vector-search callback, an optional FTS backend, and a chunk-lookup
//! callback, exactly the "vectorSearch(vector, k)" / "getChunksById(ids)"
//! collaborator shape the spec describes.
//!
//! Grounded on `context-finder`'s `HybridSearch::search` (expand -> run
//! semantic + keyword search -> fuse -> rerank -> normalize -> sort ->
//! truncate stage order, and its `normalize_scores` min-max helper with an
//! all-equal-scores special case) and on the teacher's `search()` in
//! `vector_store.rs` for the "tag the result with how it was produced"
//! idea, generalized from an implicit two-stage score into an explicit
//! `SearchMode` tag on the result set.

use std::collections::HashMap;

use tracing::warn;

use crate::chunk::Chunk;
use crate::config::{HybridConfig, SearchMode};
use crate::error::Result;
use crate::fts::{normalize_scores as normalize_fts_scores, FtsBackend};
use crate::vector_store::{VectorHit, VectorStore};

/// One fused, ranked result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub chunk_id: String,
    pub score: f32,
    pub chunk: Option<Chunk>,
}

/// The full output of a hybrid search call: ranked hits tagged with which
/// mode actually produced them (may differ from the requested mode, e.g. a
/// `hybrid` request that fell back to vector-only).
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub mode_used: SearchMode,
}

fn min_max_normalize_vector_hits(hits: &mut [VectorHit]) {
    if hits.is_empty() {
        return;
    }
    let max = hits.iter().map(|h| h.score).fold(f32::MIN, f32::max);
    let min = hits.iter().map(|h| h.score).fold(f32::MAX, f32::min);
    let spread = max - min;
    for h in hits.iter_mut() {
        h.score = if spread > f32::EPSILON { (h.score - min) / spread } else { 1.0 };
    }
}

fn materialize<F>(ids: &[String], get_chunks: &F) -> Result<HashMap<String, Chunk>>
where
    F: Fn(&[String]) -> Result<HashMap<String, Chunk>>,
{
    get_chunks(ids)
}

pub struct HybridSearcher;

impl HybridSearcher {
    /// `vector_search` and `fts` play the role of spec.md's `vectorSearch`
    /// callback (any `VectorStore` already has the right shape); `get_chunks`
    /// plays `getChunksById`, materializing full chunk data for the ids a
    /// ranking surfaces so `AdvancedRanker` has metadata to score against.
    pub fn search<F>(
        query: &str,
        query_vector: &[f32],
        config: &HybridConfig,
        vector_store: &dyn VectorStore,
        fts: Option<&dyn FtsBackend>,
        get_chunks: F,
    ) -> Result<SearchOutcome>
    where
        F: Fn(&[String]) -> Result<HashMap<String, Chunk>>,
    {
        match config.mode {
            SearchMode::Vector => Self::vector_only(query_vector, config.top_k, vector_store, &get_chunks),
            SearchMode::Fts => Self::fts_only(query, config.top_k, fts, &get_chunks),
            SearchMode::Hybrid => Self::hybrid(query, query_vector, config, vector_store, fts, &get_chunks),
        }
    }

    fn vector_only<F>(query_vector: &[f32], top_k: usize, vector_store: &dyn VectorStore, get_chunks: &F) -> Result<SearchOutcome>
    where
        F: Fn(&[String]) -> Result<HashMap<String, Chunk>>,
    {
        let hits = vector_store.search(query_vector, top_k)?;
        let ids: Vec<String> = hits.iter().map(|h| h.chunk_id.clone()).collect();
        let mut chunks = materialize(&ids, get_chunks)?;
        let hits = hits
            .into_iter()
            .map(|h| SearchHit { chunk: chunks.remove(&h.chunk_id), chunk_id: h.chunk_id, score: h.score })
            .collect();
        Ok(SearchOutcome { hits, mode_used: SearchMode::Vector })
    }

    fn fts_only<F>(query: &str, top_k: usize, fts: Option<&dyn FtsBackend>, get_chunks: &F) -> Result<SearchOutcome>
    where
        F: Fn(&[String]) -> Result<HashMap<String, Chunk>>,
    {
        let Some(fts) = fts else {
            warn!("fts-only search requested but no FTS backend is available; returning no results");
            return Ok(SearchOutcome { hits: Vec::new(), mode_used: SearchMode::Fts });
        };

        let mut raw = fts.search(query, top_k)?;
        normalize_fts_scores(&mut raw);
        let ids: Vec<String> = raw.iter().map(|h| h.chunk_id.clone()).collect();
        let mut chunks = materialize(&ids, get_chunks)?;
        let hits = raw
            .into_iter()
            .map(|h| SearchHit { chunk: chunks.remove(&h.chunk_id), chunk_id: h.chunk_id, score: h.score })
            .collect();
        Ok(SearchOutcome { hits, mode_used: SearchMode::Fts })
    }

    fn hybrid<F>(
        query: &str,
        query_vector: &[f32],
        config: &HybridConfig,
        vector_store: &dyn VectorStore,
        fts: Option<&dyn FtsBackend>,
        get_chunks: &F,
    ) -> Result<SearchOutcome>
    where
        F: Fn(&[String]) -> Result<HashMap<String, Chunk>>,
    {
        let Some(fts) = fts else {
            warn!("hybrid search requested but no FTS backend is available; falling back to vector-only");
            return Self::vector_only(query_vector, config.top_k, vector_store, get_chunks);
        };

        let expanded_k = (2 * config.top_k).min(100).max(1);

        let mut vec_hits = vector_store.search(query_vector, expanded_k)?;
        min_max_normalize_vector_hits(&mut vec_hits);
        let mut fts_hits = fts.search(query, expanded_k)?;
        normalize_fts_scores(&mut fts_hits);

        let vec_rank: HashMap<&str, usize> = vec_hits.iter().enumerate().map(|(i, h)| (h.chunk_id.as_str(), i + 1)).collect();
        let fts_rank: HashMap<&str, usize> = fts_hits.iter().enumerate().map(|(i, h)| (h.chunk_id.as_str(), i + 1)).collect();

        let k_rrf = 60.0_f64;
        let alpha = config.alpha.clamp(0.0, 1.0);

        let mut ids: Vec<String> = vec_hits.iter().map(|h| h.chunk_id.clone()).collect();
        for h in &fts_hits {
            if !vec_rank.contains_key(h.chunk_id.as_str()) {
                ids.push(h.chunk_id.clone());
            }
        }

        let mut fused: Vec<(String, f32)> = ids
            .into_iter()
            .map(|id| {
                let vec_contrib = vec_rank.get(id.as_str()).map(|&rank| alpha * (1.0 / (k_rrf + rank as f64))).unwrap_or(0.0);
                let fts_contrib =
                    fts_rank.get(id.as_str()).map(|&rank| (1.0 - alpha) * (1.0 / (k_rrf + rank as f64))).unwrap_or(0.0);
                (id, (vec_contrib + fts_contrib) as f32)
            })
            .collect();

        fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        fused.truncate(config.top_k);

        // Min-max normalize the fused scores to [0, 1].
        if let (Some(max), Some(min)) =
            (fused.iter().map(|(_, s)| *s).fold(None, |acc: Option<f32>, s| Some(acc.map_or(s, |a| a.max(s)))),
             fused.iter().map(|(_, s)| *s).fold(None, |acc: Option<f32>, s| Some(acc.map_or(s, |a| a.min(s)))))
        {
            let spread = max - min;
            for (_, score) in fused.iter_mut() {
                *score = if spread > f32::EPSILON { (*score - min) / spread } else { 1.0 };
            }
        }

        let ids: Vec<String> = fused.iter().map(|(id, _)| id.clone()).collect();
        let mut chunks = materialize(&ids, get_chunks)?;
        let hits = fused
            .into_iter()
            .map(|(id, score)| SearchHit { chunk: chunks.remove(&id), chunk_id: id, score })
            .collect();

        Ok(SearchOutcome { hits, mode_used: SearchMode::Hybrid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fts::tfidf::TfIdfIndex;
    use crate::fts::FtsDoc;
    use crate::vector_store::{NullVectorStore, VectorRecord};

    fn no_chunks(_ids: &[String]) -> Result<HashMap<String, Chunk>> {
        Ok(HashMap::new())
    }

    fn config(mode: SearchMode) -> HybridConfig {
        HybridConfig { mode, alpha: 0.5, top_k: 10 }
    }

    #[test]
    fn vector_mode_returns_vector_store_order_unchanged() {
        let store = NullVectorStore::new();
        store.upsert("a.rs", &[VectorRecord { chunk_id: "a#0".into(), path: "a.rs".into(), vector: vec![1.0, 0.0] }]).unwrap();
        store.upsert("b.rs", &[VectorRecord { chunk_id: "b#0".into(), path: "b.rs".into(), vector: vec![0.0, 1.0] }]).unwrap();

        let outcome = HybridSearcher::search(
            "query",
            &[1.0, 0.0],
            &config(SearchMode::Vector),
            &store,
            None,
            no_chunks,
        )
        .unwrap();

        assert_eq!(outcome.mode_used, SearchMode::Vector);
        assert_eq!(outcome.hits[0].chunk_id, "a#0");
    }

    #[test]
    fn fts_mode_without_backend_yields_no_hits() {
        let store = NullVectorStore::new();
        let outcome =
            HybridSearcher::search("query", &[], &config(SearchMode::Fts), &store, None, no_chunks).unwrap();
        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.mode_used, SearchMode::Fts);
    }

    #[test]
    fn hybrid_mode_falls_back_to_vector_when_fts_missing() {
        let store = NullVectorStore::new();
        store.upsert("a.rs", &[VectorRecord { chunk_id: "a#0".into(), path: "a.rs".into(), vector: vec![1.0, 0.0] }]).unwrap();

        let outcome =
            HybridSearcher::search("query", &[1.0, 0.0], &config(SearchMode::Hybrid), &store, None, no_chunks).unwrap();
        assert_eq!(outcome.mode_used, SearchMode::Vector);
    }

    #[test]
    fn hybrid_mode_fuses_both_rankings() {
        let store = NullVectorStore::new();
        store.upsert("a.rs", &[VectorRecord { chunk_id: "a#0".into(), path: "a.rs".into(), vector: vec![1.0, 0.0] }]).unwrap();
        store.upsert("b.rs", &[VectorRecord { chunk_id: "b#0".into(), path: "b.rs".into(), vector: vec![0.9, 0.1] }]).unwrap();

        let fts = TfIdfIndex::new();
        fts.add_chunks("b.rs", &[FtsDoc { chunk_id: "b#0".into(), path: "b.rs".into(), content: "authenticate user session".into(), heading: String::new() }])
            .unwrap();

        let outcome = HybridSearcher::search(
            "authenticate",
            &[1.0, 0.0],
            &config(SearchMode::Hybrid),
            &store,
            Some(&fts),
            no_chunks,
        )
        .unwrap();

        assert_eq!(outcome.mode_used, SearchMode::Hybrid);
        // b#0 ranks in both the vector and FTS rankings, so it must fuse to
        // a non-zero score and appear in the result set.
        assert!(outcome.hits.iter().any(|h| h.chunk_id == "b#0"));
    }

    #[test]
    fn empty_vector_store_yields_no_hits() {
        let store = NullVectorStore::new();
        let outcome =
            HybridSearcher::search("query", &[1.0, 0.0], &config(SearchMode::Vector), &store, None, no_chunks).unwrap();
        assert!(outcome.hits.is_empty());
    }
}
