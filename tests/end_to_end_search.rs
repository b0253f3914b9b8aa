//! End-to-end smoke test: scan -> chunk -> index into FTS -> expand/detect
//! -> hybrid search (FTS mode) -> rank, using only collaborators that need
//! no network access (the embedder's ONNX model download is the one thing
//! this test deliberately avoids exercising; `vector_store.rs`'s own unit
//! tests and `index_manager.rs`'s cover the embedding path on empty input).
//!
//! Grounded on the teacher's own `tests/mcp_stdio_smoke.rs` shape (spin up
//! a small temp project, drive the crate, assert on the shape of the
//! result) and on `index_manager.rs`'s unit tests for using
//! `tempfile` + `NullVectorStore`/`TfIdfIndex` as network-free collaborators.

use std::collections::HashMap;

use codesearch_core::chunk::Chunk;
use codesearch_core::chunker;
use codesearch_core::config::{Config, HybridConfig, SearchMode};
use codesearch_core::fts::tfidf::TfIdfIndex;
use codesearch_core::fts::{FtsBackend, FtsDoc};
use codesearch_core::hybrid_search::HybridSearcher;
use codesearch_core::query_expander;
use codesearch_core::query_intent;
use codesearch_core::ranker::{AdvancedRanker, RankCandidate};
use codesearch_core::vector_store::{VectorHit, VectorRecord, VectorStore};

/// `NullVectorStore` lives behind `#[cfg(test)]` in the library itself, so
/// it isn't visible from an external integration test binary; this is the
/// same "always empty" stand-in, local to this test.
struct EmptyVectorStore;

impl VectorStore for EmptyVectorStore {
    fn upsert(&self, _path: &str, _records: &[VectorRecord]) -> codesearch_core::error::Result<()> {
        Ok(())
    }
    fn remove_by_path(&self, _path: &str) -> codesearch_core::error::Result<()> {
        Ok(())
    }
    fn search(&self, _query_vector: &[f32], _limit: usize) -> codesearch_core::error::Result<Vec<VectorHit>> {
        Ok(Vec::new())
    }
    fn len(&self) -> codesearch_core::error::Result<usize> {
        Ok(0)
    }
    fn clear(&self) -> codesearch_core::error::Result<()> {
        Ok(())
    }
}

const AUTH_SOURCE: &str = r#"
/// Handles authentication for incoming requests.
pub struct AuthHandler {
    secret: String,
}

impl AuthHandler {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    /// Verify a bearer token, returning an error on mismatch.
    pub fn verify(&self, token: &str) -> Result<(), String> {
        if token == self.secret {
            Ok(())
        } else {
            Err("auth error: token mismatch".to_string())
        }
    }
}
"#;

const UTIL_SOURCE: &str = r#"
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}
"#;

#[test]
fn end_to_end_fts_search_ranks_the_matching_chunk_first() {
    let config = Config::default();

    // chunk + index two files, bypassing the embedder entirely.
    let fts = TfIdfIndex::new();
    let mut chunks_by_id: HashMap<String, Chunk> = HashMap::new();

    for (rel_path, source) in [("src/auth/handler.rs", AUTH_SOURCE), ("src/util.rs", UTIL_SOURCE)] {
        let hash = format!("hash-{rel_path}");
        let chunks = chunker::chunk_text(rel_path, source, &hash, &config.chunker).expect("chunking should succeed");
        assert!(!chunks.is_empty(), "{rel_path} should produce at least one chunk");

        let docs: Vec<FtsDoc> = chunks
            .iter()
            .map(|c| {
                let heading = c.metadata.as_ref().map(|m| m.name.clone().unwrap_or_default()).unwrap_or_default();
                FtsDoc { chunk_id: c.id.to_string(), path: rel_path.to_string(), content: c.text.clone(), heading }
            })
            .collect();
        fts.add_chunks(rel_path, &docs).expect("fts insert should succeed");

        for c in chunks {
            chunks_by_id.insert(c.id.to_string(), c);
        }
    }

    let stats = fts.stats().expect("stats should succeed");
    assert!(stats.document_count > 0, "fts index should have ingested documents");

    // query expansion + intent detection run ahead of the search itself.
    let raw_query = "auth error handler";
    let expanded = query_expander::expand(raw_query, &config.query_expander);
    assert!(expanded.contains("auth"), "expansion should retain the original token");

    let intent = query_intent::detect(raw_query, &config.query_intent);
    assert!(!intent.intents.is_empty(), "a query with 'auth'/'error' should detect at least one intent");

    let hybrid_config = HybridConfig { mode: SearchMode::Fts, alpha: config.hybrid.alpha, top_k: 10 };
    let vector_store = EmptyVectorStore;
    assert_eq!(vector_store.len().unwrap(), 0);

    let get_chunks = |ids: &[String]| -> codesearch_core::error::Result<HashMap<String, Chunk>> {
        Ok(ids.iter().filter_map(|id| chunks_by_id.get(id).cloned().map(|c| (id.clone(), c))).collect())
    };

    let outcome = HybridSearcher::search(&expanded, &[], &hybrid_config, &vector_store, Some(&fts), get_chunks)
        .expect("search should succeed");

    assert_eq!(outcome.mode_used, SearchMode::Fts);
    assert!(!outcome.hits.is_empty(), "fts search should return at least one hit");
    assert!(outcome.hits.iter().all(|h| h.chunk.is_some()), "every hit should materialize its chunk");

    // descending score order, per spec's ranked[i] >= ranked[i+1] invariant.
    for pair in outcome.hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }

    let candidates: Vec<RankCandidate> = outcome
        .hits
        .iter()
        .map(|h| RankCandidate {
            chunk_id: h.chunk_id.clone(),
            path: h.chunk.as_ref().map(|c| c.path.clone()).unwrap_or_default(),
            base_score: h.score,
            chunk: h.chunk.as_ref(),
        })
        .collect();

    let ranked = AdvancedRanker::rank(raw_query, &intent, candidates, &config.ranker);
    assert!(!ranked.is_empty());
    for pair in ranked.windows(2) {
        assert!(pair[0].final_score >= pair[1].final_score, "ranker output must be sorted descending");
    }

    let top = &ranked[0];
    assert_eq!(top.path, "src/auth/handler.rs", "the auth-related query should rank the auth file's chunk first");
}

#[test]
fn fts_search_without_a_backend_falls_back_cleanly() {
    let config = Config::default();
    let vector_store = EmptyVectorStore;
    let hybrid_config = HybridConfig { mode: SearchMode::Fts, alpha: config.hybrid.alpha, top_k: 5 };

    let get_chunks = |_ids: &[String]| -> codesearch_core::error::Result<HashMap<String, Chunk>> { Ok(HashMap::new()) };

    let outcome = HybridSearcher::search("anything", &[], &hybrid_config, &vector_store, None, get_chunks)
        .expect("search should succeed even with no fts backend");

    assert!(outcome.hits.is_empty());
}
