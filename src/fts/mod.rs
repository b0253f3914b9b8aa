//! Full-text search index abstraction (spec.md §4.6): an in-memory TF-IDF
//! backend for small codebases and a disk-backed BM25 (`tantivy`) backend
//! for large ones, selected by a factory function behind a common trait so
//! the rest of the crate never needs to know which one is active.

pub mod bm25;
pub mod tfidf;

use std::path::Path;

use crate::config::{FtsConfig, FtsPreference};
use crate::error::Result;

/// One document handed to an FTS backend for indexing.
#[derive(Debug, Clone)]
pub struct FtsDoc {
    pub chunk_id: String,
    pub path: String,
    pub content: String,
    /// Joined tag/name/breadcrumb text, boosted relative to `content`.
    pub heading: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FtsHit {
    pub chunk_id: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct FtsStats {
    pub document_count: u64,
    pub backend: &'static str,
}

pub trait FtsBackend: Send + Sync {
    fn add_chunks(&self, path: &str, docs: &[FtsDoc]) -> Result<()>;

    fn add_chunk(&self, doc: &FtsDoc) -> Result<()> {
        self.add_chunks(&doc.path, std::slice::from_ref(doc))
    }

    fn remove_by_path(&self, path: &str) -> Result<()>;

    fn search(&self, query: &str, limit: usize) -> Result<Vec<FtsHit>>;

    fn stats(&self) -> Result<FtsStats>;

    fn has_data(&self) -> Result<bool> {
        Ok(self.stats()?.document_count > 0)
    }

    /// Serialize the backend's full on-disk/in-memory state for persistence
    /// between process runs (BM25 commits to its own directory and returns
    /// an empty marker; TF-IDF returns its JSON snapshot).
    fn serialize(&self) -> Result<Vec<u8>>;

    fn clear(&self) -> Result<()>;

    fn close(&self) -> Result<()>;
}

/// Normalize raw backend scores to `[0, 1]` via min-max, in place. A
/// single-hit or all-equal-score list normalizes to `1.0` for every hit
/// rather than dividing by zero.
pub fn normalize_scores(hits: &mut [FtsHit]) {
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

/// Choose a backend per spec.md §4.6: `Js`/in-memory TF-IDF for small
/// codebases (below `file_count_threshold`), disk-backed BM25 for large
/// ones, `Auto` deciding by `file_count`. An explicit `Native` preference
/// always selects BM25 regardless of size.
pub fn open(config: &FtsConfig, index_dir: &Path, file_count: usize) -> Result<Box<dyn FtsBackend>> {
    let use_bm25 = match config.preference {
        FtsPreference::Native => true,
        FtsPreference::Js => false,
        FtsPreference::Auto => file_count >= config.file_count_threshold,
    };

    if use_bm25 {
        Ok(Box::new(bm25::Bm25Index::open_or_create(index_dir)?))
    } else {
        Ok(Box::new(tfidf::TfIdfIndex::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_empty_and_single() {
        let mut empty: Vec<FtsHit> = Vec::new();
        normalize_scores(&mut empty);
        assert!(empty.is_empty());

        let mut single = vec![FtsHit { chunk_id: "a".into(), score: 5.0 }];
        normalize_scores(&mut single);
        assert_eq!(single[0].score, 1.0);
    }

    #[test]
    fn normalize_spreads_across_zero_to_one() {
        let mut hits = vec![
            FtsHit { chunk_id: "a".into(), score: 1.0 },
            FtsHit { chunk_id: "b".into(), score: 3.0 },
            FtsHit { chunk_id: "c".into(), score: 5.0 },
        ];
        normalize_scores(&mut hits);
        assert_eq!(hits[0].score, 0.0);
        assert_eq!(hits[2].score, 1.0);
        assert!((hits[1].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn factory_picks_tfidf_below_threshold_and_bm25_above() {
        let mut cfg = FtsConfig { preference: FtsPreference::Auto, file_count_threshold: 100, rrf_k: 60.0 };
        let dir = tempfile::tempdir().unwrap();
        let small = open(&cfg, dir.path(), 10).unwrap();
        assert_eq!(small.stats().unwrap().backend, "tfidf");

        cfg.file_count_threshold = 5;
        let large = open(&cfg, dir.path(), 10).unwrap();
        assert_eq!(large.stats().unwrap().backend, "bm25");
    }
}
