//! In-memory TF-IDF index for small codebases (spec.md §4.6).
//!
//! Grounded on the teacher's `IndexStore` in `vector_store.rs`: same
//! `HashMap`-keyed-by-id, `load`/`save`-to-JSON shape, generalized from a
//! vector-chunk store into a term-frequency postings store. Deletions are
//! tombstoned rather than removed from the postings lists immediately;
//! once tombstones exceed 20% of the live document count the postings are
//! rebuilt from scratch (a denser structure is cheaper to scan than a
//! sparse one riddled with dead entries).

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fts::{FtsBackend, FtsDoc, FtsHit, FtsStats};
use crate::tokenizer;

const REBUILD_TOMBSTONE_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocEntry {
    path: String,
    term_counts: HashMap<String, usize>,
    length: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Inner {
    docs: HashMap<String, DocEntry>,
    /// term -> (chunk_id -> frequency)
    postings: HashMap<String, HashMap<String, usize>>,
    tombstones: HashSet<String>,
}

impl Inner {
    fn live_doc_count(&self) -> usize {
        self.docs.len().saturating_sub(self.tombstones.len())
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.split_whitespace().flat_map(tokenizer::normalize).collect()
    }

    fn add(&mut self, doc: &FtsDoc) {
        let combined = format!("{} {} {}", doc.content, doc.heading, doc.heading);
        let tokens = Self::tokenize(&combined);
        let mut term_counts: HashMap<String, usize> = HashMap::new();
        for t in &tokens {
            *term_counts.entry(t.clone()).or_insert(0) += 1;
        }
        for (term, count) in &term_counts {
            self.postings.entry(term.clone()).or_default().insert(doc.chunk_id.clone(), *count);
        }
        self.tombstones.remove(&doc.chunk_id);
        self.docs.insert(doc.chunk_id.clone(), DocEntry { path: doc.path.clone(), term_counts, length: tokens.len().max(1) });
    }

    fn remove_by_path(&mut self, path: &str) {
        let victims: Vec<String> = self.docs.iter().filter(|(_, e)| e.path == path).map(|(id, _)| id.clone()).collect();
        for id in victims {
            self.tombstones.insert(id);
        }
        if self.docs.len() > 0 && self.tombstones.len() as f64 / self.docs.len() as f64 > REBUILD_TOMBSTONE_RATIO {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        for id in std::mem::take(&mut self.tombstones) {
            self.docs.remove(&id);
        }
        self.postings.clear();
        let docs = self.docs.clone();
        for (id, entry) in &docs {
            for (term, count) in &entry.term_counts {
                self.postings.entry(term.clone()).or_default().insert(id.clone(), *count);
            }
        }
    }

    fn search(&self, query: &str, limit: usize) -> Vec<FtsHit> {
        let n = self.live_doc_count().max(1) as f64;
        let query_terms: Vec<String> = Self::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scores: HashMap<&str, f64> = HashMap::new();
        for term in &query_terms {
            let Some(postings) = self.postings.get(term) else { continue };
            let df = postings.iter().filter(|(id, _)| !self.tombstones.contains(*id)).count();
            if df == 0 {
                continue;
            }
            let idf = (n / df as f64).ln() + 1.0;
            for (chunk_id, freq) in postings {
                if self.tombstones.contains(chunk_id) {
                    continue;
                }
                let Some(entry) = self.docs.get(chunk_id) else { continue };
                let tf = *freq as f64 / entry.length as f64;
                *scores.entry(chunk_id.as_str()).or_insert(0.0) += tf * idf;
            }
        }

        let mut hits: Vec<FtsHit> = scores.into_iter().map(|(id, score)| FtsHit { chunk_id: id.to_string(), score: score as f32 }).collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }
}

pub struct TfIdfIndex {
    inner: RwLock<Inner>,
}

impl TfIdfIndex {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner: Inner = serde_json::from_slice(bytes)?;
        Ok(Self { inner: RwLock::new(inner) })
    }
}

impl Default for TfIdfIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl FtsBackend for TfIdfIndex {
    fn add_chunks(&self, path: &str, docs: &[FtsDoc]) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Error::Fts("tfidf index lock poisoned".to_string()))?;
        inner.remove_by_path(path);
        for doc in docs {
            inner.add(doc);
        }
        Ok(())
    }

    fn remove_by_path(&self, path: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Error::Fts("tfidf index lock poisoned".to_string()))?;
        inner.remove_by_path(path);
        Ok(())
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<FtsHit>> {
        let inner = self.inner.read().map_err(|_| Error::Fts("tfidf index lock poisoned".to_string()))?;
        Ok(inner.search(query, limit))
    }

    fn stats(&self) -> Result<FtsStats> {
        let inner = self.inner.read().map_err(|_| Error::Fts("tfidf index lock poisoned".to_string()))?;
        Ok(FtsStats { document_count: inner.live_doc_count() as u64, backend: "tfidf" })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let inner = self.inner.read().map_err(|_| Error::Fts("tfidf index lock poisoned".to_string()))?;
        Ok(serde_json::to_vec(&*inner)?)
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Error::Fts("tfidf index lock poisoned".to_string()))?;
        *inner = Inner::default();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, path: &str, content: &str) -> FtsDoc {
        FtsDoc { chunk_id: id.to_string(), path: path.to_string(), content: content.to_string(), heading: String::new() }
    }

    #[test]
    fn add_then_search_finds_match() {
        let idx = TfIdfIndex::new();
        idx.add_chunks("a.rs", &[doc("a.rs#0", "a.rs", "authenticate user session token")]).unwrap();
        let hits = idx.search("authenticate", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "a.rs#0");
    }

    #[test]
    fn rarer_term_scores_higher_than_common_term() {
        let idx = TfIdfIndex::new();
        idx.add_chunks("a.rs", &[doc("a.rs#0", "a.rs", "common common common rare")]).unwrap();
        idx.add_chunks("b.rs", &[doc("b.rs#0", "b.rs", "common common common other")]).unwrap();

        let hits = idx.search("rare", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "a.rs#0");
    }

    #[test]
    fn remove_by_path_drops_its_chunks_from_search() {
        let idx = TfIdfIndex::new();
        idx.add_chunks("a.rs", &[doc("a.rs#0", "a.rs", "authenticate user")]).unwrap();
        idx.remove_by_path("a.rs").unwrap();
        assert!(idx.search("authenticate", 10).unwrap().is_empty());
        assert_eq!(idx.stats().unwrap().document_count, 0);
    }

    #[test]
    fn serialize_round_trips_through_from_bytes() {
        let idx = TfIdfIndex::new();
        idx.add_chunks("a.rs", &[doc("a.rs#0", "a.rs", "authenticate user")]).unwrap();
        let bytes = idx.serialize().unwrap();
        let restored = TfIdfIndex::from_bytes(&bytes).unwrap();
        assert_eq!(restored.search("authenticate", 10).unwrap().len(), 1);
    }

    #[test]
    fn empty_query_yields_no_hits() {
        let idx = TfIdfIndex::new();
        idx.add_chunks("a.rs", &[doc("a.rs#0", "a.rs", "authenticate user")]).unwrap();
        assert!(idx.search("", 10).unwrap().is_empty());
    }
}
