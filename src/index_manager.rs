//! Index orchestration: scan -> chunk -> embed -> dual-insert, plus
//! incremental delta application driven by `FingerprintStore` (spec.md
//! §4.8).
//!
//! Grounded on the teacher's `CodebaseIndex::refresh` four-phase structure
//! (stat sweep -> candidate classification -> parallel read+hash ->
//! embed+upsert) in `vector_store.rs`, and on `openai-codex`'s
//! `retrieval::services::index::IndexService`/`RebuildMode` for the
//! explicit-collaborator-injection shape: this crate's `IndexManager` takes
//! its vector store, FTS backend, and embedder as constructor arguments
//! rather than owning concrete types, matching how that example keeps its
//! store handles behind trait objects/`Arc`s.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::chunker;
use crate::config::Config;
use crate::embedder::{Domain, Embedder, Role};
use crate::error::{Error, Result};
use crate::fingerprint::{FileFingerprint, FingerprintDiff, FingerprintStore};
use crate::fts::{FtsBackend, FtsDoc};
use crate::scanner::{scan_workspace, ScanOptions};
use crate::vector_store::{VectorRecord, VectorStore};
use crate::watchdog::MemoryWatchdog;

/// Whether a rebuild discards existing state first (`Clean`, i.e.
/// `full_index`) or applies only a computed delta (`Incremental`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildMode {
    Incremental,
    Clean,
}

/// Outcome of an indexing pass. Per-file failures are collected rather than
/// aborting the whole batch (spec.md §4.8 error policy) — one bad file
/// never blocks the rest.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub indexed: usize,
    pub removed: usize,
    pub failed: Vec<(PathBuf, String)>,
    /// `true` when the memory watchdog curtailed the batch before every
    /// discovered/diffed file was processed.
    pub curtailed: bool,
}

impl IndexReport {
    fn record_failure(&mut self, path: PathBuf, err: impl std::fmt::Display) {
        warn!(path = %path.display(), error = %err, "indexing failed for file");
        self.failed.push((path, err.to_string()));
    }
}

pub struct IndexManager {
    repo_root: PathBuf,
    config: Config,
    embedder: Embedder,
    vector_store: Box<dyn VectorStore>,
    fts: Box<dyn FtsBackend>,
    fingerprints: FingerprintStore,
    fingerprint_path: PathBuf,
    watchdog: MemoryWatchdog,
}

impl IndexManager {
    pub fn new(
        repo_root: PathBuf,
        config: Config,
        embedder: Embedder,
        vector_store: Box<dyn VectorStore>,
        fts: Box<dyn FtsBackend>,
        db_dir: &Path,
    ) -> Result<Self> {
        std::fs::create_dir_all(db_dir)?;
        let fingerprint_path = db_dir.join("fingerprints.json");
        let fingerprints = std::fs::read(&fingerprint_path)
            .ok()
            .and_then(|bytes| FingerprintStore::from_bytes(&bytes).ok())
            .unwrap_or_default();
        let watchdog = MemoryWatchdog::new(config.index_manager.memory.clone());

        Ok(Self { repo_root, config, embedder, vector_store, fts, fingerprints, fingerprint_path, watchdog })
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            repo_root: self.repo_root.clone(),
            target: self.repo_root.clone(),
            max_file_bytes: self.config.scan.max_file_bytes,
            exclude_dir_names: self.config.scan.exclude_dir_names.clone(),
        }
    }

    fn persist_fingerprints(&self) -> Result<()> {
        let bytes = self.fingerprints.serialize()?;
        std::fs::write(&self.fingerprint_path, bytes)?;
        Ok(())
    }

    /// Chunk, embed, and dual-insert one file's content. A chunk whose
    /// embedding fails (model error or wrong output dimension) is dropped
    /// from the vector store only — it never gets a zero-vector stand-in —
    /// while the FTS index still gets every chunk, since full-text search
    /// doesn't depend on an embedding succeeding. Only a whole-batch error
    /// with no isolable per-item cause propagates as `Err`.
    fn index_one_file(&mut self, rel_path: &str, content: &str, hash: &str) -> Result<usize> {
        let domain = if chunker::is_docs_path(rel_path) { Domain::Docs } else { Domain::Code };
        let chunks = chunker::chunk_text(rel_path, content, hash, &self.config.chunker)?;
        if chunks.is_empty() {
            self.vector_store.remove_by_path(rel_path)?;
            self.fts.remove_by_path(rel_path)?;
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embedded = self.embedder.embed_batch(&texts, domain, Role::Document)?;
        if embedded.failed_count > 0 {
            warn!(path = rel_path, failed = embedded.failed_count, total = chunks.len(), "some chunks failed to embed, dropping them");
        }

        // Only chunks whose embedding succeeded get a vector record
        // (spec.md §7: a dimension mismatch is fatal for that embedding
        // only — the chunk is dropped, nothing is inserted into the
        // vector store for it).
        let embedded_chunks: Vec<_> = embedded.success_indices.iter().map(|&i| &chunks[i]).collect();

        let records: Vec<VectorRecord> = embedded_chunks
            .iter()
            .zip(embedded.vectors)
            .map(|(c, v)| VectorRecord { chunk_id: c.id.to_string(), path: rel_path.to_string(), vector: v })
            .collect();

        let fts_docs: Vec<FtsDoc> = chunks
            .iter()
            .map(|c| {
                let heading = c
                    .metadata
                    .as_ref()
                    .map(|m| {
                        let mut parts: Vec<String> = m.name.iter().cloned().collect();
                        parts.extend(m.tags.iter().cloned());
                        parts.join(" ")
                    })
                    .unwrap_or_default();
                FtsDoc { chunk_id: c.id.to_string(), path: rel_path.to_string(), content: c.text.clone(), heading }
            })
            .collect();

        self.vector_store.upsert(rel_path, &records)?;
        self.fts.add_chunks(rel_path, &fts_docs)?;

        Ok(chunks.len())
    }

    fn remove_file(&mut self, rel_path: &str) -> Result<()> {
        self.vector_store.remove_by_path(rel_path)?;
        self.fts.remove_by_path(rel_path)?;
        self.fingerprints.remove(rel_path);
        Ok(())
    }

    // -- Full index ---------------------------------------------------------

    /// Reset the vector store and the fingerprint store, then reindex every
    /// file the scanner discovers. The FTS index is *not* reset — each
    /// file's chunks replace its prior entries there via `add_chunks`'
    /// delete-by-path-then-insert semantics, matching spec.md §4.8 ("reset
    /// the vector store and the fingerprint store; keep the FTS index in
    /// the same lifecycle").
    pub fn full_index(&mut self) -> Result<IndexReport> {
        self.vector_store.clear()?;
        self.fingerprints = FingerprintStore::new();

        let entries = scan_workspace(&self.scan_options()).map_err(|e| Error::Store(e.to_string()))?;
        info!(file_count = entries.len(), "starting full index");

        let mut report = IndexReport::default();
        let batch_size = self.config.index_manager.batch_size.max(1);

        for batch in entries.chunks(batch_size) {
            if self.watchdog.is_critical() {
                warn!("memory pressure critical; curtailing remaining batches");
                report.curtailed = true;
                break;
            }

            for entry in batch {
                let rel = entry.rel_path.to_string_lossy().replace('\\', "/");
                match std::fs::read(&entry.abs_path) {
                    Ok(bytes) => {
                        let fingerprint = FileFingerprint::of_bytes(&bytes);
                        let content = String::from_utf8_lossy(&bytes).into_owned();
                        match self.index_one_file(&rel, &content, &fingerprint.hash) {
                            Ok(n) => {
                                report.indexed += n;
                                self.fingerprints.insert(rel.clone(), fingerprint);
                            }
                            Err(e) => report.record_failure(entry.abs_path.clone(), e),
                        }
                    }
                    Err(e) => report.record_failure(entry.abs_path.clone(), e),
                }
            }

            self.persist_fingerprints()?;
        }

        Ok(report)
    }

    // -- Incremental delta ---------------------------------------------------

    /// Apply a precomputed fingerprint diff: removed -> modified-delete ->
    /// added+modified-insert -> persist fingerprints (spec.md §5 ordering).
    /// An empty diff issues no writes at all.
    pub fn apply_diff(&mut self, diff: &FingerprintDiff) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        if diff.is_empty() {
            return Ok(report);
        }

        for rel in &diff.removed {
            if let Err(e) = self.remove_file(rel) {
                report.record_failure(self.repo_root.join(rel), e);
            } else {
                report.removed += 1;
            }
        }

        for rel in &diff.modified {
            if let Err(e) = self.vector_store.remove_by_path(rel) {
                report.record_failure(self.repo_root.join(rel), e);
            }
            if let Err(e) = self.fts.remove_by_path(rel) {
                report.record_failure(self.repo_root.join(rel), e);
            }
        }

        let to_insert: Vec<&String> = diff.added.iter().chain(diff.modified.iter()).collect();
        let batch_size = self.config.index_manager.batch_size.max(1);

        for batch in to_insert.chunks(batch_size) {
            if self.watchdog.is_critical() {
                warn!("memory pressure critical; curtailing remaining incremental batch");
                report.curtailed = true;
                break;
            }

            for rel in batch {
                let abs_path = self.repo_root.join(rel.as_str());
                match std::fs::read(&abs_path) {
                    Ok(bytes) => {
                        let fingerprint = FileFingerprint::of_bytes(&bytes);
                        let content = String::from_utf8_lossy(&bytes).into_owned();
                        match self.index_one_file(rel, &content, &fingerprint.hash) {
                            Ok(n) => {
                                report.indexed += n;
                                self.fingerprints.insert((*rel).clone(), fingerprint);
                            }
                            Err(e) => report.record_failure(abs_path, e),
                        }
                    }
                    Err(e) => report.record_failure(abs_path, e),
                }
            }
        }

        self.persist_fingerprints()?;
        Ok(report)
    }

    /// Scan the workspace, diff against the stored fingerprints, and apply
    /// the resulting delta. `RebuildMode::Clean` runs `full_index` instead.
    pub fn incremental_update(&mut self, mode: RebuildMode) -> Result<IndexReport> {
        if mode == RebuildMode::Clean {
            return self.full_index();
        }

        let entries = scan_workspace(&self.scan_options()).map_err(|e| Error::Store(e.to_string()))?;
        let coarse = self.fingerprints.diff(&entries);

        // The coarse diff treats any same-size file as a "modified"
        // candidate; verify those by hash before committing to a rewrite,
        // mirroring the teacher's `refresh()` phase 3 (parallel read+hash,
        // drop same-size/same-hash candidates as truly unchanged).
        let mut confirmed = coarse.clone();
        confirmed.modified.clear();
        for rel in &coarse.modified {
            let abs_path = self.repo_root.join(rel);
            let Ok(bytes) = std::fs::read(&abs_path) else { continue };
            let fingerprint = FileFingerprint::of_bytes(&bytes);
            if !self.fingerprints.is_unchanged(rel, fingerprint.size, &fingerprint.hash) {
                confirmed.modified.push(rel.clone());
            }
        }

        self.apply_diff(&confirmed)
    }

    // -- Single-file update ---------------------------------------------------

    /// Reindex one file if its content hash changed since it was last
    /// indexed; a no-op otherwise. Returns whether a reindex happened.
    pub fn update_file(&mut self, rel_path: &str) -> Result<bool> {
        let abs_path = self.repo_root.join(rel_path);
        let bytes = std::fs::read(&abs_path)?;
        let fingerprint = FileFingerprint::of_bytes(&bytes);

        if self.fingerprints.is_unchanged(rel_path, fingerprint.size, &fingerprint.hash) {
            return Ok(false);
        }

        self.vector_store.remove_by_path(rel_path)?;
        self.fts.remove_by_path(rel_path)?;

        let content = String::from_utf8_lossy(&bytes).into_owned();
        self.index_one_file(rel_path, &content, &fingerprint.hash)?;
        self.fingerprints.insert(rel_path.to_string(), fingerprint);
        self.persist_fingerprints()?;
        Ok(true)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &Embedder {
        &self.embedder
    }

    pub fn vector_store(&self) -> &dyn VectorStore {
        self.vector_store.as_ref()
    }

    pub fn fts(&self) -> &dyn FtsBackend {
        self.fts.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fts::tfidf::TfIdfIndex;
    use crate::vector_store::NullVectorStore;

    fn manager(repo_root: &Path, db_dir: &Path) -> IndexManager {
        IndexManager::new(
            repo_root.to_path_buf(),
            Config::default(),
            Embedder::new(Config::default().embedder),
            Box::new(NullVectorStore::new()),
            Box::new(TfIdfIndex::new()),
            db_dir,
        )
        .unwrap()
    }

    #[test]
    fn empty_diff_is_a_no_op() {
        let repo = tempfile::tempdir().unwrap();
        let db = tempfile::tempdir().unwrap();
        let mut mgr = manager(repo.path(), db.path());

        let report = mgr.apply_diff(&FingerprintDiff::default()).unwrap();
        assert_eq!(report.indexed, 0);
        assert_eq!(report.removed, 0);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn full_index_on_empty_repo_indexes_nothing() {
        let repo = tempfile::tempdir().unwrap();
        let db = tempfile::tempdir().unwrap();
        let mut mgr = manager(repo.path(), db.path());

        let report = mgr.full_index().unwrap();
        assert_eq!(report.indexed, 0);
        assert!(report.failed.is_empty());
        assert_eq!(mgr.fingerprints.len(), 0);
    }

    #[test]
    fn update_file_on_missing_path_is_an_io_error() {
        let repo = tempfile::tempdir().unwrap();
        let db = tempfile::tempdir().unwrap();
        let mut mgr = manager(repo.path(), db.path());

        assert!(mgr.update_file("does-not-exist.rs").is_err());
    }

    #[test]
    fn incremental_update_clean_mode_delegates_to_full_index() {
        let repo = tempfile::tempdir().unwrap();
        let db = tempfile::tempdir().unwrap();
        let mut mgr = manager(repo.path(), db.path());

        let report = mgr.incremental_update(RebuildMode::Clean).unwrap();
        assert_eq!(report.indexed, 0);
    }
}
