//! File fingerprinting for incremental re-indexing (spec.md §4.8).
//!
//! Grounded on the teacher's `CodebaseIndex` cache logic in `vector_store.rs`
//! (`read_with_hash`/`is_content_unchanged`/`needs_reindex_path`/the
//! size-pre-screen-then-hash two-step of `refresh`): the same size-first,
//! hash-second skip strategy and `(added, updated, removed)` diff shape are
//! kept here, generalized from "a field embedded inside the vector index"
//! into a standalone store any collaborator can consult. Hashing is
//! `sha2::Sha256` rather than the teacher's `xxh3` — see DESIGN.md for why.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::scanner::FileEntry;

/// Content fingerprint of a single file at last index time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileFingerprint {
    pub size: u64,
    pub hash: String,
}

impl FileFingerprint {
    /// Hash raw bytes with SHA-256, hex-encoded.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hasher.finalize();
        Self { size: bytes.len() as u64, hash: hex_encode(&digest) }
    }

    pub fn of_file(abs_path: &Path) -> Result<Self> {
        let bytes = std::fs::read(abs_path)?;
        Ok(Self::of_bytes(&bytes))
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Result of comparing a fingerprint store against the files currently on
/// disk: three path sets, disjoint by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FingerprintDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl FingerprintDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Path-keyed map of `FileFingerprint`s, persisted alongside the rest of an
/// index so a later process can tell, without reading every file, which
/// ones changed since the last run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FingerprintStore {
    entries: HashMap<String, FileFingerprint>,
}

impl FingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let entries: HashMap<String, FileFingerprint> = serde_json::from_slice(bytes)?;
        Ok(Self { entries })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.entries)?)
    }

    pub fn get(&self, rel_path: &str) -> Option<&FileFingerprint> {
        self.entries.get(rel_path)
    }

    pub fn insert(&mut self, rel_path: impl Into<String>, fingerprint: FileFingerprint) {
        self.entries.insert(rel_path.into(), fingerprint);
    }

    pub fn remove(&mut self, rel_path: &str) {
        self.entries.remove(rel_path);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cheap pre-screen: a stored size mismatch alone is enough to conclude
    /// the file changed, no read needed. A size match still requires reading
    /// and hashing (handles content edits that preserve length, and git
    /// branch-switches that restore an old size with new content elsewhere).
    pub fn is_unchanged(&self, rel_path: &str, disk_size: u64, disk_hash: &str) -> bool {
        match self.entries.get(rel_path) {
            Some(fp) => fp.size == disk_size && fp.hash == disk_hash,
            None => false,
        }
    }

    /// Compare against the files currently on disk (as reported by a scan)
    /// and classify each as added, modified (same path, different
    /// fingerprint), or removed (in the store, absent from disk). Files
    /// whose fingerprint is unchanged are omitted entirely.
    ///
    /// This only does the cheap size-based classification; callers that
    /// need certainty for same-size files should hash them and call
    /// `is_unchanged` before trusting a "modified" verdict — this mirrors
    /// the teacher's `refresh()` phase split (stat sweep first, parallel
    /// read+hash only for files the stat sweep couldn't rule out).
    pub fn diff(&self, disk_entries: &[FileEntry]) -> FingerprintDiff {
        let mut disk_paths: HashSet<String> = HashSet::with_capacity(disk_entries.len());
        let mut diff = FingerprintDiff::default();

        for entry in disk_entries {
            let rel = entry.rel_path.to_string_lossy().replace('\\', "/");
            disk_paths.insert(rel.clone());

            match self.entries.get(&rel) {
                None => diff.added.push(rel),
                Some(fp) if fp.size != entry.bytes => diff.modified.push(rel),
                Some(_) => {
                    // Same size: ambiguous without a content read. Treat as a
                    // candidate for the caller to hash-verify.
                    diff.modified.push(rel);
                }
            }
        }

        for key in self.entries.keys() {
            if !disk_paths.contains(key) {
                diff.removed.push(key.clone());
            }
        }

        diff.added.sort();
        diff.modified.sort();
        diff.removed.sort();
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(rel: &str, bytes: u64) -> FileEntry {
        FileEntry { abs_path: PathBuf::from(rel), rel_path: PathBuf::from(rel), bytes }
    }

    #[test]
    fn identical_bytes_hash_identically() {
        let a = FileFingerprint::of_bytes(b"fn main() {}");
        let b = FileFingerprint::of_bytes(b"fn main() {}");
        assert_eq!(a, b);
    }

    #[test]
    fn different_bytes_hash_differently() {
        let a = FileFingerprint::of_bytes(b"fn main() {}");
        let b = FileFingerprint::of_bytes(b"fn other() {}");
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn diff_classifies_new_file_as_added() {
        let store = FingerprintStore::new();
        let diff = store.diff(&[entry("a.rs", 10)]);
        assert_eq!(diff.added, vec!["a.rs".to_string()]);
        assert!(diff.modified.is_empty());
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn diff_classifies_size_change_as_modified() {
        let mut store = FingerprintStore::new();
        store.insert("a.rs", FileFingerprint { size: 10, hash: "x".into() });
        let diff = store.diff(&[entry("a.rs", 20)]);
        assert_eq!(diff.modified, vec!["a.rs".to_string()]);
    }

    #[test]
    fn diff_classifies_missing_file_as_removed() {
        let mut store = FingerprintStore::new();
        store.insert("a.rs", FileFingerprint { size: 10, hash: "x".into() });
        let diff = store.diff(&[]);
        assert_eq!(diff.removed, vec!["a.rs".to_string()]);
    }

    #[test]
    fn diff_is_empty_when_nothing_changed_and_same_size() {
        let mut store = FingerprintStore::new();
        store.insert("a.rs", FileFingerprint { size: 10, hash: "x".into() });
        let diff = store.diff(&[entry("a.rs", 10)]);
        // Same size is still surfaced as a modified candidate for hash
        // verification by the caller, so this isn't empty...
        assert_eq!(diff.modified, vec!["a.rs".to_string()]);
        // ...but `is_unchanged` lets the caller confirm it's a false alarm.
        assert!(store.is_unchanged("a.rs", 10, "x"));
    }

    #[test]
    fn serialize_round_trips() {
        let mut store = FingerprintStore::new();
        store.insert("a.rs", FileFingerprint { size: 10, hash: "x".into() });
        let bytes = store.serialize().unwrap();
        let restored = FingerprintStore::from_bytes(&bytes).unwrap();
        assert_eq!(restored.get("a.rs"), store.get("a.rs"));
    }
}
