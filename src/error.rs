//! Library-surface error taxonomy (spec.md §7). Kinds, not exhaustive
//! per-call-site variants: `Input`, `ResourceLimit`, `Model`,
//! `DimensionMismatch`, `Store`, `FtsSerialization`. Symlinks are not an
//! error — they're silently skipped at the call site and never reach here.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    #[error("invalid project root: {0}")]
    BadProjectRoot(PathBuf),

    #[error("chunk cap exceeded for {path} ({count} > {limit})")]
    ChunkCapExceeded { path: PathBuf, count: usize, limit: usize },

    #[error("memory pressure critical, batch curtailed")]
    MemoryCritical,

    #[error("embedding model initialization failed: {0}")]
    ModelInit(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector store error: {0}")]
    Store(String),

    #[error("index appears corrupt, rebuild recommended: {0}")]
    IndexCorrupt(String),

    #[error("FTS serialization version unsupported: {0}")]
    FtsSerializationVersion(u32),

    #[error("FTS backend error: {0}")]
    Fts(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
