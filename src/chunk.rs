//! The atom of indexing: a line-accurate slice of a source file plus whatever
//! semantic metadata a chunking strategy was able to recover for it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Semantic kind of the AST node (or heuristic boundary) a chunk was built
/// around. `Other` covers anything a language driver doesn't classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Function,
    Class,
    Method,
    Interface,
    Type,
    Enum,
    Struct,
    Trait,
    Impl,
    Module,
    Variable,
    Import,
    Other,
}

impl ChunkType {
    /// Map the loose aliases ranker/config callers tend to use onto a
    /// canonical variant (`fn`/`def`/`func` -> `Function`, `cls`/`struct`/
    /// `interface`/`trait`/`type` -> `Class`, etc.) — see spec.md 4.10 factor 1.
    pub fn from_alias(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "function" | "fn" | "def" | "func" => ChunkType::Function,
            "class" | "cls" | "struct" | "interface" | "trait" | "type" => ChunkType::Class,
            "method" | "meth" => ChunkType::Method,
            "enum" => ChunkType::Enum,
            "impl" => ChunkType::Impl,
            "module" | "mod" | "pkg" | "package" => ChunkType::Module,
            "variable" | "var" => ChunkType::Variable,
            "import" => ChunkType::Import,
            _ => ChunkType::Other,
        }
    }
}

/// Optional attributes recovered by an AST-driven (or sufficiently capable
/// heuristic) chunking strategy. Absent fields mean "strategy didn't know",
/// not "value is empty".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_type: Option<ChunkType>,
    pub name: Option<String>,
    pub parent_name: Option<String>,
    pub parent_type: Option<ChunkType>,
    pub signature: Option<String>,
    pub docstring: Option<String>,
    pub decorators: Vec<String>,
    pub language: Option<String>,
    pub is_async: bool,
    pub is_exported: bool,
    pub is_static: bool,
    pub visibility: Option<String>,
    pub param_count: Option<usize>,
    pub return_type: Option<String>,
    pub generic_params: Vec<String>,
    pub tags: Vec<String>,
    /// Markdown-only: which paragraph part this is, 1-based.
    pub part: Option<usize>,
    /// Markdown-only: total number of parts a long section was split into.
    pub total_parts: Option<usize>,
}

/// A contiguous slice of a source file, stable across re-chunking as long as
/// the file's content is unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    /// Forward-slash relative path of the file this chunk came from.
    pub path: String,
    /// 1-based, inclusive.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    pub text: String,
    /// Content hash of the *source file*, shared by every chunk from it.
    pub content_hash: String,
    pub metadata: Option<ChunkMetadata>,
}

impl Chunk {
    pub fn new(path: impl Into<String>, start_line: usize, end_line: usize, text: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            start_line,
            end_line,
            text: text.into(),
            content_hash: content_hash.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Output of a chunking strategy before the content hash is known (strategies
/// run before/without reading the rest of the pipeline's fingerprinting).
#[derive(Debug, Clone)]
pub struct ChunkWithLines {
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    pub metadata: Option<ChunkMetadata>,
}

impl ChunkWithLines {
    pub fn new(start_line: usize, end_line: usize, text: impl Into<String>) -> Self {
        Self {
            start_line,
            end_line,
            text: text.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: ChunkMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn into_chunk(self, path: &str, content_hash: &str) -> Chunk {
        let mut c = Chunk::new(path, self.start_line, self.end_line, self.text, content_hash);
        c.metadata = self.metadata;
        c
    }
}
