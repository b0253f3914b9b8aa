//! Chunking strategy dispatch (spec.md §4.4): AST-driven, then code-heuristic,
//! then generic character-recursive, in that deterministic fallback order,
//! chosen by file extension and (for the AST path) whether the tree-sitter
//! driver actually found anything to anchor on. Markdown gets its own
//! header-aware path regardless of size. Files at or above the streaming
//! threshold bypass all of the above and go through the line-by-line reader.

pub mod ast;
pub mod character;
pub mod heuristic;
pub mod markdown;
pub mod streaming;

use std::io::Read;
use std::path::Path;

use crate::chunk::Chunk;
use crate::config::ChunkerConfig;
use crate::error::Result;

fn extension_of(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase()
}

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Whether `rel_path` should be embedded with the docs model rather than the
/// code model (spec.md §4.5 domain selection) — markdown and friends.
pub fn is_docs_path(rel_path: &str) -> bool {
    MARKDOWN_EXTENSIONS.contains(&extension_of(Path::new(rel_path)).as_str())
}

/// Chunk a file already fully read into memory, given its relative path
/// (used only to pick a strategy by extension) and content hash (stamped
/// onto every resulting `Chunk`).
pub fn chunk_text(rel_path: &str, text: &str, content_hash: &str, config: &ChunkerConfig) -> Result<Vec<Chunk>> {
    let ext = extension_of(Path::new(rel_path));

    let with_lines = if MARKDOWN_EXTENSIONS.contains(&ext.as_str()) {
        markdown::chunk(text, config)?
    } else if let Some(chunks) = ast::chunk(text, &ext, config)? {
        if chunks.is_empty() && heuristic::supports_extension(&ext) {
            heuristic::chunk(text, &ext, config)?
        } else {
            chunks
        }
    } else if heuristic::supports_extension(&ext) {
        heuristic::chunk(text, &ext, config)?
    } else {
        character::chunk(text, config)?
    };

    Ok(with_lines.into_iter().map(|c| c.into_chunk(rel_path, content_hash)).collect())
}

/// Chunk a file via streaming (for files at/above
/// `streaming::STREAMING_THRESHOLD_BYTES`), skipping strategy selection
/// entirely — huge files get the generic line-accumulator path regardless
/// of extension, since tree-sitter parsing a multi-hundred-MB file whole
/// would defeat the point of streaming.
pub fn chunk_reader<R: Read>(rel_path: &str, reader: R, content_hash: &str, config: &ChunkerConfig) -> Result<Vec<Chunk>> {
    let with_lines = streaming::chunk_reader(reader, config)?;
    Ok(with_lines.into_iter().map(|c| c.into_chunk(rel_path, content_hash)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ChunkerConfig {
        ChunkerConfig::default()
    }

    #[test]
    fn rust_file_uses_ast_strategy() {
        let chunks = chunk_text("src/lib.rs", "fn a() {\n    1;\n}\n", "hash1", &cfg()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content_hash, "hash1");
        assert!(chunks[0].metadata.is_some());
    }

    #[test]
    fn markdown_file_uses_header_strategy() {
        let chunks = chunk_text("README.md", "# Title\n\nbody\n", "hash2", &cfg()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].metadata.as_ref().unwrap().tags.contains(&"Title".to_string()));
    }

    #[test]
    fn unknown_extension_falls_back_to_character_strategy() {
        let chunks = chunk_text("data.xyzzy", "some arbitrary content\nacross two lines\n", "hash3", &cfg()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].metadata.is_none());
    }

    #[test]
    fn empty_file_yields_zero_chunks_regardless_of_extension() {
        assert!(chunk_text("src/lib.rs", "", "h", &cfg()).unwrap().is_empty());
        assert!(chunk_text("README.md", "", "h", &cfg()).unwrap().is_empty());
        assert!(chunk_text("data.xyzzy", "", "h", &cfg()).unwrap().is_empty());
    }

    #[test]
    fn rust_file_with_no_definitions_falls_back_to_heuristic_or_character() {
        // No top-level defs at all -> AST yields empty -> falls through.
        let chunks = chunk_text("src/consts.rs", "// just a file of constants\nconst X: u32 = 1;\n", "h", &cfg()).unwrap();
        assert_eq!(chunks.len(), 1);
    }
}
