//! Streaming chunker for large files (spec.md §4.4, §5): files whose byte
//! size exceeds `STREAMING_THRESHOLD_BYTES` are read and chunked line-by-line
//! rather than buffered whole, so a single huge generated file can't blow
//! the indexing process's memory budget. Produces character-recursive-style
//! chunks (same `chunk_size`/`chunk_overlap` semantics) without ever holding
//! more than a small multiple of `chunk_size` bytes in memory at once.
//!
//! No direct teacher analog — the teacher always reads whole files
//! (`read_with_hash` in `vector_store.rs`); this module exists because
//! spec.md's huge-file path has no counterpart there.

use std::io::{BufRead, BufReader, Read};

use crate::chunk::ChunkWithLines;
use crate::config::ChunkerConfig;
use crate::error::Result;

/// Files at or above this size are chunked via the streaming path instead of
/// being read into memory whole.
pub const STREAMING_THRESHOLD_BYTES: u64 = 10 * 1024 * 1024;

pub fn chunk_reader<R: Read>(reader: R, config: &ChunkerConfig) -> Result<Vec<ChunkWithLines>> {
    let mut buf = BufReader::new(reader);
    let mut chunks = Vec::new();

    let mut current = String::new();
    let mut current_start_line = 1usize;
    let mut line_no = 0usize;
    let mut carry_overlap = String::new();

    let mut line = String::new();
    loop {
        line.clear();
        let read = buf.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        line_no += 1;

        if current.is_empty() {
            current.push_str(&carry_overlap);
        }
        current.push_str(&line);

        if current.len() >= config.chunk_size {
            let end_line = line_no;
            chunks.push(ChunkWithLines::new(current_start_line, end_line, std::mem::take(&mut current)));

            if chunks.len() > config.max_chunks_per_file {
                return Err(crate::error::Error::ChunkCapExceeded {
                    path: Default::default(),
                    count: chunks.len(),
                    limit: config.max_chunks_per_file,
                });
            }

            carry_overlap = overlap_tail(&chunks.last().unwrap().text, config.chunk_overlap);
            current_start_line = end_line + 1;
        }
    }

    if !current.is_empty() {
        chunks.push(ChunkWithLines::new(current_start_line, line_no, current));
    }

    Ok(chunks)
}

fn overlap_tail(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let window_start = text.len() - max_len;
    let mut start = window_start;
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
