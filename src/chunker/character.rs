//! Generic recursive-separator chunker (spec.md §4.4, default fallback).
//!
//! Splits on separators in priority order, recursively, until every piece is
//! ≤ `chunk_size`; merges adjacent pieces back together while respecting
//! `chunk_size`; carries a bounded suffix forward as overlap between chunks.

use crate::chunk::ChunkWithLines;
use crate::config::ChunkerConfig;
use crate::error::{Error, Result};

/// Recursively split `text` on the configured separators until every piece
/// is within `chunk_size`.
fn recursive_split(text: &str, separators: &[String], chunk_size: usize) -> Vec<String> {
    if text.len() <= chunk_size || separators.is_empty() {
        return vec![text.to_string()];
    }

    let (sep, rest_seps) = (separators[0].as_str(), &separators[1..]);

    let pieces: Vec<&str> = if sep.is_empty() {
        // Final fallback: hard character split.
        return text
            .as_bytes()
            .chunks(chunk_size.max(1))
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .collect();
    } else {
        text.split(sep).collect()
    };

    let mut out = Vec::new();
    for (i, piece) in pieces.iter().enumerate() {
        let rejoined = if i + 1 < pieces.len() { format!("{piece}{sep}") } else { piece.to_string() };
        if rejoined.len() > chunk_size {
            out.extend(recursive_split(&rejoined, rest_seps, chunk_size));
        } else if !rejoined.is_empty() {
            out.push(rejoined);
        }
    }
    out
}

/// Merge adjacent small pieces together while respecting `chunk_size`,
/// carrying a bounded suffix of the previous merged chunk forward as overlap.
fn merge_with_overlap(pieces: Vec<String>, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    let mut current = String::new();

    for piece in pieces {
        if current.is_empty() {
            current = piece;
            continue;
        }
        if current.len() + piece.len() <= chunk_size {
            current.push_str(&piece);
        } else {
            merged.push(std::mem::take(&mut current));
            current = piece;
        }
    }
    if !current.is_empty() {
        merged.push(current);
    }

    if merged.len() <= 1 || chunk_overlap == 0 {
        return merged;
    }

    let mut out: Vec<String> = Vec::with_capacity(merged.len());
    for (i, chunk) in merged.into_iter().enumerate() {
        if i == 0 {
            out.push(chunk);
            continue;
        }
        let prev = &out[i - 1];
        let overlap = overlap_suffix(prev, chunk_overlap);
        out.push(format!("{overlap}{chunk}"));
    }
    out
}

/// A suffix of `text` no longer than `max_len`, truncated at a newline
/// boundary when one exists within the window (best-effort line accuracy).
fn overlap_suffix(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let window_start = text.len() - max_len;
    // Find a char boundary at or after window_start.
    let mut start = window_start;
    while start < text.len() && !text.is_char_boundary(start) {
        start += 1;
    }
    let window = &text[start..];
    match window.find('\n') {
        Some(idx) => window[idx + 1..].to_string(),
        None => window.to_string(),
    }
}

/// Recover the 1-based inclusive line span of `chunk_text` within `full_text`,
/// searching forward from `cursor_line` (best-effort: the character strategy
/// can reuse text across the overlap window, so a forward substring search
/// can occasionally miss in files with duplicated boilerplate). On failure,
/// fall back to `prev_end_line + 1` through `prev_end_line + newline_count`.
fn recover_line_span(full_text: &str, chunk_text: &str, search_from_byte: usize, prev_end_line: usize) -> (usize, usize, usize) {
    let newline_count = chunk_text.matches('\n').count();

    if let Some(pos) = full_text.get(search_from_byte..).and_then(|s| s.find(chunk_text)) {
        let abs_pos = search_from_byte + pos;
        let start_line = full_text[..abs_pos].matches('\n').count() + 1;
        let end_line = start_line + newline_count;
        return (start_line, end_line, abs_pos + chunk_text.len());
    }

    // Fall back: previous endLine + newline count in this chunk.
    let start_line = prev_end_line + 1;
    let end_line = start_line + newline_count;
    (start_line, end_line, search_from_byte)
}

pub fn chunk(text: &str, config: &ChunkerConfig) -> Result<Vec<ChunkWithLines>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let pieces = recursive_split(text, &config.separators, config.chunk_size);
    let merged = merge_with_overlap(pieces, config.chunk_size, config.chunk_overlap);

    if merged.len() > config.max_chunks_per_file {
        return Err(Error::ChunkCapExceeded {
            path: Default::default(),
            count: merged.len(),
            limit: config.max_chunks_per_file,
        });
    }

    let mut chunks = Vec::with_capacity(merged.len());
    let mut cursor = 0usize;
    let mut prev_end_line = 0usize;

    for piece in merged {
        // Search from a point that accounts for the overlap window so a
        // repeated earlier occurrence of overlapped text isn't matched again.
        let search_from = cursor.saturating_sub(config.chunk_overlap.min(cursor));
        let (start_line, end_line, new_cursor) = recover_line_span(text, &piece, search_from, prev_end_line);
        cursor = new_cursor.max(cursor);
        prev_end_line = end_line;
        chunks.push(ChunkWithLines::new(start_line, end_line, piece));
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: 40,
            chunk_overlap: 10,
            max_chunk_size: 80,
            max_chunks_per_file: 1000,
            separators: vec!["\n\n".into(), "\n".into(), " ".into(), "".into()],
            include_header_path: true,
        }
    }

    #[test]
    fn empty_file_yields_zero_chunks() {
        assert!(chunk("", &cfg()).unwrap().is_empty());
    }

    #[test]
    fn short_file_is_one_chunk() {
        let text = "short file content";
        let chunks = chunk(text, &cfg()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
    }

    #[test]
    fn line_spans_are_monotonic_and_in_range() {
        let text = (1..=50).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let total_lines = text.lines().count();
        let chunks = chunk(&text, &cfg()).unwrap();
        for c in &chunks {
            assert!(c.start_line >= 1);
            assert!(c.start_line <= c.end_line);
            assert!(c.end_line <= total_lines);
        }
    }

    #[test]
    fn chunk_cap_overflow_is_fatal() {
        let tiny_cfg = ChunkerConfig { chunk_size: 1, max_chunks_per_file: 2, ..cfg() };
        let text = "a b c d e f g h";
        assert!(chunk(text, &tiny_cfg).is_err());
    }

    #[test]
    fn exact_chunk_size_file_is_one_chunk() {
        let c = cfg();
        let text = "a".repeat(c.chunk_size);
        let chunks = chunk(&text, &c).unwrap();
        assert_eq!(chunks.len(), 1);
    }
}
