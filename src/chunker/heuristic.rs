//! Code-heuristic chunker (spec.md §4.4): a per-language table of regexes
//! locates likely top-level definition boundaries by line; chunks are formed
//! by greedily growing from one boundary to just before the next, subject to
//! `chunk_size`. A unit that exceeds `max_chunk_size` on its own is
//! line-split with a small line-level overlap rather than recursed into the
//! character strategy (that stays the caller's fallback, not this module's).
//!
//! Grounded on the teacher's `inspector.rs` per-language driver table, minus
//! the tree-sitter dependency — same "one row per language extension" shape.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::chunk::ChunkWithLines;
use crate::config::ChunkerConfig;
use crate::error::Result;

struct LanguageBoundaries {
    extensions: &'static [&'static str],
    patterns: &'static [&'static str],
}

/// ~30 languages, one boundary-pattern set each. Patterns are matched against
/// a line with leading whitespace stripped (except Python, which needs the
/// original indentation to apply the indent-4 rule below).
const TABLE: &[LanguageBoundaries] = &[
    LanguageBoundaries { extensions: &["rs"], patterns: &[r"^(pub(\(.*\))?\s+)?(async\s+)?fn\s+\w", r"^(pub\s+)?(struct|enum|trait|impl|mod)\s+\w"] },
    LanguageBoundaries { extensions: &["ts", "tsx"], patterns: &[r"^(export\s+)?(default\s+)?(async\s+)?function\s*\*?\s*\w", r"^(export\s+)?(abstract\s+)?class\s+\w", r"^(export\s+)?(interface|type|enum)\s+\w", r"^(export\s+)?const\s+\w+\s*=\s*(async\s*)?\("] },
    LanguageBoundaries { extensions: &["js", "jsx", "mjs", "cjs"], patterns: &[r"^(export\s+)?(default\s+)?(async\s+)?function\s*\*?\s*\w", r"^(export\s+)?class\s+\w", r"^(export\s+)?const\s+\w+\s*=\s*(async\s*)?\("] },
    LanguageBoundaries { extensions: &["py"], patterns: &[r"^(async\s+)?def\s+\w", r"^class\s+\w", r"^@\w"] },
    LanguageBoundaries { extensions: &["go"], patterns: &[r"^func\s+(\(\w+\s+\*?\w+\)\s+)?\w", r"^type\s+\w+\s+(struct|interface)"] },
    LanguageBoundaries { extensions: &["java"], patterns: &[r"^\s*(public|private|protected)?\s*(static\s+)?(final\s+)?(class|interface|enum)\s+\w", r"^\s*(public|private|protected)?\s*(static\s+)?[\w<>\[\]]+\s+\w+\s*\("] },
    LanguageBoundaries { extensions: &["cs"], patterns: &[r"^\s*(public|private|protected|internal)?\s*(static\s+)?(abstract\s+)?(class|interface|struct|enum)\s+\w", r"^\s*(public|private|protected|internal)?\s*(static\s+)?(async\s+)?[\w<>\[\]]+\s+\w+\s*\("] },
    LanguageBoundaries { extensions: &["c", "h"], patterns: &[r"^[\w\*\s]+\w+\s*\([^;]*\)\s*\{?$", r"^(typedef\s+)?struct\s+\w"] },
    LanguageBoundaries { extensions: &["cpp", "cc", "cxx", "hpp"], patterns: &[r"^[\w:<>\*&\s]+\w+::\w+\s*\(", r"^(class|struct)\s+\w"] },
    LanguageBoundaries { extensions: &["rb"], patterns: &[r"^\s*def\s+\w", r"^\s*class\s+\w", r"^\s*module\s+\w"] },
    LanguageBoundaries { extensions: &["php"], patterns: &[r"^\s*(public|private|protected)?\s*(static\s+)?function\s+\w", r"^\s*(abstract\s+)?class\s+\w", r"^\s*interface\s+\w"] },
    LanguageBoundaries { extensions: &["swift"], patterns: &[r"^\s*(public|private|internal)?\s*(static\s+)?func\s+\w", r"^\s*(public|private|internal)?\s*(class|struct|enum|protocol)\s+\w"] },
    LanguageBoundaries { extensions: &["kt", "kts"], patterns: &[r"^\s*(public|private|internal)?\s*(suspend\s+)?fun\s+\w", r"^\s*(public|private|internal)?\s*(data\s+)?(class|interface|object)\s+\w"] },
    LanguageBoundaries { extensions: &["scala"], patterns: &[r"^\s*def\s+\w", r"^\s*(case\s+)?class\s+\w", r"^\s*object\s+\w", r"^\s*trait\s+\w"] },
    LanguageBoundaries { extensions: &["dart"], patterns: &[r"^\s*(static\s+)?[\w<>\?]+\s+\w+\s*\(", r"^\s*(abstract\s+)?class\s+\w"] },
    LanguageBoundaries { extensions: &["lua"], patterns: &[r"^\s*(local\s+)?function\s+[\w\.:]+"] },
    LanguageBoundaries { extensions: &["ex", "exs"], patterns: &[r"^\s*def\s+\w", r"^\s*defmodule\s+\w"] },
    LanguageBoundaries { extensions: &["erl"], patterns: &[r"^\w+\([^)]*\)\s*->"] },
    LanguageBoundaries { extensions: &["hs"], patterns: &[r"^\w+\s*::", r"^\w+\s+\w*\s*="] },
    LanguageBoundaries { extensions: &["ml", "mli"], patterns: &[r"^let\s+(rec\s+)?\w", r"^module\s+\w", r"^type\s+\w"] },
    LanguageBoundaries { extensions: &["zig"], patterns: &[r"^\s*(pub\s+)?fn\s+\w", r"^\s*(pub\s+)?const\s+\w+\s*=\s*struct"] },
    LanguageBoundaries { extensions: &["proto"], patterns: &[r"^\s*message\s+\w", r"^\s*service\s+\w", r"^\s*enum\s+\w"] },
    LanguageBoundaries { extensions: &["sh", "bash", "zsh"], patterns: &[r"^\s*function\s+\w", r"^\w+\s*\(\)\s*\{"] },
    LanguageBoundaries { extensions: &["sql"], patterns: &[r"(?i)^\s*create\s+(or\s+replace\s+)?(table|view|function|procedure|trigger|index)\s+"] },
    LanguageBoundaries { extensions: &["r"], patterns: &[r"^\w+\s*<-\s*function\s*\("] },
    LanguageBoundaries { extensions: &["jl"], patterns: &[r"^\s*function\s+\w", r"^\s*struct\s+\w"] },
    LanguageBoundaries { extensions: &["groovy", "gradle"], patterns: &[r"^\s*(def|void|static)\s+\w+\s*\(", r"^\s*class\s+\w"] },
    LanguageBoundaries { extensions: &["vue"], patterns: &[r"^(export\s+)?(default\s+)?(async\s+)?function\s*\*?\s*\w", r"^methods:\s*\{"] },
    LanguageBoundaries { extensions: &["yaml", "yml"], patterns: &[r"^\S[^:]*:\s*$"] },
    LanguageBoundaries { extensions: &["md", "markdown"], patterns: &[r"^#{1,6}\s+\S"] },
];

fn ext_index() -> &'static HashMap<&'static str, usize> {
    static IDX: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();
    IDX.get_or_init(|| {
        let mut m = HashMap::new();
        for (i, entry) in TABLE.iter().enumerate() {
            for ext in entry.extensions {
                m.insert(*ext, i);
            }
        }
        m
    })
}

fn compiled_patterns() -> &'static Vec<Vec<Regex>> {
    static COMPILED: OnceLock<Vec<Vec<Regex>>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        TABLE
            .iter()
            .map(|entry| entry.patterns.iter().map(|p| Regex::new(p).expect("heuristic boundary pattern is valid")).collect())
            .collect()
    })
}

/// Whether the heuristic chunker has a boundary table for this extension
/// (without the leading dot, lowercase).
pub fn supports_extension(ext: &str) -> bool {
    ext_index().contains_key(ext.to_ascii_lowercase().as_str())
}

fn is_boundary(line: &str, patterns: &[Regex]) -> bool {
    let trimmed = line.trim_start();
    patterns.iter().any(|re| re.is_match(trimmed))
}

/// Python-specific: a boundary below indentation level 4 (i.e. nested inside
/// another block) is not a chunk boundary of its own — it stays folded into
/// the enclosing unit. Top-level and single-level-nested (class methods)
/// definitions are boundaries; doubly-nested closures/locals are not.
fn python_indent_excluded(line: &str) -> bool {
    let indent = line.len() - line.trim_start().len();
    indent > 4
}

/// Locate 0-based line indices that start a new chunk unit. A decorator line
/// immediately preceding a boundary is folded into that boundary (the
/// decorator becomes part of "the start of the following definition").
fn find_boundaries(lines: &[&str], ext: &str) -> Vec<usize> {
    let Some(&table_idx) = ext_index().get(ext) else { return Vec::new() };
    let patterns = &compiled_patterns()[table_idx];
    let is_python = ext == "py";

    let mut boundaries = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if is_python && python_indent_excluded(line) {
            continue;
        }
        if is_boundary(line, patterns) {
            // Walk back over contiguous decorator lines (Python `@foo`, and
            // other languages' attribute-like prefixes aren't modeled here,
            // the decorator case is the one spec.md calls out explicitly).
            let mut start = i;
            while start > 0 {
                let prev = lines[start - 1].trim_start();
                if prev.starts_with('@') {
                    start -= 1;
                } else {
                    break;
                }
            }
            if boundaries.last() != Some(&start) {
                boundaries.push(start);
            }
        }
    }
    boundaries
}

/// Split a single oversized unit by line, carrying a small line-level
/// overlap between the pieces.
fn split_oversized_unit(lines: &[&str], start_line_1based: usize, max_chunk_size: usize, chunk_overlap: usize) -> Vec<ChunkWithLines> {
    let overlap_lines = {
        let avg_line_len = lines.iter().map(|l| l.len() + 1).sum::<usize>().max(1) / lines.len().max(1);
        (chunk_overlap / avg_line_len.max(1)).max(1).min(lines.len().saturating_sub(1))
    };

    let mut out = Vec::new();
    let mut i = 0usize;
    while i < lines.len() {
        let mut j = i;
        let mut size = 0usize;
        while j < lines.len() && (size == 0 || size + lines[j].len() + 1 <= max_chunk_size) {
            size += lines[j].len() + 1;
            j += 1;
        }
        let text = lines[i..j].join("\n");
        let start_line = start_line_1based + i;
        let end_line = start_line_1based + j - 1;
        out.push(ChunkWithLines::new(start_line, end_line, text));
        if j >= lines.len() {
            break;
        }
        i = j.saturating_sub(overlap_lines).max(i + 1);
    }
    out
}

/// Chunk `text` (already known to be of language `ext`, lowercase, no dot)
/// using the heuristic boundary table. Returns `None` via the caller's
/// dispatch (`mod.rs`) when `ext` has no table entry — this function itself
/// assumes a table entry exists and produces a single whole-file chunk if
/// no boundaries are found at all (mirrors the AST strategy's behavior for
/// a file with no recognizable top-level definitions).
pub fn chunk(text: &str, ext: &str, config: &ChunkerConfig) -> Result<Vec<ChunkWithLines>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let lines: Vec<&str> = text.lines().collect();
    let boundaries = find_boundaries(&lines, ext);

    // Unit ranges: [boundary[i], boundary[i+1]) in 0-based line indices;
    // anything before the first boundary is its own leading unit.
    let mut unit_starts = Vec::new();
    if boundaries.first() != Some(&0) {
        unit_starts.push(0);
    }
    unit_starts.extend(boundaries);
    if unit_starts.is_empty() {
        unit_starts.push(0);
    }

    let mut units: Vec<(usize, usize)> = Vec::new();
    for w in 0..unit_starts.len() {
        let start = unit_starts[w];
        let end = if w + 1 < unit_starts.len() { unit_starts[w + 1] } else { lines.len() };
        if end > start {
            units.push((start, end));
        }
    }

    let mut chunks: Vec<ChunkWithLines> = Vec::new();
    let mut cur_start: Option<usize> = None;
    let mut cur_end = 0usize;
    let mut cur_size = 0usize;

    let flush = |chunks: &mut Vec<ChunkWithLines>, start: usize, end: usize| {
        let text = lines[start..end].join("\n");
        chunks.push(ChunkWithLines::new(start + 1, end, text));
    };

    for (start, end) in units {
        let unit_size: usize = lines[start..end].iter().map(|l| l.len() + 1).sum();

        if unit_size > config.max_chunk_size {
            if let Some(s) = cur_start.take() {
                flush(&mut chunks, s, cur_end);
                cur_size = 0;
            }
            let piece_lines = &lines[start..end];
            chunks.extend(split_oversized_unit(piece_lines, start + 1, config.max_chunk_size, config.chunk_overlap));
            continue;
        }

        match cur_start {
            None => {
                cur_start = Some(start);
                cur_end = end;
                cur_size = unit_size;
            }
            Some(s) => {
                if cur_size + unit_size <= config.chunk_size {
                    cur_end = end;
                    cur_size += unit_size;
                } else {
                    flush(&mut chunks, s, cur_end);
                    cur_start = Some(start);
                    cur_end = end;
                    cur_size = unit_size;
                }
            }
        }
    }
    if let Some(s) = cur_start {
        flush(&mut chunks, s, cur_end);
    }

    if chunks.len() > config.max_chunks_per_file {
        return Err(crate::error::Error::ChunkCapExceeded {
            path: Default::default(),
            count: chunks.len(),
            limit: config.max_chunks_per_file,
        });
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: 200,
            chunk_overlap: 20,
            max_chunk_size: 400,
            max_chunks_per_file: 1000,
            separators: vec!["\n\n".into(), "\n".into(), " ".into(), "".into()],
            include_header_path: true,
        }
    }

    #[test]
    fn supports_known_extensions_only() {
        assert!(supports_extension("rs"));
        assert!(supports_extension("PY"));
        assert!(!supports_extension("xyzzy"));
    }

    #[test]
    fn rust_functions_become_separate_units_when_small_chunk_size() {
        let text = "fn a() {\n    1;\n}\n\nfn b() {\n    2;\n}\n";
        let tight = ChunkerConfig { chunk_size: 5, ..cfg() };
        let chunks = chunk(text, "rs", &tight).unwrap();
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn decorator_stays_attached_to_following_def() {
        let text = "@app.route('/x')\ndef handler():\n    return 1\n";
        let chunks = chunk(text, "py", &cfg()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
        assert!(chunks[0].text.starts_with("@app.route"));
    }

    #[test]
    fn python_nested_def_does_not_split_enclosing_function() {
        let text = "def outer():\n    def inner():\n        return 1\n    return inner()\n";
        let chunks = chunk(text, "py", &cfg()).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn no_boundaries_yields_single_whole_file_chunk() {
        let text = "x = 1\ny = 2\n";
        let chunks = chunk(text, "py", &cfg()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line, 1);
    }

    #[test]
    fn oversized_unit_is_line_split_with_overlap() {
        let body = (0..100).map(|i| format!("    line{i} = {i}")).collect::<Vec<_>>().join("\n");
        let text = format!("def big():\n{body}\n");
        let small_max = ChunkerConfig { max_chunk_size: 300, ..cfg() };
        let chunks = chunk(&text, "py", &small_max).unwrap();
        assert!(chunks.len() > 1);
        for w in chunks.windows(2) {
            assert!(w[1].start_line <= w[0].end_line, "adjacent pieces should overlap or touch");
        }
    }

    #[test]
    fn empty_file_yields_zero_chunks() {
        assert!(chunk("", "rs", &cfg()).unwrap().is_empty());
    }
}
