//! Markdown-header chunker (spec.md §4.4): splits on ATX (`#`) and setext
//! (`===`/`---` underline) headers, tracking a header-stack breadcrumb so
//! each chunk carries its full section path. Frontmatter is skipped; fenced
//! code blocks are scanned over (a `#` inside one is not a header). Sections
//! longer than `max_chunk_size` are paragraph-split with a continuation
//! prefix and `part`/`total_parts` metadata.
//!
//! Grounded on `geckse-markdown-vdb`'s `fts.rs` `heading_hierarchy` field —
//! this module builds the hierarchy that field assumes already exists.

use crate::chunk::{ChunkMetadata, ChunkWithLines};
use crate::config::ChunkerConfig;
use crate::error::Result;

struct Section {
    breadcrumb: Vec<String>,
    /// The section's own header line, verbatim (e.g. `"## B"`), `None` for
    /// the untitled preamble before the first header.
    header_line: Option<String>,
    /// 1-based line of the header itself (or of `body_start_line` when
    /// there is no header, for the leading preamble section).
    start_line: usize,
    /// 1-based line where the body content begins, i.e. just after the
    /// header line(s).
    body_start_line: usize,
    end_line: usize,
    body_lines: Vec<String>,
}

fn strip_frontmatter(lines: &[&str]) -> usize {
    if lines.first() != Some(&"---") {
        return 0;
    }
    for (i, line) in lines.iter().enumerate().skip(1) {
        if *line == "---" {
            return i + 1;
        }
    }
    0
}

fn atx_level(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = trimmed[hashes..].trim_start();
    if rest.is_empty() && trimmed.len() == hashes {
        return None;
    }
    // Require a space (or EOL) after the hashes to avoid matching `#comment`.
    if trimmed.as_bytes().get(hashes).map(|b| *b == b' ').unwrap_or(true) {
        Some((hashes, rest.trim_end_matches('#').trim_end()))
    } else {
        None
    }
}

fn is_setext_underline(line: &str) -> Option<usize> {
    let t = line.trim();
    if t.is_empty() {
        return None;
    }
    if t.chars().all(|c| c == '=') {
        Some(1)
    } else if t.chars().all(|c| c == '-') && t.len() >= 2 {
        Some(2)
    } else {
        None
    }
}

/// Parse the document into a flat list of sections, each carrying the full
/// header breadcrumb active at that point (e.g. `["Guide", "Setup", "Linux"]`).
fn parse_sections(text: &str) -> Vec<Section> {
    let lines: Vec<&str> = text.lines().collect();
    let body_start = strip_frontmatter(&lines);

    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut sections: Vec<Section> = Vec::new();
    let mut in_fence = false;
    let mut fence_marker = "";

    let mut cur_body: Vec<String> = Vec::new();
    let mut cur_header_start = body_start + 1;
    let mut cur_body_start = body_start + 1;
    let mut cur_header_line: Option<String> = None;

    let push_section = |sections: &mut Vec<Section>,
                         stack: &[(usize, String)],
                         header_line: Option<String>,
                         header_start: usize,
                         body: Vec<String>,
                         body_start: usize,
                         end: usize| {
        if header_line.is_none() && body.iter().all(|l| l.trim().is_empty()) && sections.is_empty() {
            return;
        }
        sections.push(Section {
            breadcrumb: stack.iter().map(|(_, h)| h.clone()).collect(),
            header_line,
            start_line: header_start,
            body_start_line: body_start,
            end_line: end,
            body_lines: body,
        });
    };

    let mut i = body_start;
    while i < lines.len() {
        let line = lines[i];
        let line_no = i + 1;

        if in_fence {
            cur_body.push(line.to_string());
            let trimmed = line.trim_start();
            if trimmed.starts_with(fence_marker) && !fence_marker.is_empty() {
                in_fence = false;
            }
            i += 1;
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = true;
            fence_marker = if trimmed.starts_with("```") { "```" } else { "~~~" };
            cur_body.push(line.to_string());
            i += 1;
            continue;
        }

        if let Some((level, title)) = atx_level(line) {
            if cur_header_line.is_some() || !cur_body.is_empty() || !sections.is_empty() {
                push_section(
                    &mut sections,
                    &stack,
                    std::mem::take(&mut cur_header_line),
                    cur_header_start,
                    std::mem::take(&mut cur_body),
                    cur_body_start,
                    line_no.saturating_sub(1).max(cur_body_start),
                );
            }
            while stack.last().map(|(l, _)| *l >= level).unwrap_or(false) {
                stack.pop();
            }
            stack.push((level, title.to_string()));
            cur_header_line = Some(line.trim().to_string());
            cur_header_start = line_no;
            cur_body_start = line_no + 1;
            i += 1;
            continue;
        }

        // Setext: current line is the title, next non-blank line is `===`/`---`.
        if i + 1 < lines.len() {
            if let Some(level) = is_setext_underline(lines[i + 1]) {
                if !line.trim().is_empty() {
                    if cur_header_line.is_some() || !cur_body.is_empty() || !sections.is_empty() {
                        push_section(
                            &mut sections,
                            &stack,
                            std::mem::take(&mut cur_header_line),
                            cur_header_start,
                            std::mem::take(&mut cur_body),
                            cur_body_start,
                            line_no.saturating_sub(1).max(cur_body_start),
                        );
                    }
                    while stack.last().map(|(l, _)| *l >= level).unwrap_or(false) {
                        stack.pop();
                    }
                    stack.push((level, line.trim().to_string()));
                    cur_header_line = Some(format!("{}\n{}", line.trim(), lines[i + 1].trim()));
                    cur_header_start = line_no;
                    cur_body_start = line_no + 2;
                    i += 2;
                    continue;
                }
            }
        }

        cur_body.push(line.to_string());
        i += 1;
    }

    if cur_header_line.is_some() || !cur_body.is_empty() || sections.is_empty() {
        push_section(&mut sections, &stack, cur_header_line, cur_header_start, cur_body, cur_body_start, lines.len());
    }

    sections
}

/// The breadcrumb of *ancestor* headers, excluding the section's own header
/// (which is rendered literally instead, e.g. `## B`), bracketed per
/// spec.md §4.4/§8 (`[a > b > c]`). `None` when there is no ancestor chain
/// to show.
fn bracketed_parent_breadcrumb(section: &Section) -> Option<String> {
    let parents: &[String] = if section.header_line.is_some() && !section.breadcrumb.is_empty() {
        &section.breadcrumb[..section.breadcrumb.len() - 1]
    } else {
        &section.breadcrumb[..]
    };
    if parents.is_empty() {
        None
    } else {
        Some(format!("[{}]", parents.join(" > ")))
    }
}

/// Split an oversized section body into paragraph-bounded pieces, each
/// prefixed with `[breadcrumb]\n<header> (continued)` and carrying
/// `part`/`total_parts` metadata.
fn split_oversized_section(section: &Section, config: &ChunkerConfig) -> Vec<(String, usize, usize, usize, usize)> {
    let breadcrumb_line = if config.include_header_path { bracketed_parent_breadcrumb(section) } else { None };

    let mut paragraphs: Vec<(usize, Vec<String>)> = Vec::new();
    let mut cur: Vec<String> = Vec::new();
    let mut cur_start_offset = 0usize;
    for (idx, line) in section.body_lines.iter().enumerate() {
        if line.trim().is_empty() && !cur.is_empty() {
            paragraphs.push((cur_start_offset, std::mem::take(&mut cur)));
        } else {
            if cur.is_empty() {
                cur_start_offset = idx;
            }
            cur.push(line.clone());
        }
    }
    if !cur.is_empty() {
        paragraphs.push((cur_start_offset, cur));
    }

    let build_prefix = |continued: bool| -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(b) = &breadcrumb_line {
            parts.push(b.clone());
        }
        if let Some(h) = &section.header_line {
            parts.push(if continued { format!("{h} (continued)") } else { h.clone() });
        }
        if parts.is_empty() {
            String::new()
        } else {
            format!("{}\n\n", parts.join("\n"))
        }
    };

    let mut pieces: Vec<(String, usize, usize)> = Vec::new();
    let mut batch: Vec<&(usize, Vec<String>)> = Vec::new();
    let mut batch_size = build_prefix(!pieces.is_empty()).len();

    let flush = |batch: &mut Vec<&(usize, Vec<String>)>, batch_size: &mut usize, pieces: &mut Vec<(String, usize, usize)>| {
        if batch.is_empty() {
            return;
        }
        let prefix = build_prefix(!pieces.is_empty());
        let first_offset = batch[0].0;
        let last = batch.last().unwrap();
        let last_offset = last.0 + last.1.len().saturating_sub(1);
        let body = batch.iter().map(|(_, lines)| lines.join("\n")).collect::<Vec<_>>().join("\n\n");
        pieces.push((format!("{prefix}{body}"), first_offset, last_offset));
        batch.clear();
        *batch_size = build_prefix(true).len();
    };

    for p in &paragraphs {
        let p_size: usize = p.1.iter().map(|l| l.len() + 1).sum();
        if batch_size + p_size > config.max_chunk_size && !batch.is_empty() {
            flush(&mut batch, &mut batch_size, &mut pieces);
        }
        batch.push(p);
        batch_size += p_size;
    }
    flush(&mut batch, &mut batch_size, &mut pieces);

    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, (text, first_off, last_off))| {
            let start = if i == 0 { section.start_line } else { section.body_start_line + first_off };
            (text, start, section.body_start_line + last_off, i + 1, total)
        })
        .collect()
}

pub fn chunk(text: &str, config: &ChunkerConfig) -> Result<Vec<ChunkWithLines>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let sections = parse_sections(text);
    let mut chunks = Vec::new();

    for section in &sections {
        let body_size: usize = section.body_lines.iter().map(|l| l.len() + 1).sum();

        let header_path = if config.include_header_path { bracketed_parent_breadcrumb(section) } else { None };

        if body_size <= config.max_chunk_size {
            let mut text = section.body_lines.join("\n");
            if let Some(h) = &section.header_line {
                text = format!("{h}\n\n{text}");
            }
            if let Some(path) = &header_path {
                text = format!("{path}\n{text}");
            }
            let meta = ChunkMetadata { tags: section.breadcrumb.clone(), ..Default::default() };
            chunks.push(ChunkWithLines::new(section.start_line.max(1), section.end_line.max(section.start_line), text).with_metadata(meta));
        } else {
            for (piece_text, start, end, part, total_parts) in split_oversized_section(section, config) {
                let meta = ChunkMetadata {
                    tags: section.breadcrumb.clone(),
                    part: Some(part),
                    total_parts: Some(total_parts),
                    ..Default::default()
                };
                chunks.push(ChunkWithLines::new(start.max(1), end.max(start), piece_text).with_metadata(meta));
            }
        }
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
            chunk_size: 4000,
            chunk_overlap: 200,
            max_chunk_size: 200,
            max_chunks_per_file: 1000,
            separators: vec!["\n\n".into(), "\n".into(), " ".into(), "".into()],
            include_header_path: true,
        }
    }

    #[test]
    fn empty_doc_yields_zero_chunks() {
        assert!(chunk("", &cfg()).unwrap().is_empty());
    }

    #[test]
    fn frontmatter_is_skipped() {
        let text = "---\ntitle: x\n---\n# Heading\n\nbody text here\n";
        let chunks = chunk(text, &cfg()).unwrap();
        assert!(!chunks.iter().any(|c| c.text.contains("title: x")));
    }

    #[test]
    fn header_breadcrumb_is_tracked_across_nesting() {
        let text = "# Guide\n\nintro\n\n## Setup\n\nsetup body\n\n### Linux\n\nlinux body\n";
        let chunks = chunk(text, &cfg()).unwrap();
        let linux_chunk = chunks.iter().find(|c| c.text.contains("linux body")).unwrap();
        let tags = &linux_chunk.metadata.as_ref().unwrap().tags;
        assert_eq!(tags, &vec!["Guide".to_string(), "Setup".to_string(), "Linux".to_string()]);
    }

    #[test]
    fn fenced_code_block_hash_is_not_a_header() {
        let text = "# Real Header\n\n```\n# not a header\n```\n\nafter fence\n";
        let chunks = chunk(text, &cfg()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("# not a header"));
    }

    #[test]
    fn setext_header_is_detected() {
        let text = "Title\n=====\n\nbody\n";
        let chunks = chunk(text, &cfg()).unwrap();
        assert!(chunks[0].metadata.as_ref().unwrap().tags.contains(&"Title".to_string()));
    }

    #[test]
    fn nested_section_text_carries_bracketed_parent_breadcrumb_and_own_header() {
        let text = "---\ntitle: x\n---\n# A\n\nhi\n\n## B\n\nho\n";
        let chunks = chunk(text, &cfg()).unwrap();
        assert_eq!(chunks.len(), 2);

        let b_chunk = chunks.iter().find(|c| c.text.contains("ho")).unwrap();
        let tags = &b_chunk.metadata.as_ref().unwrap().tags;
        assert_eq!(tags, &vec!["A".to_string(), "B".to_string()]);
        assert!(b_chunk.text.contains("[A]"), "text should carry the bracketed parent breadcrumb: {:?}", b_chunk.text);
        assert!(b_chunk.text.contains("## B"), "text should carry its own header line: {:?}", b_chunk.text);
    }

    #[test]
    fn oversized_section_gets_part_metadata() {
        let long_body = (0..30).map(|i| format!("paragraph {i} with some extra words to grow it")).collect::<Vec<_>>().join("\n\n");
        let text = format!("# Big Section\n\n{long_body}\n");
        let chunks = chunk(&text, &cfg()).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            let meta = c.metadata.as_ref().unwrap();
            assert!(meta.part.is_some());
            assert!(meta.total_parts.unwrap() >= meta.part.unwrap());
        }
    }
}
