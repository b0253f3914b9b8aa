//! AST-driven chunker (spec.md §4.4): tree-sitter parses the file, a
//! per-language driver locates top-level definitions (functions, types,
//! classes, methods), and each definition becomes its own chunk carrying
//! recovered metadata. Gaps between definitions (imports, module-level
//! constants, leading comments) are grouped into their own chunks the same
//! way the heuristic strategy groups units. A definition whose node is
//! larger than `max_chunk_size` falls back to the character-recursive
//! splitter for just that span, preserving the absolute line offset.
//!
//! Grounded on the teacher's `inspector.rs` `LanguageDriver` trait and its
//! per-language tree-sitter query implementations, generalized from
//! symbol-extraction (`extract_skeleton` -> `Vec<Symbol>`) into
//! chunk+metadata emission.

use std::path::Path;
use std::sync::OnceLock;

use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator};

use crate::chunk::{ChunkMetadata, ChunkType, ChunkWithLines};
use crate::chunker::character;
use crate::config::ChunkerConfig;
use crate::error::{Error, Result};

/// A single top-level definition recovered from the AST, in absolute
/// 0-indexed line coordinates (tree-sitter's native convention).
struct Definition {
    chunk_type: ChunkType,
    name: String,
    start_line: usize,
    end_line: usize,
    start_byte: usize,
    end_byte: usize,
    signature: Option<String>,
    is_async: bool,
}

pub trait LanguageDriver: Send + Sync {
    fn extensions(&self) -> &'static [&'static str];
    fn language(&self, ext: &str) -> Language;
    fn find_definitions(&self, source: &[u8], root: Node, language: &Language) -> Result<Vec<Definition>>;
}

fn node_text<'a>(source: &'a [u8], node: Node) -> &'a str {
    std::str::from_utf8(&source[node.start_byte()..node.end_byte()]).unwrap_or("")
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").trim().to_string()
}

fn run_query(source: &[u8], root: Node, language: &Language, query_src: &str, chunk_type: ChunkType) -> Result<Vec<Definition>> {
    let query = Query::new(language, query_src).map_err(|e| Error::ModelInit(format!("bad tree-sitter query: {e}")))?;
    let mut cursor = QueryCursor::new();
    let mut out = Vec::new();

    let mut matches = cursor.matches(&query, root, source);
    while let Some(m) = matches.next() {
        let mut name_node: Option<Node> = None;
        let mut def_node: Option<Node> = None;
        for cap in m.captures {
            match query.capture_names()[cap.index as usize] {
                "name" => name_node = Some(cap.node),
                "def" => def_node = Some(cap.node),
                _ => {}
            }
        }
        let Some(name_node) = name_node else { continue };
        let def_node = def_node.unwrap_or(name_node);
        let name = node_text(source, name_node).trim().to_string();
        if name.is_empty() {
            continue;
        }
        let sig = first_line(node_text(source, def_node));
        out.push(Definition {
            chunk_type,
            name,
            start_line: def_node.start_position().row,
            end_line: def_node.end_position().row,
            start_byte: def_node.start_byte(),
            end_byte: def_node.end_byte(),
            is_async: sig.contains("async"),
            signature: Some(sig),
        });
    }
    Ok(out)
}

struct RustDriver;
impl LanguageDriver for RustDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }
    fn language(&self, _ext: &str) -> Language {
        tree_sitter_rust::language()
    }
    fn find_definitions(&self, source: &[u8], root: Node, language: &Language) -> Result<Vec<Definition>> {
        let mut defs = Vec::new();
        defs.extend(run_query(source, root, language, r#"(function_item name: (identifier) @name) @def"#, ChunkType::Function)?);
        defs.extend(run_query(source, root, language, r#"(struct_item name: (type_identifier) @name) @def"#, ChunkType::Struct)?);
        defs.extend(run_query(source, root, language, r#"(enum_item name: (type_identifier) @name) @def"#, ChunkType::Enum)?);
        defs.extend(run_query(source, root, language, r#"(trait_item name: (type_identifier) @name) @def"#, ChunkType::Trait)?);
        defs.extend(run_query(source, root, language, r#"(impl_item type: (type_identifier) @name) @def"#, ChunkType::Impl)?);
        defs.extend(run_query(source, root, language, r#"(mod_item name: (identifier) @name) @def"#, ChunkType::Module)?);
        Ok(defs)
    }
}

struct TypeScriptDriver;
impl LanguageDriver for TypeScriptDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"]
    }
    fn language(&self, ext: &str) -> Language {
        if ext == "tsx" || ext == "jsx" {
            tree_sitter_typescript::language_tsx()
        } else {
            tree_sitter_typescript::language_typescript()
        }
    }
    fn find_definitions(&self, source: &[u8], root: Node, language: &Language) -> Result<Vec<Definition>> {
        let mut defs = Vec::new();
        defs.extend(run_query(source, root, language, r#"(function_declaration name: (identifier) @name) @def"#, ChunkType::Function)?);
        defs.extend(run_query(
            source,
            root,
            language,
            r#"(lexical_declaration (variable_declarator name: (identifier) @name value: (arrow_function))) @def"#,
            ChunkType::Function,
        )?);
        defs.extend(run_query(source, root, language, r#"(class_declaration name: (type_identifier) @name) @def"#, ChunkType::Class)?);
        defs.extend(run_query(source, root, language, r#"(interface_declaration name: (type_identifier) @name) @def"#, ChunkType::Interface)?);
        defs.extend(run_query(source, root, language, r#"(method_definition name: (property_identifier) @name) @def"#, ChunkType::Method)?);
        defs.extend(run_query(source, root, language, r#"(enum_declaration name: (identifier) @name) @def"#, ChunkType::Enum)?);
        Ok(defs)
    }
}

struct PythonDriver;
impl LanguageDriver for PythonDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }
    fn language(&self, _ext: &str) -> Language {
        tree_sitter_python::language()
    }
    fn find_definitions(&self, source: &[u8], root: Node, language: &Language) -> Result<Vec<Definition>> {
        let mut defs = Vec::new();
        defs.extend(run_query(source, root, language, r#"(function_definition name: (identifier) @name) @def"#, ChunkType::Function)?);
        defs.extend(run_query(source, root, language, r#"(class_definition name: (identifier) @name) @def"#, ChunkType::Class)?);
        Ok(defs)
    }
}

#[cfg(feature = "lang-go")]
struct GoDriver;
#[cfg(feature = "lang-go")]
impl LanguageDriver for GoDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["go"]
    }
    fn language(&self, _ext: &str) -> Language {
        tree_sitter_go::language()
    }
    fn find_definitions(&self, source: &[u8], root: Node, language: &Language) -> Result<Vec<Definition>> {
        let mut defs = Vec::new();
        defs.extend(run_query(source, root, language, r#"(function_declaration name: (identifier) @name) @def"#, ChunkType::Function)?);
        defs.extend(run_query(source, root, language, r#"(method_declaration name: (field_identifier) @name) @def"#, ChunkType::Method)?);
        defs.extend(run_query(source, root, language, r#"(type_spec name: (type_identifier) @name) @def"#, ChunkType::Type)?);
        Ok(defs)
    }
}

#[cfg(feature = "lang-java")]
struct JavaDriver;
#[cfg(feature = "lang-java")]
impl LanguageDriver for JavaDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["java"]
    }
    fn language(&self, _ext: &str) -> Language {
        tree_sitter_java::language()
    }
    fn find_definitions(&self, source: &[u8], root: Node, language: &Language) -> Result<Vec<Definition>> {
        let mut defs = Vec::new();
        defs.extend(run_query(source, root, language, r#"(class_declaration name: (identifier) @name) @def"#, ChunkType::Class)?);
        defs.extend(run_query(source, root, language, r#"(interface_declaration name: (identifier) @name) @def"#, ChunkType::Interface)?);
        defs.extend(run_query(source, root, language, r#"(method_declaration name: (identifier) @name) @def"#, ChunkType::Method)?);
        defs.extend(run_query(source, root, language, r#"(enum_declaration name: (identifier) @name) @def"#, ChunkType::Enum)?);
        Ok(defs)
    }
}

#[cfg(feature = "lang-csharp")]
struct CSharpDriver;
#[cfg(feature = "lang-csharp")]
impl LanguageDriver for CSharpDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["cs"]
    }
    fn language(&self, _ext: &str) -> Language {
        tree_sitter_c_sharp::language()
    }
    fn find_definitions(&self, source: &[u8], root: Node, language: &Language) -> Result<Vec<Definition>> {
        let mut defs = Vec::new();
        defs.extend(run_query(source, root, language, r#"(class_declaration name: (identifier) @name) @def"#, ChunkType::Class)?);
        defs.extend(run_query(source, root, language, r#"(interface_declaration name: (identifier) @name) @def"#, ChunkType::Interface)?);
        defs.extend(run_query(source, root, language, r#"(method_declaration name: (identifier) @name) @def"#, ChunkType::Method)?);
        defs.extend(run_query(source, root, language, r#"(struct_declaration name: (identifier) @name) @def"#, ChunkType::Struct)?);
        Ok(defs)
    }
}

#[cfg(feature = "lang-c")]
struct CDriver;
#[cfg(feature = "lang-c")]
impl LanguageDriver for CDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["c", "h"]
    }
    fn language(&self, _ext: &str) -> Language {
        tree_sitter_c::language()
    }
    fn find_definitions(&self, source: &[u8], root: Node, language: &Language) -> Result<Vec<Definition>> {
        run_query(
            source,
            root,
            language,
            r#"(function_definition declarator: (function_declarator declarator: (identifier) @name)) @def"#,
            ChunkType::Function,
        )
    }
}

#[cfg(feature = "lang-cpp")]
struct CppDriver;
#[cfg(feature = "lang-cpp")]
impl LanguageDriver for CppDriver {
    fn extensions(&self) -> &'static [&'static str] {
        &["cpp", "cc", "cxx", "hpp"]
    }
    fn language(&self, _ext: &str) -> Language {
        tree_sitter_cpp::language()
    }
    fn find_definitions(&self, source: &[u8], root: Node, language: &Language) -> Result<Vec<Definition>> {
        let mut defs = Vec::new();
        defs.extend(run_query(
            source,
            root,
            language,
            r#"(function_definition declarator: (function_declarator declarator: (identifier) @name)) @def"#,
            ChunkType::Function,
        )?);
        defs.extend(run_query(source, root, language, r#"(class_specifier name: (type_identifier) @name) @def"#, ChunkType::Class)?);
        defs.extend(run_query(source, root, language, r#"(struct_specifier name: (type_identifier) @name) @def"#, ChunkType::Struct)?);
        Ok(defs)
    }
}

fn drivers() -> &'static Vec<Box<dyn LanguageDriver>> {
    static DRIVERS: OnceLock<Vec<Box<dyn LanguageDriver>>> = OnceLock::new();
    DRIVERS.get_or_init(|| {
        let mut v: Vec<Box<dyn LanguageDriver>> = vec![Box::new(RustDriver), Box::new(TypeScriptDriver), Box::new(PythonDriver)];
        #[cfg(feature = "lang-go")]
        v.push(Box::new(GoDriver));
        #[cfg(feature = "lang-java")]
        v.push(Box::new(JavaDriver));
        #[cfg(feature = "lang-csharp")]
        v.push(Box::new(CSharpDriver));
        #[cfg(feature = "lang-c")]
        v.push(Box::new(CDriver));
        #[cfg(feature = "lang-cpp")]
        v.push(Box::new(CppDriver));
        v
    })
}

fn driver_for_ext(ext: &str) -> Option<&'static dyn LanguageDriver> {
    drivers().iter().find(|d| d.extensions().contains(&ext)).map(|b| b.as_ref())
}

pub fn supports_extension(ext: &str) -> bool {
    driver_for_ext(&ext.to_ascii_lowercase()).is_some()
}

fn gap_chunk(lines: &[&str], start_0: usize, end_0: usize) -> Option<ChunkWithLines> {
    if end_0 <= start_0 {
        return None;
    }
    if lines[start_0..end_0].iter().all(|l| l.trim().is_empty()) {
        return None;
    }
    let text = lines[start_0..end_0].join("\n");
    Some(ChunkWithLines::new(start_0 + 1, end_0, text).with_metadata(ChunkMetadata { chunk_type: Some(ChunkType::Other), ..Default::default() }))
}

/// Parse `text` as `ext` and emit one chunk per top-level definition plus
/// gap chunks for whatever falls between them. Returns `Ok(None)` when the
/// extension has no driver (caller should fall through to the heuristic
/// strategy) and `Ok(Some(..))` — possibly empty — otherwise.
pub fn chunk(text: &str, ext: &str, config: &ChunkerConfig) -> Result<Option<Vec<ChunkWithLines>>> {
    let ext = ext.to_ascii_lowercase();
    let Some(driver) = driver_for_ext(&ext) else { return Ok(None) };

    if text.trim().is_empty() {
        return Ok(Some(Vec::new()));
    }

    let language = driver.language(&ext);
    let mut parser = Parser::new();
    if parser.set_language(&language).is_err() {
        return Ok(None);
    }
    let Some(tree) = parser.parse(text, None) else { return Ok(None) };
    let source = text.as_bytes();

    let mut defs = driver.find_definitions(source, tree.root_node(), &language)?;
    if defs.is_empty() {
        return Ok(Some(Vec::new()));
    }
    defs.sort_by_key(|d| d.start_line);

    // Drop definitions fully nested inside an earlier, still-open one (e.g.
    // Rust methods inside an `impl` block are already covered by the impl's
    // own span unless we also emitted a `Method` kind — we don't, for the
    // languages above, so this is a pure non-overlap guarantee for safety).
    let mut top_level: Vec<Definition> = Vec::new();
    for def in defs {
        if let Some(last) = top_level.last() {
            if def.start_byte >= last.start_byte && def.end_byte <= last.end_byte {
                continue;
            }
        }
        top_level.push(def);
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut chunks: Vec<ChunkWithLines> = Vec::new();
    let mut cursor_line = 0usize;

    for def in &top_level {
        if let Some(gap) = gap_chunk(&lines, cursor_line, def.start_line) {
            chunks.push(gap);
        }

        let def_byte_len = def.end_byte.saturating_sub(def.start_byte);
        if def_byte_len > config.max_chunk_size {
            let def_text = &text[def.start_byte..def.end_byte];
            for piece in character::chunk(def_text, config)? {
                chunks.push(ChunkWithLines::new(
                    def.start_line + piece.start_line,
                    def.start_line + piece.end_line,
                    piece.text,
                ));
            }
        } else {
            let meta = ChunkMetadata {
                chunk_type: Some(def.chunk_type),
                name: Some(def.name.clone()),
                signature: def.signature.clone(),
                is_async: def.is_async,
                language: Some(ext.clone()),
                ..Default::default()
            };
            chunks.push(ChunkWithLines::new(def.start_line + 1, def.end_line + 1, text[def.start_byte..def.end_byte].to_string()).with_metadata(meta));
        }
        cursor_line = def.end_line + 1;
    }
    if let Some(gap) = gap_chunk(&lines, cursor_line, lines.len()) {
        chunks.push(gap);
    }

    if chunks.len() > config.max_chunks_per_file {
        return Err(Error::ChunkCapExceeded {
            path: Default::default(),
            count: chunks.len(),
            limit: config.max_chunks_per_file,
        });
    }

    Ok(Some(chunks))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ChunkerConfig {
        ChunkerConfig {
            chunk_size: 4000,
            chunk_overlap: 200,
            max_chunk_size: 8000,
            max_chunks_per_file: 1000,
            separators: vec!["\n\n".into(), "\n".into(), " ".into(), "".into()],
            include_header_path: true,
        }
    }

    #[test]
    fn unsupported_extension_returns_none() {
        assert!(chunk("whatever", "xyzzy", &cfg()).unwrap().is_none());
    }

    #[test]
    fn empty_rust_file_yields_zero_chunks() {
        assert_eq!(chunk("", "rs", &cfg()).unwrap().unwrap().len(), 0);
    }

    #[test]
    fn rust_functions_each_become_a_chunk() {
        let text = "fn a() {\n    1;\n}\n\nfn b() {\n    2;\n}\n";
        let chunks = chunk(text, "rs", &cfg()).unwrap().unwrap();
        let fn_chunks: Vec<_> = chunks
            .iter()
            .filter(|c| matches!(c.metadata.as_ref().and_then(|m| m.chunk_type), Some(ChunkType::Function)))
            .collect();
        assert_eq!(fn_chunks.len(), 2);
        assert_eq!(fn_chunks[0].metadata.as_ref().unwrap().name.as_deref(), Some("a"));
        assert_eq!(fn_chunks[1].metadata.as_ref().unwrap().name.as_deref(), Some("b"));
    }

    #[test]
    fn python_class_is_detected() {
        let text = "class Foo:\n    def bar(self):\n        return 1\n";
        let chunks = chunk(text, "py", &cfg()).unwrap().unwrap();
        assert!(chunks.iter().any(|c| matches!(c.metadata.as_ref().and_then(|m| m.chunk_type), Some(ChunkType::Class))));
    }

    #[test]
    fn file_with_no_definitions_yields_zero_chunks() {
        let text = "// just a comment\nlet x = 1;\n";
        let chunks = chunk(text, "rs", &cfg()).unwrap().unwrap();
        assert!(chunks.is_empty());
    }
}
