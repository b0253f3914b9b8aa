//! Disk-backed BM25 full-text index via `tantivy`.
//!
//! Grounded directly on `geckse-markdown-vdb`'s `fts.rs`: same schema shape
//! (`chunk_id`/`source_path` as `STRING | STORED`, `content`/`heading` as
//! English-stemmed indexed text with a field boost on the heading field),
//! same `parking_lot::Mutex<IndexWriter>` wrapper, same delete-by-term then
//! re-add upsert strategy, same lenient query parser.

use std::path::Path;

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::{Index, IndexWriter, ReloadPolicy, TantivyDocument};

use crate::error::Error;
use crate::fts::{FtsBackend, FtsDoc, FtsHit, FtsStats};

const HEAP_SIZE_BYTES: usize = 50_000_000;
const HEADING_BOOST: f32 = 1.5;

struct Fields {
    chunk_id: Field,
    source_path: Field,
    content: Field,
    heading: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut builder = Schema::builder();
    let chunk_id = builder.add_text_field("chunk_id", STRING | STORED);
    let source_path = builder.add_text_field("source_path", STRING | STORED);

    let indexing = TextFieldIndexing::default().set_tokenizer("en_stem").set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let text_options = TextOptions::default().set_indexing_options(indexing);
    let content = builder.add_text_field("content", text_options.clone());
    let heading = builder.add_text_field("heading", text_options);

    let schema = builder.build();
    (schema, Fields { chunk_id, source_path, content, heading })
}

pub struct Bm25Index {
    index: Index,
    fields: Fields,
    writer: parking_lot::Mutex<IndexWriter>,
}

impl Bm25Index {
    pub fn open_or_create(dir: &Path) -> crate::error::Result<Self> {
        let (schema, fields) = build_schema();

        let index = if dir.exists() && dir.join("meta.json").exists() {
            Index::open_in_dir(dir).map_err(|e| Error::Fts(e.to_string()))?
        } else {
            std::fs::create_dir_all(dir)?;
            Index::create_in_dir(dir, schema).map_err(|e| Error::Fts(e.to_string()))?
        };

        let writer = index.writer(HEAP_SIZE_BYTES).map_err(|e| Error::Fts(e.to_string()))?;

        Ok(Self { index, fields, writer: parking_lot::Mutex::new(writer) })
    }

    fn commit(&self) -> crate::error::Result<()> {
        let mut writer = self.writer.lock();
        writer.commit().map_err(|e| Error::Fts(e.to_string()))?;
        Ok(())
    }
}

impl FtsBackend for Bm25Index {
    fn add_chunks(&self, path: &str, docs: &[FtsDoc]) -> crate::error::Result<()> {
        {
            let writer = self.writer.lock();
            let term = tantivy::Term::from_field_text(self.fields.source_path, path);
            writer.delete_term(term);

            for doc in docs {
                let mut tdoc = TantivyDocument::new();
                tdoc.add_text(self.fields.chunk_id, &doc.chunk_id);
                tdoc.add_text(self.fields.source_path, &doc.path);
                tdoc.add_text(self.fields.content, &doc.content);
                tdoc.add_text(self.fields.heading, &doc.heading);
                writer.add_document(tdoc).map_err(|e| Error::Fts(e.to_string()))?;
            }
        }
        self.commit()
    }

    fn remove_by_path(&self, path: &str) -> crate::error::Result<()> {
        {
            let writer = self.writer.lock();
            let term = tantivy::Term::from_field_text(self.fields.source_path, path);
            writer.delete_term(term);
        }
        self.commit()
    }

    fn search(&self, query: &str, limit: usize) -> crate::error::Result<Vec<FtsHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| Error::Fts(e.to_string()))?;
        let searcher = reader.searcher();

        let mut parser = QueryParser::for_index(&self.index, vec![self.fields.content, self.fields.heading]);
        parser.set_field_boost(self.fields.heading, HEADING_BOOST);
        let (parsed, _errors) = parser.parse_query_lenient(query);

        let top = searcher.search(&parsed, &TopDocs::with_limit(limit)).map_err(|e| Error::Fts(e.to_string()))?;

        let mut results = Vec::with_capacity(top.len());
        for (score, addr) in top {
            let doc: TantivyDocument = searcher.doc(addr).map_err(|e| Error::Fts(e.to_string()))?;
            if let Some(tantivy::schema::OwnedValue::Str(chunk_id)) = doc.get_first(self.fields.chunk_id) {
                results.push(FtsHit { chunk_id: chunk_id.clone(), score });
            }
        }
        Ok(results)
    }

    fn stats(&self) -> crate::error::Result<FtsStats> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| Error::Fts(e.to_string()))?;
        let document_count = reader.searcher().num_docs();
        Ok(FtsStats { document_count, backend: "bm25" })
    }

    fn serialize(&self) -> crate::error::Result<Vec<u8>> {
        // BM25 persists itself to `dir` via tantivy's own segment files; the
        // caller doesn't need an in-memory snapshot, just confirmation the
        // writer is flushed.
        self.commit()?;
        Ok(Vec::new())
    }

    fn clear(&self) -> crate::error::Result<()> {
        {
            let writer = self.writer.lock();
            writer.delete_all_documents().map_err(|e| Error::Fts(e.to_string()))?;
        }
        self.commit()
    }

    fn close(&self) -> crate::error::Result<()> {
        self.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, path: &str, content: &str) -> FtsDoc {
        FtsDoc { chunk_id: id.to_string(), path: path.to_string(), content: content.to_string(), heading: String::new() }
    }

    #[test]
    fn add_then_search_finds_match() {
        let dir = tempfile::tempdir().unwrap();
        let idx = Bm25Index::open_or_create(dir.path()).unwrap();
        idx.add_chunks("a.rs", &[doc("a.rs#0", "a.rs", "fn authenticate_user() {}")]).unwrap();

        let hits = idx.search("authenticate", 10).unwrap();
        assert!(hits.iter().any(|h| h.chunk_id == "a.rs#0"));
    }

    #[test]
    fn remove_by_path_drops_its_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let idx = Bm25Index::open_or_create(dir.path()).unwrap();
        idx.add_chunks("a.rs", &[doc("a.rs#0", "a.rs", "fn authenticate_user() {}")]).unwrap();
        idx.remove_by_path("a.rs").unwrap();

        let hits = idx.search("authenticate", 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn empty_query_returns_no_hits() {
        let dir = tempfile::tempdir().unwrap();
        let idx = Bm25Index::open_or_create(dir.path()).unwrap();
        assert!(idx.search("   ", 10).unwrap().is_empty());
    }

    #[test]
    fn stats_reports_backend_name() {
        let dir = tempfile::tempdir().unwrap();
        let idx = Bm25Index::open_or_create(dir.path()).unwrap();
        assert_eq!(idx.stats().unwrap().backend, "bm25");
    }
}
