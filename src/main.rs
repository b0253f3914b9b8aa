//! Thin CLI wiring scan -> index -> query end to end, for manual smoke
//! testing of the library (SPEC_FULL.md §10). This binary is deliberately
//! peripheral: it owns the one concrete `VectorStore` implementation this
//! crate ships (a flat JSON file), since the library itself treats the
//! vector store as an external collaborator (spec.md §6) and never
//! provides one.
//!
//! Grounded on the teacher's own `main.rs` `clap`-derive `Cli` struct and
//! `indicatif` spinner usage, generalized from slicing flags to
//! index/query subcommands.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use codesearch_core::chunk::Chunk;
use codesearch_core::config::{load_config, HybridConfig, SearchMode};
use codesearch_core::embedder::{Domain, Embedder, Role};
use codesearch_core::fts;
use codesearch_core::hybrid_search::HybridSearcher;
use codesearch_core::index_manager::{IndexManager, RebuildMode};
use codesearch_core::query_expander;
use codesearch_core::query_intent;
use codesearch_core::ranker::{AdvancedRanker, RankCandidate};
use codesearch_core::scanner::{scan_workspace, ScanOptions};
use codesearch_core::vector_store::{VectorHit, VectorRecord, VectorStore};

#[derive(Debug, Parser)]
#[command(name = "codesearch")]
#[command(version)]
#[command(about = "Local, project-scoped hybrid code search index")]
struct Cli {
    /// Project root to operate on (defaults to the current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build or refresh the index for the project root.
    Index {
        /// Discard the existing index and rebuild from scratch.
        #[arg(long)]
        clean: bool,
    },
    /// Run a hybrid search query against an already-built index.
    Query {
        text: String,
        #[arg(long, value_enum, default_value = "hybrid")]
        mode: QueryMode,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum QueryMode {
    Vector,
    Fts,
    Hybrid,
}

impl From<QueryMode> for SearchMode {
    fn from(m: QueryMode) -> Self {
        match m {
            QueryMode::Vector => SearchMode::Vector,
            QueryMode::Fts => SearchMode::Fts,
            QueryMode::Hybrid => SearchMode::Hybrid,
        }
    }
}

/// A flat-file `VectorStore`: the whole record set round-trips through one
/// JSON file on `upsert`/persist. Fine for the single-writer, one-project
/// scale this CLI demonstrates; a real deployment plugs in a proper vector
/// database behind the same trait instead.
struct JsonVectorStore {
    path: PathBuf,
    records: parking_lot::Mutex<Vec<VectorRecord>>,
}

impl JsonVectorStore {
    fn open(path: PathBuf) -> Result<Self> {
        let records = std::fs::read(&path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Vec<(String, String, Vec<f32>)>>(&bytes).ok())
            .map(|rows| rows.into_iter().map(|(chunk_id, path, vector)| VectorRecord { chunk_id, path, vector }).collect())
            .unwrap_or_default();
        Ok(Self { path, records: parking_lot::Mutex::new(records) })
    }

    fn persist(&self) -> Result<()> {
        let guard = self.records.lock();
        let rows: Vec<(String, String, Vec<f32>)> =
            guard.iter().map(|r| (r.chunk_id.clone(), r.path.clone(), r.vector.clone())).collect();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec(&rows)?)?;
        Ok(())
    }

    fn get_many(&self, ids: &[String]) -> HashMap<String, VectorRecord> {
        let guard = self.records.lock();
        guard.iter().filter(|r| ids.contains(&r.chunk_id)).map(|r| (r.chunk_id.clone(), r.clone())).collect()
    }
}

impl VectorStore for JsonVectorStore {
    fn upsert(&self, path: &str, records: &[VectorRecord]) -> codesearch_core::error::Result<()> {
        let mut guard = self.records.lock();
        guard.retain(|r| r.path != path);
        guard.extend(records.iter().cloned());
        drop(guard);
        self.persist().map_err(|e| codesearch_core::error::Error::Store(e.to_string()))
    }

    fn remove_by_path(&self, path: &str) -> codesearch_core::error::Result<()> {
        let mut guard = self.records.lock();
        guard.retain(|r| r.path != path);
        drop(guard);
        self.persist().map_err(|e| codesearch_core::error::Error::Store(e.to_string()))
    }

    fn search(&self, query_vector: &[f32], limit: usize) -> codesearch_core::error::Result<Vec<VectorHit>> {
        let guard = self.records.lock();
        let mut hits: Vec<VectorHit> = guard
            .iter()
            .map(|r| VectorHit {
                chunk_id: r.chunk_id.clone(),
                score: codesearch_core::vector_store::cosine_similarity(query_vector, &r.vector),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    fn len(&self) -> codesearch_core::error::Result<usize> {
        Ok(self.records.lock().len())
    }

    fn clear(&self) -> codesearch_core::error::Result<()> {
        self.records.lock().clear();
        self.persist().map_err(|e| codesearch_core::error::Error::Store(e.to_string()))
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap().tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb.set_message(message.to_string());
    pb
}

fn open_manager(repo_root: &std::path::Path) -> Result<IndexManager> {
    let config = load_config(repo_root);
    let db_dir = repo_root.join(".codesearch");

    let scan_opts = ScanOptions {
        repo_root: repo_root.to_path_buf(),
        target: repo_root.to_path_buf(),
        max_file_bytes: config.scan.max_file_bytes,
        exclude_dir_names: config.scan.exclude_dir_names.clone(),
    };
    let file_count = scan_workspace(&scan_opts).map(|entries| entries.len()).unwrap_or(0);

    let vector_store = JsonVectorStore::open(db_dir.join("vectors.json")).context("opening vector store")?;
    let fts_backend = fts::open(&config.fts, &db_dir.join("fts"), file_count).context("opening FTS backend")?;
    let embedder = Embedder::new(config.embedder.clone());

    IndexManager::new(repo_root.to_path_buf(), config, embedder, Box::new(vector_store), fts_backend, &db_dir)
        .context("opening index manager")
}

fn run_index(repo_root: &std::path::Path, clean: bool) -> Result<()> {
    let mut manager = open_manager(repo_root)?;
    let pb = spinner("indexing...");
    let mode = if clean { RebuildMode::Clean } else { RebuildMode::Incremental };
    let report = manager.incremental_update(mode).context("indexing failed")?;
    pb.finish_with_message(format!(
        "indexed {} chunks, removed {} files, {} failures{}",
        report.indexed,
        report.removed,
        report.failed.len(),
        if report.curtailed { " (curtailed by memory pressure)" } else { "" }
    ));
    for (path, err) in &report.failed {
        eprintln!("  failed: {} ({err})", path.display());
    }
    Ok(())
}

fn run_query(repo_root: &std::path::Path, text: &str, mode: QueryMode, top_k: usize) -> Result<()> {
    let manager = open_manager(repo_root)?;
    let config = manager.config();

    let expanded = query_expander::expand(text, &config.query_expander);
    let intent = query_intent::detect(text, &config.query_intent);
    let query_vector = manager.embedder().embed_one(&expanded, Domain::Code, Role::Query).context("embedding query")?;

    let hybrid_config = HybridConfig { mode: mode.into(), alpha: config.hybrid.alpha, top_k };

    // This CLI doesn't maintain a chunk store of its own, so results carry
    // only the id/path/score a vector record already has; a real
    // integration would back `get_chunks` with whatever persisted the full
    // chunk text (its own database, a document store, etc).
    let json_store = JsonVectorStore::open(repo_root.join(".codesearch/vectors.json"))?;
    let get_chunks = move |ids: &[String]| -> codesearch_core::error::Result<HashMap<String, Chunk>> {
        Ok(json_store
            .get_many(ids)
            .into_iter()
            .map(|(id, record)| (id, Chunk::new(record.path, 0, 0, "", "")))
            .collect())
    };

    let outcome = HybridSearcher::search(&expanded, &query_vector, &hybrid_config, manager.vector_store(), Some(manager.fts()), get_chunks)
        .context("search failed")?;

    let candidates: Vec<RankCandidate> = outcome
        .hits
        .iter()
        .map(|h| RankCandidate { chunk_id: h.chunk_id.clone(), path: h.chunk.as_ref().map(|c| c.path.clone()).unwrap_or_default(), base_score: h.score, chunk: h.chunk.as_ref() })
        .collect();
    let ranked = AdvancedRanker::rank(&expanded, &intent, candidates, &config.ranker);

    let out = serde_json::json!({
        "query": text,
        "expandedQuery": expanded,
        "primaryIntent": intent.primary().map(|d| d.category.as_str()),
        "modeUsed": format!("{:?}", outcome.mode_used).to_lowercase(),
        "results": ranked.iter().map(|r| serde_json::json!({
            "chunkId": r.chunk_id,
            "path": r.path,
            "score": r.final_score,
        })).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let repo_root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("failed to get current dir")?,
    };

    match cli.cmd {
        Command::Index { clean } => run_index(&repo_root, clean),
        Command::Query { text, mode, top_k } => run_query(&repo_root, &text, mode, top_k),
    }
}
