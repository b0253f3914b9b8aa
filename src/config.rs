//! Configuration surface (spec.md §6). Same pattern as the teacher crate:
//! a `#[serde(default)]` struct tree loaded from a JSON file, falling back
//! to `Config::default()` on any read/parse failure.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunk_size: usize,
    pub max_chunks_per_file: usize,
    pub separators: Vec<String>,
    pub include_header_path: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 4000,
            chunk_overlap: 800,
            max_chunk_size: 8000,
            max_chunks_per_file: 2000,
            separators: vec!["\n\n".to_string(), "\n".to_string(), " ".to_string(), String::new()],
            include_header_path: true,
        }
    }
}

impl ChunkerConfig {
    /// Code-aware chunking uses a tighter overlap than the generic default.
    pub fn code_aware_overlap() -> usize {
        200
    }

    /// Markdown sections use a much larger overlap (continuation prefixes
    /// already carry the breadcrumb, so a bigger window preserves context).
    pub fn docs_overlap() -> usize {
        2000
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DevicePreference {
    Auto,
    Cpu,
    GpuWebgpu,
    GpuDml,
}

impl Default for DevicePreference {
    fn default() -> Self {
        DevicePreference::Auto
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_id: String,
    pub dimension: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderConfig {
    pub device: DevicePreference,
    pub code_model: ModelConfig,
    pub docs_model: ModelConfig,
    pub batch_size_gpu: usize,
    pub batch_size_cpu: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            device: DevicePreference::Auto,
            code_model: ModelConfig {
                model_id: "jinaai/jina-embeddings-v2-base-code".to_string(),
                dimension: 384,
            },
            docs_model: ModelConfig {
                model_id: "BAAI/bge-base-en-v1.5".to_string(),
                dimension: 768,
            },
            batch_size_gpu: 64,
            batch_size_cpu: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FtsPreference {
    Auto,
    Js,
    Native,
}

impl Default for FtsPreference {
    fn default() -> Self {
        FtsPreference::Auto
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FtsConfig {
    pub preference: FtsPreference,
    pub file_count_threshold: usize,
    pub rrf_k: f64,
}

impl Default for FtsConfig {
    fn default() -> Self {
        Self {
            preference: FtsPreference::Auto,
            file_count_threshold: 5000,
            rrf_k: 60.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    Fts,
    Hybrid,
}

impl Default for SearchMode {
    fn default() -> Self {
        SearchMode::Hybrid
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub mode: SearchMode,
    /// Weight given to the vector ranking in RRF fusion; `1 - alpha` goes to
    /// the FTS ranking. Spec range `[0, 1]`.
    pub alpha: f64,
    pub top_k: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::Hybrid,
            alpha: 0.5,
            top_k: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerWeights {
    pub chunk_type: f64,
    pub name: f64,
    pub path: f64,
    pub tag: f64,
    pub docstring: f64,
    pub complexity: f64,
    pub intent: f64,
}

impl Default for RankerWeights {
    fn default() -> Self {
        Self {
            chunk_type: 1.0,
            name: 1.0,
            path: 1.0,
            tag: 1.0,
            docstring: 1.0,
            complexity: 1.0,
            intent: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    pub weights: RankerWeights,
    pub complexity_mild_threshold: usize,
    pub complexity_strong_threshold: usize,
    pub docstring_bonus: f64,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            weights: RankerWeights::default(),
            complexity_mild_threshold: 2000,
            complexity_strong_threshold: 4000,
            docstring_bonus: 1.05,
        }
    }
}

/// Memory watchdog tuning (spec.md §5 memory policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub critical_threshold_bytes: u64,
    pub min_batch_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            critical_threshold_bytes: 2 * 1024 * 1024 * 1024,
            min_batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexManagerConfig {
    pub batch_size: usize,
    pub memory: MemoryConfig,
}

impl Default for IndexManagerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            memory: MemoryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directory *names* to skip anywhere in the tree, beyond `.gitignore`.
    pub exclude_dir_names: Vec<String>,
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            exclude_dir_names: vec![],
            max_file_bytes: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub chunker: ChunkerConfig,
    pub embedder: EmbedderConfig,
    pub fts: FtsConfig,
    pub hybrid: HybridConfig,
    pub ranker: RankerConfig,
    pub index_manager: IndexManagerConfig,
    pub query_intent: crate::query_intent::QueryIntentConfig,
    pub query_expander: crate::query_expander::QueryExpanderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            chunker: ChunkerConfig::default(),
            embedder: EmbedderConfig::default(),
            fts: FtsConfig::default(),
            hybrid: HybridConfig::default(),
            ranker: RankerConfig::default(),
            index_manager: IndexManagerConfig::default(),
            query_intent: crate::query_intent::QueryIntentConfig::default(),
            query_expander: crate::query_expander::QueryExpanderConfig::default(),
        }
    }
}

/// Load `.codesearch.json` from `repo_root`, falling back to defaults on any
/// read or parse failure — matches the teacher's `load_config` exactly.
pub fn load_config(repo_root: &Path) -> Config {
    let path = repo_root.join(".codesearch.json");
    let Ok(text) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    serde_json::from_str::<Config>(&text).unwrap_or_else(|e| {
        tracing::warn!("failed to parse {}: {e}; using defaults", path.display());
        Config::default()
    })
}
