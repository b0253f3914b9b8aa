//! Dual code/docs embedding pipeline (spec.md §4.5): lazily initializes two
//! `fastembed` models (a code-tuned one and a docs-tuned one) on first use,
//! with GPU execution providers preferred and a CPU fallback baked into
//! every init, dimension validation against the configured expectation, and
//! document/query prompting (the reference models expect an empty prefix
//! for documents and a "represent this sentence for searching" prefix for
//! queries, to get asymmetric retrieval quality).
//!
//! Grounded on `vyotiq-ai-vyotiq-agent`'s `embedder.rs`: the
//! `AtomicBool` + `Mutex<Option<Model>>` lazy-init guard and the
//! dimension-verification-against-a-constant pattern are both reused here,
//! generalized from one singleton model into two (code/docs), and from
//! `candle` to `fastembed`'s `ort` backend (see DESIGN.md for why).

pub mod device;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use fastembed::{EmbeddingModel, TextEmbedding};

use crate::config::{DevicePreference, EmbedderConfig};
use crate::error::{Error, Result};
use device::DeviceInfo;

/// Which of the two models a text should be embedded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Code,
    Docs,
}

/// Whether a text being embedded is a stored document (a chunk) or an
/// incoming search query — some models want an asymmetric prefix for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Document,
    Query,
}

/// Result of embedding a batch (spec.md §4.5/§8): only the vectors that
/// actually succeeded, each paired with the input index it came from, plus
/// a count of how many inputs failed. `vectors.len() == success_indices.len()
/// == inputCount - failed_count`; `success_indices` is strictly increasing.
/// Never carries a zero-vector standing in for a failure.
#[derive(Debug, Default)]
pub struct EmbedBatchResult {
    pub vectors: Vec<Vec<f32>>,
    pub success_indices: Vec<usize>,
    pub failed_count: usize,
}

fn model_for(model_id: &str) -> Result<EmbeddingModel> {
    // `fastembed` only knows a closed set of named models; map the
    // configured HuggingFace repo id onto its enum. Unknown ids are a
    // config error, not a panic.
    EmbeddingModel::try_from(model_id).map_err(|_| Error::ModelInit(format!("unknown embedding model id: {model_id}")))
}

struct LazyModel {
    model: Mutex<Option<TextEmbedding>>,
    device_info: Mutex<Option<DeviceInfo>>,
    initialized: AtomicBool,
    model_id: String,
    dimension: usize,
    device: DevicePreference,
}

impl LazyModel {
    fn new(model_id: String, dimension: usize, device: DevicePreference) -> Self {
        Self {
            model: Mutex::new(None),
            device_info: Mutex::new(None),
            initialized: AtomicBool::new(false),
            model_id,
            dimension,
            device,
        }
    }

    fn ensure(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let mut guard = self.model.lock().map_err(|_| Error::ModelInit("embedding model lock poisoned".to_string()))?;
        if guard.is_some() {
            self.initialized.store(true, Ordering::Release);
            return Ok(());
        }

        let embedding_model = model_for(&self.model_id)?;
        let (model, info) = device::init_with_fallback(embedding_model, self.device)?;

        if info.fell_back {
            tracing::warn!(model_id = %self.model_id, requested = ?info.requested, "GPU init failed, fell back to CPU");
        }
        *self.device_info.lock().map_err(|_| Error::ModelInit("device info lock poisoned".to_string()))? = Some(info);

        *guard = Some(model);
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Raw batch embed with no dimension validation or failure isolation —
    /// the whole call either produces one vector per input or errors.
    fn embed_raw(&self, texts: Vec<String>, batch_size: usize) -> Result<Vec<Vec<f32>>> {
        self.ensure()?;
        let guard = self.model.lock().map_err(|_| Error::ModelInit("embedding model lock poisoned".to_string()))?;
        let model = guard.as_ref().ok_or_else(|| Error::ModelInit("embedding model not initialized".to_string()))?;
        model.embed(texts, Some(batch_size)).map_err(|e| Error::ModelInit(e.to_string()))
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        self.device_info.lock().ok().and_then(|g| g.clone())
    }
}

pub struct Embedder {
    code: LazyModel,
    docs: LazyModel,
    config: EmbedderConfig,
}

impl Embedder {
    pub fn new(config: EmbedderConfig) -> Self {
        Self {
            code: LazyModel::new(config.code_model.model_id.clone(), config.code_model.dimension, config.device),
            docs: LazyModel::new(config.docs_model.model_id.clone(), config.docs_model.dimension, config.device),
            config,
        }
    }

    /// Model-specific prompt prefix table (spec.md §4.5/§6): empty for
    /// documents, a query-specific instruction for queries, under the
    /// reference models — asymmetric retrieval quality depends on this.
    fn prefix(_domain: Domain, role: Role) -> &'static str {
        match role {
            Role::Document => "",
            Role::Query => "Represent this sentence for searching relevant passages: ",
        }
    }

    fn batch_size(&self) -> usize {
        device::batch_size_for(self.config.device, self.config.batch_size_gpu, self.config.batch_size_cpu)
    }

    fn model_for(&self, domain: Domain) -> &LazyModel {
        match domain {
            Domain::Code => &self.code,
            Domain::Docs => &self.docs,
        }
    }

    /// Device info recorded the first time `domain`'s model was
    /// initialized, if it has been initialized yet.
    pub fn device_info(&self, domain: Domain) -> Option<DeviceInfo> {
        self.model_for(domain).device_info()
    }

    /// Embed a batch of texts for `domain`/`role` (spec.md §4.5). Tries the
    /// whole batch first; on failure (or a dimension mismatch anywhere in
    /// the result), falls back to embedding items one at a time so a
    /// single bad input doesn't sink an entire file's worth of chunks.
    /// Failures — whole-item embed errors or a wrong-dimension output —
    /// are isolated per item: the offending index is skipped, its vector
    /// never emitted, and `failed_count` incremented. Never returns a
    /// zero-vector standing in for a failure.
    pub fn embed_batch(&self, texts: &[String], domain: Domain, role: Role) -> Result<EmbedBatchResult> {
        if texts.is_empty() {
            return Ok(EmbedBatchResult::default());
        }
        let model = self.model_for(domain);
        let dimension = self.dimension(domain);
        let prefix = Self::prefix(domain, role);
        let prefixed: Vec<String> = texts.iter().map(|t| format!("{prefix}{t}")).collect();

        if let Ok(vectors) = model.embed_raw(prefixed.clone(), self.batch_size()) {
            if vectors.len() == prefixed.len() {
                let mut result = EmbedBatchResult::default();
                for (i, v) in vectors.into_iter().enumerate() {
                    if v.len() == dimension {
                        result.success_indices.push(i);
                        result.vectors.push(v);
                    } else {
                        result.failed_count += 1;
                    }
                }
                return Ok(result);
            }
        }

        // Whole-batch call failed, or returned a mismatched item count:
        // isolate offenders by falling back to one embed call per item.
        let mut result = EmbedBatchResult::default();
        for (i, text) in prefixed.into_iter().enumerate() {
            match model.embed_raw(vec![text], 1) {
                Ok(mut v) if v.len() == 1 && v[0].len() == dimension => {
                    result.success_indices.push(i);
                    result.vectors.push(v.remove(0));
                }
                _ => result.failed_count += 1,
            }
        }
        Ok(result)
    }

    /// Embed a single text, propagating failure directly rather than
    /// isolating it (there's nothing to isolate it from).
    pub fn embed_one(&self, text: &str, domain: Domain, role: Role) -> Result<Vec<f32>> {
        let result = self.embed_batch(std::slice::from_ref(&text.to_string()), domain, role)?;
        result.vectors.into_iter().next().ok_or(Error::DimensionMismatch { expected: self.dimension(domain), actual: 0 })
    }

    pub fn dimension(&self, domain: Domain) -> usize {
        match domain {
            Domain::Code => self.config.code_model.dimension,
            Domain::Docs => self.config.docs_model.dimension,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_asymmetric_by_role() {
        assert_eq!(Embedder::prefix(Domain::Code, Role::Query), "Represent this sentence for searching relevant passages: ");
        assert_eq!(Embedder::prefix(Domain::Code, Role::Document), "");
    }

    #[test]
    fn empty_batch_short_circuits() {
        let embedder = Embedder::new(EmbedderConfig::default());
        let out = embedder.embed_batch(&[], Domain::Code, Role::Query).unwrap();
        assert!(out.vectors.is_empty());
        assert!(out.success_indices.is_empty());
        assert_eq!(out.failed_count, 0);
    }
}
