use scr_core::config::ChunkingConfig;
use scr_core::error::{AppError, INDEX_BUILD_FAILED, INDEX_CACHE_CORRUPTED, INDEX_EMBEDDINGS_FAILED};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

use crate::embeddings::Embedder;
use crate::retrieve::similarity;
use crate::segment::Segment;

mod store;

pub use store::{IndexStore, StoredFiles, META_FILE, VECTORS_FILE};

pub const FORMAT_VERSION: u32 = 1;

/// Describes how a persisted index was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub model: String,
    pub dims: u32,
    pub segment_count: u32,
    pub chunking: ChunkingConfig,
    /// Corpus fingerprint at build time; `None` when source verification was off.
    pub fingerprint: Option<String>,
    pub built_at: String,
}

/// In-memory vector index over the corpus segments. Read-only once built.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    manifest: IndexManifest,
    segments: Vec<Segment>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
}

impl SearchIndex {
    /// Embed every segment with `model` and assemble a fresh index.
    pub fn build(
        segments: Vec<Segment>,
        embedder: &dyn Embedder,
        model: &str,
        chunking: ChunkingConfig,
        fingerprint: Option<String>,
    ) -> Result<Self, AppError> {
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        let vectors = embedder.embed_batch(model, &texts).map_err(|e| {
            AppError::new(INDEX_EMBEDDINGS_FAILED, "Failed to compute embeddings")
                .with_details(format!("segments={}; err={}", segments.len(), e))
                .with_retryable(e.retryable)
        })?;
        if vectors.len() != segments.len() {
            return Err(AppError::new(
                INDEX_BUILD_FAILED,
                "Embedder returned a different number of vectors than segments",
            )
            .with_details(format!("segments={}; vectors={}", segments.len(), vectors.len())));
        }

        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dims || dims == 0 {
                return Err(AppError::new(
                    INDEX_BUILD_FAILED,
                    "Embedding dimension mismatch across segments",
                )
                .with_details(format!("expected={}; got={}; segment={}", dims, v.len(), i)));
            }
        }

        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            model: model.to_string(),
            dims: dims as u32,
            segment_count: segments.len() as u32,
            chunking,
            fingerprint,
            built_at: now_rfc3339(),
        };
        info!(
            segments = manifest.segment_count,
            dims = manifest.dims,
            model = %manifest.model,
            "index built"
        );
        Ok(Self::assemble(manifest, segments, vectors))
    }

    /// Reassemble an index from persisted parts, rejecting any inconsistency.
    pub fn from_parts(
        manifest: IndexManifest,
        segments: Vec<Segment>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, AppError> {
        let corrupted = |msg: &str, details: String| {
            Err(AppError::new(INDEX_CACHE_CORRUPTED, msg).with_details(details))
        };
        if manifest.format_version != FORMAT_VERSION {
            return corrupted(
                "Unsupported index format version",
                format!("expected={}; got={}", FORMAT_VERSION, manifest.format_version),
            );
        }
        if segments.is_empty() {
            return corrupted("Persisted index has no segments", String::new());
        }
        if segments.len() != manifest.segment_count as usize || vectors.len() != segments.len() {
            return corrupted(
                "Persisted index files disagree on segment count",
                format!(
                    "manifest={}; segments={}; vectors={}",
                    manifest.segment_count,
                    segments.len(),
                    vectors.len()
                ),
            );
        }
        if let Some(i) = vectors
            .iter()
            .position(|v| v.len() != manifest.dims as usize || v.iter().any(|x| !x.is_finite()))
        {
            return corrupted(
                "Persisted vector has wrong dimensions or non-finite values",
                format!("segment={}; dims={}", i, manifest.dims),
            );
        }
        Ok(Self::assemble(manifest, segments, vectors))
    }

    fn assemble(manifest: IndexManifest, segments: Vec<Segment>, vectors: Vec<Vec<f32>>) -> Self {
        let norms = vectors.iter().map(|v| similarity::l2_norm(v)).collect();
        Self {
            manifest,
            segments,
            vectors,
            norms,
        }
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub(crate) fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub(crate) fn norms(&self) -> &[f32] {
        &self.norms
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
