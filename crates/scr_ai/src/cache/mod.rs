use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use scr_core::config::{AssistantConfig, ChunkingConfig, SourcePaths};
use scr_core::domain::LoadWarning;
use scr_core::error::{AppError, INDEX_EMPTY_CORPUS, INDEX_PERSIST_FAILED};
use scr_core::fingerprint::corpus_fingerprint;
use scr_core::ingest::load_corpus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embeddings::Embedder;
use crate::index::{IndexStore, SearchIndex, StoredFiles};
use crate::segment::segment_records;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CachePhase {
    Checking,
    Rebuilding,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RebuildReason {
    /// Neither persisted file existed.
    Missing,
    /// Exactly one of the two files existed.
    PartialState,
    /// Both files existed but could not be decoded or disagreed.
    Corrupted,
    /// The stored corpus fingerprint no longer matches the sources.
    Stale,
}

/// How the most recent `load_or_build_index` call resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadOutcome {
    Hit,
    Rebuilt {
        reason: RebuildReason,
        persisted: bool,
        warnings: Vec<LoadWarning>,
    },
}

/// Everything that determines what the index is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexBuildSettings {
    pub sources: SourcePaths,
    pub index_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub embedding_model: String,
    pub verify_sources: bool,
}

impl IndexBuildSettings {
    pub fn from_config(cfg: &AssistantConfig) -> Self {
        Self {
            sources: cfg.source_paths(),
            index_dir: cfg.index_dir(),
            chunking: cfg.chunking,
            embedding_model: cfg.model.embedding_model.clone(),
            verify_sources: cfg.cache.verify_sources,
        }
    }

    fn build_context(&self) -> String {
        format!(
            "model={};max_chars={};overlap_chars={}",
            self.embedding_model, self.chunking.max_chars, self.chunking.overlap_chars
        )
    }
}

/// Result of inspecting persisted state.
enum Probe {
    Hit(SearchIndex),
    Missing,
    Partial { present: PathBuf },
    Corrupted(AppError),
    Stale { stored: Option<String> },
}

struct Status {
    phase: CachePhase,
    last_outcome: Option<LoadOutcome>,
}

/// Owns the persisted index for one corpus and hands out the ready index.
///
/// Notes:
/// - Built once per process and shared (`Arc`).
/// - The check-or-build sequence holds `slot`, so at most one rebuild runs; other callers
///   wait and then receive the memoized index.
/// - Phase and outcome live behind a separate lock so they stay observable during a rebuild.
pub struct IndexCacheManager {
    settings: IndexBuildSettings,
    store: IndexStore,
    embedder: Arc<dyn Embedder>,
    slot: Mutex<Option<Arc<SearchIndex>>>,
    status: Mutex<Status>,
}

impl IndexCacheManager {
    pub fn new(settings: IndexBuildSettings, embedder: Arc<dyn Embedder>) -> Self {
        let store = IndexStore::open(settings.index_dir.clone());
        Self {
            settings,
            store,
            embedder,
            slot: Mutex::new(None),
            status: Mutex::new(Status {
                phase: CachePhase::Checking,
                last_outcome: None,
            }),
        }
    }

    pub fn settings(&self) -> &IndexBuildSettings {
        &self.settings
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    pub fn phase(&self) -> CachePhase {
        self.lock_status().phase
    }

    pub fn last_outcome(&self) -> Option<LoadOutcome> {
        self.lock_status().last_outcome.clone()
    }

    /// Return the ready index, loading it from disk or rebuilding it from the sources.
    pub fn load_or_build_index(&self) -> Result<Arc<SearchIndex>, AppError> {
        let mut slot = lock(&self.slot);
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }

        self.set_phase(CachePhase::Checking);
        let fingerprint = match self.current_fingerprint() {
            Ok(fp) => fp,
            Err(e) => return Err(self.fail(e)),
        };

        let (index, outcome) = match self.probe(fingerprint.as_deref()) {
            Probe::Hit(index) => {
                info!(
                    dir = %self.store.dir().display(),
                    segments = index.len(),
                    "index cache hit"
                );
                (index, LoadOutcome::Hit)
            }
            Probe::Missing => {
                info!(dir = %self.store.dir().display(), "no persisted index; building");
                self.rebuild(RebuildReason::Missing, fingerprint)?
            }
            Probe::Partial { present } => {
                warn!(present = %present.display(), "partial index state; discarding");
                self.discard();
                self.rebuild(RebuildReason::PartialState, fingerprint)?
            }
            Probe::Corrupted(err) => {
                warn!(error = %err, "persisted index unusable; discarding");
                self.discard();
                self.rebuild(RebuildReason::Corrupted, fingerprint)?
            }
            Probe::Stale { stored } => {
                info!(
                    stored = stored.as_deref().unwrap_or("none"),
                    current = fingerprint.as_deref().unwrap_or("none"),
                    "sources changed since the index was built; rebuilding"
                );
                self.discard();
                self.rebuild(RebuildReason::Stale, fingerprint)?
            }
        };

        let index = Arc::new(index);
        *slot = Some(Arc::clone(&index));
        let mut status = self.lock_status();
        status.phase = CachePhase::Ready;
        status.last_outcome = Some(outcome);
        Ok(index)
    }

    /// Delete persisted state and forget the memoized index. Indexes already handed out
    /// remain usable; the next `load_or_build_index` rebuilds.
    pub fn invalidate(&self) -> Result<(), AppError> {
        let mut slot = lock(&self.slot);
        *slot = None;
        let mut status = self.lock_status();
        status.phase = CachePhase::Checking;
        status.last_outcome = None;
        drop(status);
        self.store.clear()?;
        info!(dir = %self.store.dir().display(), "index invalidated");
        Ok(())
    }

    /// Discard persisted state and build the index again from the sources.
    pub fn force_rebuild(&self) -> Result<Arc<SearchIndex>, AppError> {
        self.invalidate()?;
        self.load_or_build_index()
    }

    fn current_fingerprint(&self) -> Result<Option<String>, AppError> {
        if !self.settings.verify_sources {
            return Ok(None);
        }
        corpus_fingerprint(&self.settings.sources, &self.settings.build_context()).map(Some)
    }

    fn probe(&self, fingerprint: Option<&str>) -> Probe {
        match self.store.files() {
            StoredFiles::None => Probe::Missing,
            StoredFiles::Partial { present } => Probe::Partial { present },
            StoredFiles::Both => match self.store.read() {
                Err(e) => Probe::Corrupted(e),
                Ok(index) => {
                    let stored = index.manifest().fingerprint.clone();
                    let model_changed = index.manifest().model != self.settings.embedding_model;
                    let sources_changed =
                        fingerprint.is_some() && stored.as_deref() != fingerprint;
                    if model_changed || sources_changed {
                        Probe::Stale { stored }
                    } else {
                        Probe::Hit(index)
                    }
                }
            },
        }
    }

    fn rebuild(
        &self,
        reason: RebuildReason,
        fingerprint: Option<String>,
    ) -> Result<(SearchIndex, LoadOutcome), AppError> {
        self.set_phase(CachePhase::Rebuilding);
        let (index, mut warnings) = match self.build_fresh(fingerprint) {
            Ok(built) => built,
            Err(e) => return Err(self.fail(e)),
        };

        let persisted = match self.store.write(&index) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to persist index; continuing with in-memory copy");
                warnings.push(
                    LoadWarning::new(
                        INDEX_PERSIST_FAILED,
                        "Index could not be saved; the next start will rebuild it",
                    )
                    .with_details(e.to_string()),
                );
                false
            }
        };

        info!(?reason, persisted, segments = index.len(), "index rebuilt");
        Ok((
            index,
            LoadOutcome::Rebuilt {
                reason,
                persisted,
                warnings,
            },
        ))
    }

    fn build_fresh(
        &self,
        fingerprint: Option<String>,
    ) -> Result<(SearchIndex, Vec<LoadWarning>), AppError> {
        let corpus = load_corpus(&self.settings.sources)?;
        let segments = segment_records(&corpus.records, &self.settings.chunking)?;
        if segments.is_empty() {
            return Err(AppError::new(
                INDEX_EMPTY_CORPUS,
                "Sources produced no text to index",
            )
            .with_details(format!("records={}", corpus.records.len())));
        }
        info!(
            records = corpus.records.len(),
            segments = segments.len(),
            "corpus segmented"
        );
        let index = SearchIndex::build(
            segments,
            self.embedder.as_ref(),
            &self.settings.embedding_model,
            self.settings.chunking,
            fingerprint,
        )?;
        Ok((index, corpus.warnings))
    }

    fn discard(&self) {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to delete stale index state");
        }
    }

    fn fail(&self, err: AppError) -> AppError {
        self.set_phase(CachePhase::Failed);
        err
    }

    fn set_phase(&self, phase: CachePhase) {
        self.lock_status().phase = phase;
    }

    fn lock_status(&self) -> MutexGuard<'_, Status> {
        lock(&self.status)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
