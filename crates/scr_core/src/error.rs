use serde::{Deserialize, Serialize};
use std::fmt;

pub const CONFIG_SOURCE_MISSING: &str = "CONFIG_SOURCE_MISSING";
pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
pub const CONFIG_API_KEY_MISSING: &str = "CONFIG_API_KEY_MISSING";

pub const INGEST_PDF_FAILED: &str = "INGEST_PDF_FAILED";
pub const INGEST_TABLE_FAILED: &str = "INGEST_TABLE_FAILED";
pub const INGEST_AUX_SOURCE_MISSING: &str = "INGEST_AUX_SOURCE_MISSING";
pub const INGEST_SAMPLE_SOURCE_MISSING: &str = "INGEST_SAMPLE_SOURCE_MISSING";
pub const INGEST_SAMPLE_PARSE_FALLBACK: &str = "INGEST_SAMPLE_PARSE_FALLBACK";
pub const INGEST_SAMPLE_UNREADABLE: &str = "INGEST_SAMPLE_UNREADABLE";

pub const INDEX_CACHE_CORRUPTED: &str = "INDEX_CACHE_CORRUPTED";
pub const INDEX_BUILD_FAILED: &str = "INDEX_BUILD_FAILED";
pub const INDEX_EMBEDDINGS_FAILED: &str = "INDEX_EMBEDDINGS_FAILED";
pub const INDEX_EMPTY_CORPUS: &str = "INDEX_EMPTY_CORPUS";
pub const INDEX_PERSIST_FAILED: &str = "INDEX_PERSIST_FAILED";

pub const RETRIEVAL_FAILED: &str = "RETRIEVAL_FAILED";
pub const LLM_REQUEST_FAILED: &str = "LLM_REQUEST_FAILED";
pub const CHAT_QUESTION_EMPTY: &str = "CHAT_QUESTION_EMPTY";
pub const CHAT_MODEL_UNKNOWN: &str = "CHAT_MODEL_UNKNOWN";

/// Single structured error shape used across the loader, the index cache and the chat driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

/// Coarse classification of error codes, used by callers to decide whether a failure is fatal
/// to the process, to the current request, or only worth a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// A required input or setting is missing or invalid. Halts startup.
    Configuration,
    /// Persisted index state could not be used. Recovered by a full rebuild.
    CorruptedCache,
    /// A required document is malformed or the embedding/index step failed.
    BuildFailure,
    /// The rebuilt index could not be saved. Only future cold starts pay for it.
    PersistFailure,
    /// An optional source was absent or degraded.
    AuxiliarySourceMissing,
    /// Anything raised while answering a single conversation turn.
    TurnFailure,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn class(&self) -> ErrorClass {
        match self.code.as_str() {
            CONFIG_SOURCE_MISSING | CONFIG_INVALID | CONFIG_API_KEY_MISSING => {
                ErrorClass::Configuration
            }
            INDEX_CACHE_CORRUPTED => ErrorClass::CorruptedCache,
            INGEST_PDF_FAILED | INGEST_TABLE_FAILED | INDEX_BUILD_FAILED
            | INDEX_EMBEDDINGS_FAILED | INDEX_EMPTY_CORPUS => ErrorClass::BuildFailure,
            INDEX_PERSIST_FAILED => ErrorClass::PersistFailure,
            INGEST_AUX_SOURCE_MISSING
            | INGEST_SAMPLE_SOURCE_MISSING
            | INGEST_SAMPLE_PARSE_FALLBACK
            | INGEST_SAMPLE_UNREADABLE => ErrorClass::AuxiliarySourceMissing,
            _ => ErrorClass::TurnFailure,
        }
    }

    pub fn is_fatal_to_process(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Configuration | ErrorClass::BuildFailure
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(d) = self.details.as_deref() {
            write!(f, " ({d})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}
