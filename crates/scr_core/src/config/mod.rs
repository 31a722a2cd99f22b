use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, CONFIG_INVALID};

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_API_BASE: &str = "OPENAI_API_BASE";

/// Top-level settings. Every field has a default so an absent or partial TOML file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    /// Relative source and index paths are resolved against this directory.
    pub base_dir: PathBuf,
    pub sources: SourcesConfig,
    pub index: IndexConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalParams,
    pub model: ModelConfig,
    pub cache: CacheConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourcesConfig {
    pub pdf: PathBuf,
    pub table: PathBuf,
    /// Zero or one auxiliary table.
    pub table_aux: Option<PathBuf>,
    pub structured_sample: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum segment length in characters.
    pub max_chars: usize,
    /// Characters shared by adjacent segments of the same record.
    pub overlap_chars: usize,
}

/// Maximal-marginal-relevance parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalParams {
    pub k: usize,
    pub fetch_k: usize,
    /// 1.0 = pure relevance, 0.0 = pure diversity.
    pub diversity: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub api_base: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Compare the stored corpus fingerprint against the current sources on every cache hit.
    /// Fingerprinting reads the sources, so while this is on a missing required source is a
    /// `CONFIG_SOURCE_MISSING` error even when a valid index is persisted. With it off such an
    /// index is still served.
    pub verify_sources: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of past exchanges kept in each model's rolling memory.
    pub memory_turns: usize,
    pub web_search: bool,
}

/// Absolute locations of the corpus documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    pub pdf: PathBuf,
    pub table: PathBuf,
    pub table_aux: Option<PathBuf>,
    pub structured_sample: PathBuf,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            sources: SourcesConfig::default(),
            index: IndexConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalParams::default(),
            model: ModelConfig::default(),
            cache: CacheConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            pdf: PathBuf::from("data/SCR_InstrucoesDePreenchimento_Doc3040.pdf"),
            table: PathBuf::from("data/SCR3040_Leiaute.xls"),
            table_aux: Some(PathBuf::from("data/SCR3040_Criticas.xls")),
            structured_sample: PathBuf::from("data/simulacao_3040.xml"),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("vectorstore"),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1500,
            overlap_chars: 200,
        }
    }
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            k: 5,
            fetch_k: 10,
            diversity: 0.7,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            timeout_secs: 60,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            verify_sources: true,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            memory_turns: 6,
            web_search: true,
        }
    }
}

impl RetrievalParams {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.k == 0 {
            return Err(AppError::new(CONFIG_INVALID, "retrieval.k must be at least 1"));
        }
        if self.fetch_k < self.k {
            return Err(
                AppError::new(CONFIG_INVALID, "retrieval.fetch_k must be >= retrieval.k")
                    .with_details(format!("k={}; fetch_k={}", self.k, self.fetch_k)),
            );
        }
        if !(0.0..=1.0).contains(&self.diversity) {
            return Err(
                AppError::new(CONFIG_INVALID, "retrieval.diversity must be within [0, 1]")
                    .with_details(format!("diversity={}", self.diversity)),
            );
        }
        Ok(())
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_chars == 0 {
            return Err(AppError::new(
                CONFIG_INVALID,
                "chunking.max_chars must be at least 1",
            ));
        }
        if self.overlap_chars >= self.max_chars {
            return Err(AppError::new(
                CONFIG_INVALID,
                "chunking.overlap_chars must be smaller than chunking.max_chars",
            )
            .with_details(format!(
                "max_chars={}; overlap_chars={}",
                self.max_chars, self.overlap_chars
            )));
        }
        Ok(())
    }
}

impl AssistantConfig {
    /// Read settings from `path` (when given) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut cfg = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides(|name| std::env::var(name).ok());
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new(CONFIG_INVALID, "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        let mut cfg = Self::from_toml_str(&raw).map_err(|e| {
            e.with_details(format!("path={}", path.display()))
        })?;
        // A config file anchors relative paths to its own directory unless base_dir is absolute.
        if cfg.base_dir.is_relative() {
            if let Some(parent) = path.parent() {
                cfg.base_dir = parent.join(&cfg.base_dir);
            }
        }
        Ok(cfg)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| {
            AppError::new(CONFIG_INVALID, "Failed to parse config file").with_details(e.to_string())
        })
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.model.api_key = Some(key.trim().to_string());
        }
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.model.api_base = base.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.chunking.validate()?;
        self.retrieval.validate()?;
        if self.model.embedding_model.trim().is_empty() || self.model.chat_model.trim().is_empty()
        {
            return Err(AppError::new(
                CONFIG_INVALID,
                "model.embedding_model and model.chat_model must be set",
            ));
        }
        Ok(())
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    pub fn source_paths(&self) -> SourcePaths {
        SourcePaths {
            pdf: self.resolve(&self.sources.pdf),
            table: self.resolve(&self.sources.table),
            table_aux: self.sources.table_aux.as_deref().map(|p| self.resolve(p)),
            structured_sample: self.resolve(&self.sources.structured_sample),
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.resolve(&self.index.dir)
    }
}
