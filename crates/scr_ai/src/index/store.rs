use std::fs;
use std::path::{Path, PathBuf};

use scr_core::error::{AppError, INDEX_CACHE_CORRUPTED, INDEX_PERSIST_FAILED};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{IndexManifest, SearchIndex};
use crate::segment::Segment;

pub const VECTORS_FILE: &str = "index.vectors.json";
pub const META_FILE: &str = "index.meta.json";

/// Which companion files are present on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredFiles {
    None,
    /// Exactly one of the two files exists.
    Partial { present: PathBuf },
    Both,
}

#[derive(Debug, Serialize, Deserialize)]
struct VectorsFile {
    model: String,
    dims: u32,
    vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetaFile {
    manifest: IndexManifest,
    segments: Vec<Segment>,
}

/// On-disk home of the persisted index: two JSON files written via tmp -> rename.
#[derive(Debug, Clone)]
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn open(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    pub fn files(&self) -> StoredFiles {
        let vectors = self.vectors_path();
        let meta = self.meta_path();
        match (vectors.is_file(), meta.is_file()) {
            (false, false) => StoredFiles::None,
            (true, true) => StoredFiles::Both,
            (true, false) => StoredFiles::Partial { present: vectors },
            (false, true) => StoredFiles::Partial { present: meta },
        }
    }

    /// Read and cross-check both files. Any failure is `INDEX_CACHE_CORRUPTED`.
    pub fn read(&self) -> Result<SearchIndex, AppError> {
        let vectors: VectorsFile = read_json(&self.vectors_path())?;
        let meta: MetaFile = read_json(&self.meta_path())?;

        if vectors.model != meta.manifest.model || vectors.dims != meta.manifest.dims {
            return Err(AppError::new(
                INDEX_CACHE_CORRUPTED,
                "Persisted index files disagree on model or dimensions",
            )
            .with_details(format!(
                "vectors_model={}; meta_model={}; vectors_dims={}; meta_dims={}",
                vectors.model, meta.manifest.model, vectors.dims, meta.manifest.dims
            )));
        }
        SearchIndex::from_parts(meta.manifest, meta.segments, vectors.vectors)
    }

    /// Persist `index`. The vectors file is written first and the metadata last, so an
    /// interrupted save leaves partial state that the next load discards.
    pub fn write(&self, index: &SearchIndex) -> Result<(), AppError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::new(INDEX_PERSIST_FAILED, "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.dir.display(), e))
        })?;

        let manifest = index.manifest();
        write_json(
            &self.vectors_path(),
            &VectorsFile {
                model: manifest.model.clone(),
                dims: manifest.dims,
                vectors: index.vectors().to_vec(),
            },
        )?;
        write_json(
            &self.meta_path(),
            &MetaFile {
                manifest: manifest.clone(),
                segments: index.segments().to_vec(),
            },
        )
    }

    /// Remove the whole index directory. Missing directory is not an error.
    pub fn clear(&self) -> Result<(), AppError> {
        if !self.dir.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&self.dir).map_err(|e| {
            AppError::new(INDEX_PERSIST_FAILED, "Failed to delete persisted index")
                .with_details(format!("path={}; err={}", self.dir.display(), e))
        })
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new(INDEX_CACHE_CORRUPTED, "Failed to read persisted index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new(INDEX_CACHE_CORRUPTED, "Failed to decode persisted index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_vec(value).map_err(|e| {
        AppError::new(INDEX_PERSIST_FAILED, "Failed to encode index file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    fs::write(&tmp, &json).map_err(|e| {
        AppError::new(INDEX_PERSIST_FAILED, "Failed to write index file")
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new(INDEX_PERSIST_FAILED, "Failed to finalize index file write")
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })
}
