use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::SourcePaths;
use crate::domain::SourceKind;
use crate::error::{AppError, CONFIG_SOURCE_MISSING};

/// Stable digest of the corpus inputs plus any build settings that change the index
/// (`build_context`, e.g. chunk sizes and the embedding model).
///
/// Absent optional sources hash as `absent`, so adding the auxiliary table later changes the
/// fingerprint. Source order is fixed by `SourceKind` declaration order.
pub fn corpus_fingerprint(paths: &SourcePaths, build_context: &str) -> Result<String, AppError> {
    let mut hasher = Sha256::new();
    hasher.update(b"v1\n");
    hasher.update(build_context.as_bytes());
    hasher.update(b"\n");

    for kind in SourceKind::ALL {
        let path = match kind {
            SourceKind::Pdf => Some(paths.pdf.as_path()),
            SourceKind::Table => Some(paths.table.as_path()),
            SourceKind::TableAux => paths.table_aux.as_deref(),
            SourceKind::StructuredSample => Some(paths.structured_sample.as_path()),
        };
        hasher.update(kind.label().as_bytes());
        hasher.update(b"=");
        hasher.update(file_digest(kind, path)?.as_bytes());
        hasher.update(b"\n");
    }
    Ok(hex::encode(hasher.finalize()))
}

fn file_digest(kind: SourceKind, path: Option<&Path>) -> Result<String, AppError> {
    let Some(path) = path.filter(|p| p.is_file()) else {
        if kind.is_required() {
            return Err(AppError::new(
                CONFIG_SOURCE_MISSING,
                format!("Required {} source not found", kind.label()),
            )
            .with_details(format!(
                "path={}",
                path.map(|p| p.display().to_string()).unwrap_or_default()
            )));
        }
        return Ok("absent".to_string());
    };
    let bytes = fs::read(path).map_err(|e| {
        AppError::new(CONFIG_SOURCE_MISSING, "Failed to read source for fingerprinting")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
