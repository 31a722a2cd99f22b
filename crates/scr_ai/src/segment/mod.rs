use std::ops::Range;

use scr_core::config::ChunkingConfig;
use scr_core::domain::{SourceKind, SourceRecord};
use scr_core::error::{AppError, CONFIG_INVALID};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use text_splitter::{ChunkConfig, TextSplitter};

/// Bounded slice of one record's text, the unit that gets embedded and retrieved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub source_kind: SourceKind,
    pub sequence_id: u32,
    pub locator: Option<String>,
    /// Position among the segments of the same record.
    pub ordinal: u32,
    /// Character offsets within the record content.
    pub char_range: Range<usize>,
    pub text_sha256: String,
}

impl Segment {
    /// Provenance tag shown with retrieved passages, e.g. `PDF #3 (page 4)`.
    pub fn provenance(&self) -> String {
        match self.locator.as_deref() {
            Some(loc) => format!("{} #{} ({})", self.source_kind.label(), self.sequence_id, loc),
            None => format!("{} #{}", self.source_kind.label(), self.sequence_id),
        }
    }
}

/// Split every record into segments of at most `max_chars` characters.
///
/// The splitter prefers the coarsest boundary that fits (blank line, line, sentence, word,
/// character). Up to `overlap_chars` of trailing text is carried into the next segment, taken
/// in whole sections of the level chosen for that chunk, so sections wider than the overlap
/// window are never repeated. Records with only whitespace contribute nothing.
pub fn segment_records(
    records: &[SourceRecord],
    cfg: &ChunkingConfig,
) -> Result<Vec<Segment>, AppError> {
    cfg.validate()?;
    let chunk_config = ChunkConfig::new(cfg.max_chars)
        .with_overlap(cfg.overlap_chars)
        .map_err(|e| {
            AppError::new(CONFIG_INVALID, "Invalid chunking configuration")
                .with_details(e.to_string())
        })?;
    let splitter = TextSplitter::new(chunk_config);

    let mut out = Vec::new();
    for rec in records {
        let mut ordinal: u32 = 0;
        for (byte_offset, chunk) in splitter.chunk_indices(&rec.content) {
            if chunk.trim().is_empty() {
                continue;
            }
            let start = rec.content[..byte_offset].chars().count();
            let len = chunk.chars().count();
            out.push(Segment {
                text: chunk.to_string(),
                source_kind: rec.source_kind,
                sequence_id: rec.sequence_id,
                locator: rec.locator.clone(),
                ordinal,
                char_range: start..start + len,
                text_sha256: sha256_hex(chunk),
            });
            ordinal += 1;
        }
    }
    Ok(out)
}

fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
