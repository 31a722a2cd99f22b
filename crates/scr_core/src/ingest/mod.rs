use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SourcePaths;
use crate::domain::{LoadWarning, SourceKind, SourceRecord};
use crate::error::{
    AppError, CONFIG_SOURCE_MISSING, INGEST_AUX_SOURCE_MISSING, INGEST_SAMPLE_PARSE_FALLBACK,
    INGEST_SAMPLE_SOURCE_MISSING, INGEST_SAMPLE_UNREADABLE,
};

pub mod pdf;
pub mod table;
pub mod xml_sample;

use xml_sample::SampleText;

/// Output of one load pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadedCorpus {
    pub records: Vec<SourceRecord>,
    pub warnings: Vec<LoadWarning>,
}

impl LoadedCorpus {
    pub fn count_by_kind(&self, kind: SourceKind) -> usize {
        self.records.iter().filter(|r| r.source_kind == kind).count()
    }
}

/// Untagged record as produced by a per-kind reader.
struct Draft {
    content: String,
    locator: Option<String>,
}

/// Load every configured source into tagged records.
///
/// Required sources (PDF, primary table) fail closed with `CONFIG_SOURCE_MISSING` before any
/// document is parsed. Optional sources degrade to an empty contribution plus a warning. A
/// malformed PDF or table is fatal; a malformed XML sample is kept as raw text.
pub fn load_corpus(paths: &SourcePaths) -> Result<LoadedCorpus, AppError> {
    require_source(SourceKind::Pdf, &paths.pdf)?;
    require_source(SourceKind::Table, &paths.table)?;

    let mut warnings = Vec::new();

    let pdf_drafts: Vec<Draft> = pdf::extract_pages(&paths.pdf)?
        .into_iter()
        .map(|p| Draft {
            content: p.text,
            locator: Some(format!("page {}", p.number)),
        })
        .collect();

    let table_drafts = read_table(&paths.table)?;

    let aux_drafts = match paths.table_aux.as_deref() {
        Some(p) if p.is_file() => read_table(p)?,
        other => {
            let shown = other
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not configured)".to_string());
            warn!(path = %shown, "auxiliary table not found; continuing without it");
            warnings.push(
                LoadWarning::new(
                    INGEST_AUX_SOURCE_MISSING,
                    "Auxiliary table not found; continuing without it",
                )
                .with_details(format!("path={shown}")),
            );
            Vec::new()
        }
    };

    let sample_drafts = load_sample(&paths.structured_sample, &mut warnings);

    let groups = [
        (SourceKind::Pdf, pdf_drafts),
        (SourceKind::Table, table_drafts),
        (SourceKind::TableAux, aux_drafts),
        (SourceKind::StructuredSample, sample_drafts),
    ];
    let records = tag_records(groups);

    info!(
        records = records.len(),
        warnings = warnings.len(),
        "corpus loaded"
    );
    Ok(LoadedCorpus { records, warnings })
}

fn require_source(kind: SourceKind, path: &Path) -> Result<(), AppError> {
    if path.is_file() {
        return Ok(());
    }
    Err(AppError::new(
        CONFIG_SOURCE_MISSING,
        format!("Required {} source not found", kind.label()),
    )
    .with_details(format!("path={}", path.display())))
}

fn read_table(path: &Path) -> Result<Vec<Draft>, AppError> {
    Ok(table::read_sheets(path)?
        .into_iter()
        .map(|s| Draft {
            content: s.text,
            locator: Some(format!("sheet {}", s.name)),
        })
        .collect())
}

fn load_sample(path: &Path, warnings: &mut Vec<LoadWarning>) -> Vec<Draft> {
    if !path.is_file() {
        warn!(path = %path.display(), "structured sample not found; continuing without it");
        warnings.push(
            LoadWarning::new(
                INGEST_SAMPLE_SOURCE_MISSING,
                "Structured sample not found; continuing without it",
            )
            .with_details(format!("path={}", path.display())),
        );
        return Vec::new();
    }

    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "structured sample unreadable");
            warnings.push(
                LoadWarning::new(INGEST_SAMPLE_UNREADABLE, "Structured sample could not be read")
                    .with_details(format!("path={}; err={}", path.display(), e)),
            );
            return Vec::new();
        }
    };

    let content = match xml_sample::describe_sample(&bytes) {
        SampleText::Structured(text) => text,
        SampleText::Raw { text, parse_error } => {
            warn!(path = %path.display(), error = %parse_error, "structured sample kept as raw text");
            warnings.push(
                LoadWarning::new(
                    INGEST_SAMPLE_PARSE_FALLBACK,
                    "Structured sample did not parse; using raw text",
                )
                .with_details(format!("path={}; err={}", path.display(), parse_error)),
            );
            text
        }
    };
    vec![Draft {
        content,
        locator: None,
    }]
}

/// Assign provenance after concatenation, walking groups in the order given.
fn tag_records<const N: usize>(groups: [(SourceKind, Vec<Draft>); N]) -> Vec<SourceRecord> {
    let mut out = Vec::new();
    for (kind, drafts) in groups {
        for d in drafts {
            let sequence_id = out.len() as u32;
            out.push(SourceRecord {
                content: d.content,
                source_kind: kind,
                sequence_id,
                locator: d.locator,
            });
        }
    }
    out
}
