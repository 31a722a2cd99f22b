use serde::{Deserialize, Serialize};

/// Provenance of a loaded record. Declaration order is the order in which record groups are
/// concatenated by the corpus loader.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Pdf,
    Table,
    TableAux,
    StructuredSample,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Pdf,
        SourceKind::Table,
        SourceKind::TableAux,
        SourceKind::StructuredSample,
    ];

    /// Short label shown next to retrieved passages.
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Pdf => "PDF",
            SourceKind::Table => "XLS_Leiaute",
            SourceKind::TableAux => "XLS_Criticas",
            SourceKind::StructuredSample => "XML",
        }
    }

    pub fn is_required(self) -> bool {
        matches!(self, SourceKind::Pdf | SourceKind::Table)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One normalized unit extracted from an input document.
///
/// Notes:
/// - `source_kind` and `sequence_id` are assigned once, after all record groups are
///   concatenated; they are never changed afterwards.
/// - `sequence_id` is for provenance display only and carries no ordering guarantee.
/// - `locator` is a human hint (page number, sheet name), never parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRecord {
    pub content: String,
    pub source_kind: SourceKind,
    pub sequence_id: u32,
    pub locator: Option<String>,
}

/// Non-fatal observation made while loading the corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl LoadWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
