use std::path::Path;

use lopdf::Document;

use crate::error::{AppError, INGEST_PDF_FAILED};

/// Text of one PDF page, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfPage {
    pub number: u32,
    pub text: String,
}

/// Extract the text layer of every page. Any structural or decoding failure is fatal.
pub fn extract_pages(path: &Path) -> Result<Vec<PdfPage>, AppError> {
    let doc = Document::load(path).map_err(|e| {
        AppError::new(INGEST_PDF_FAILED, "Failed to open PDF document")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    // BTreeMap keys: page numbers ascending.
    let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if numbers.is_empty() {
        return Err(AppError::new(INGEST_PDF_FAILED, "PDF document has no pages")
            .with_details(format!("path={}", path.display())));
    }

    let mut pages = Vec::with_capacity(numbers.len());
    for number in numbers {
        let text = doc.extract_text(&[number]).map_err(|e| {
            AppError::new(INGEST_PDF_FAILED, "Failed to extract PDF page text")
                .with_details(format!("path={}; page={}; err={}", path.display(), number, e))
        })?;
        pages.push(PdfPage {
            number,
            text: normalize_page_text(&text),
        });
    }
    Ok(pages)
}

fn normalize_page_text(s: &str) -> String {
    s.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
