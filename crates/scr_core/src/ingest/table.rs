use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{AppError, INGEST_TABLE_FAILED};

const CELL_SEPARATOR: &str = " | ";

/// Flattened text of one worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetText {
    pub name: String,
    pub text: String,
}

/// Read a tabular source into one text block per sheet. CSV files are a single sheet named
/// after the file stem; `.xls`, `.xlsx`, `.xlsm`, `.xlsb` and `.ods` workbooks yield one block
/// per worksheet in workbook order.
pub fn read_sheets(path: &Path) -> Result<Vec<SheetText>, AppError> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "tsv" | "txt" => read_delimited(path, if ext == "tsv" { b'\t' } else { b',' }),
        "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => read_workbook(path),
        _ => Err(
            AppError::new(INGEST_TABLE_FAILED, "Unsupported table file extension")
                .with_details(format!("path={}; ext={}", path.display(), ext)),
        ),
    }
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Vec<SheetText>, AppError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| {
            AppError::new(INGEST_TABLE_FAILED, "Failed to open table file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;

    let mut lines = Vec::new();
    for (row_idx, result) in rdr.records().enumerate() {
        let row = result.map_err(|e| {
            AppError::new(INGEST_TABLE_FAILED, "Failed to parse table row")
                .with_details(format!("path={}; row={}; err={}", path.display(), row_idx + 1, e))
        })?;
        if let Some(line) = render_row(row.iter()) {
            lines.push(line);
        }
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("sheet")
        .to_string();
    Ok(vec![sheet_text(name, &lines)])
}

fn read_workbook(path: &Path) -> Result<Vec<SheetText>, AppError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        AppError::new(INGEST_TABLE_FAILED, "Failed to open workbook")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;

    let mut out = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name).map_err(|e| {
            AppError::new(INGEST_TABLE_FAILED, "Failed to read worksheet")
                .with_details(format!("path={}; sheet={}; err={}", path.display(), name, e))
        })?;
        let lines: Vec<String> = range
            .rows()
            .filter_map(|row| render_row(row.iter().map(cell_text)))
            .collect();
        out.push(sheet_text(name, &lines));
    }
    if out.is_empty() {
        return Err(AppError::new(INGEST_TABLE_FAILED, "Workbook has no worksheets")
            .with_details(format!("path={}", path.display())));
    }
    Ok(out)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// Join the non-empty cells of a row; `None` when the row is blank.
fn render_row<I, S>(cells: I) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = cells
        .into_iter()
        .map(|c| c.as_ref().split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|c| !c.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(CELL_SEPARATOR))
    }
}

fn sheet_text(name: String, lines: &[String]) -> SheetText {
    let mut text = format!("Sheet: {name}");
    for line in lines {
        text.push('\n');
        text.push_str(line);
    }
    SheetText { name, text }
}
