use calamine::{open_workbook_from_rs, Reader, Xlsx, XlsxError};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Problems with an uploaded target list
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Invalid file type. Only CSV and XLSX files are allowed")]
    UnsupportedFileType(String),

    #[error("failed to read {file}: {reason}")]
    Read { file: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Xlsx,
}

fn format_of(file_name: &str) -> Result<Format, IntakeError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("csv") => Ok(Format::Csv),
        Some("xlsx") => Ok(Format::Xlsx),
        _ => Err(IntakeError::UnsupportedFileType(file_name.to_string())),
    }
}

/// Targets from the first column of a CSV or XLSX file.
///
/// The first row is a header. Blank cells are skipped.
pub fn read_targets(file_name: &str, bytes: &[u8]) -> Result<Vec<String>, IntakeError> {
    let format = format_of(file_name)?;
    let read_error = |reason: String| IntakeError::Read { file: file_name.to_string(), reason };

    let targets = match format {
        Format::Csv => read_csv(bytes).map_err(|e| read_error(e.to_string()))?,
        Format::Xlsx => read_xlsx(bytes).map_err(read_error)?,
    };

    debug!("Read {} targets from {}", targets.len(), file_name);
    Ok(targets)
}

/// Same as [`read_targets`] for a file on disk
pub fn read_targets_from_path(path: &Path) -> Result<Vec<String>, IntakeError> {
    let file_name = path.display().to_string();
    format_of(&file_name)?;
    let bytes = std::fs::read(path)
        .map_err(|e| IntakeError::Read { file: file_name.clone(), reason: e.to_string() })?;
    read_targets(&file_name, &bytes)
}

fn read_csv(bytes: &[u8]) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let mut targets = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(cell) = record.get(0).map(str::trim).filter(|cell| !cell.is_empty()) {
            targets.push(cell.to_string());
        }
    }
    Ok(targets)
}

fn read_xlsx(bytes: &[u8]) -> Result<Vec<String>, String> {
    let mut workbook: Xlsx<Cursor<&[u8]>> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|e: XlsxError| e.to_string())?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "workbook has no sheets".to_string())?
        .map_err(|e: XlsxError| e.to_string())?;

    let targets = range
        .rows()
        .skip(1)
        .filter_map(|row| row.first())
        .map(|cell| cell.to_string().trim().to_string())
        .filter(|cell| !cell.is_empty())
        .collect();

    Ok(targets)
}
