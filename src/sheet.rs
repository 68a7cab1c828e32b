//! Reading an uploaded export file into a rectangular grid of cells.
//!
//! Supports CSV and the first worksheet of an XLSX workbook. The grid is
//! returned with its header row still in place; `series::build` discards
//! row 0.

use crate::error::{AppError, Result};
use crate::models::CellValue;
use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;
use std::path::Path;
use tracing::warn;

/// Upload size the original feed advertises. Larger files are still
/// processed; we only log a warning.
pub const ADVISORY_SIZE_LIMIT: u64 = 200 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Xlsx,
}

/// Validate the upload before any bytes are read.
///
/// Mirrors the feed's upload contract: only `.csv` and `.xlsx` files are
/// accepted, and a missing file is a validation error, not an IO error.
pub fn validate_upload(path: &Path) -> Result<SheetFormat> {
    if !path.exists() {
        return Err(AppError::Validation(format!(
            "Input file does not exist: {}",
            path.display()
        )));
    }
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => Ok(SheetFormat::Csv),
        Some("xlsx") => Ok(SheetFormat::Xlsx),
        _ => Err(AppError::Validation(
            "Please upload a valid CSV or XLSX file".to_string(),
        )),
    }
}

/// Parse the whole file into rows of typed cells.
///
/// The full byte buffer is in hand before parsing starts; decoding needs
/// random access to the sheet, not a streaming pass.
pub fn parse_sheet(bytes: &[u8], format: SheetFormat) -> Result<Vec<Vec<CellValue>>> {
    if bytes.len() as u64 > ADVISORY_SIZE_LIMIT {
        warn!(
            size = bytes.len(),
            "input exceeds the advertised 200 MB limit; processing anyway"
        );
    }
    match format {
        SheetFormat::Csv => parse_csv(bytes),
        SheetFormat::Xlsx => parse_xlsx(bytes),
    }
}

fn parse_csv(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                let trimmed = field.trim();
                if trimmed.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(trimmed.to_string())
                }
            })
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn parse_xlsx(bytes: &[u8]) -> Result<Vec<Vec<CellValue>>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Sheet("workbook contains no worksheets".to_string()))??;

    let rows = range
        .rows()
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();
    Ok(rows)
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(trimmed.to_string())
            }
        }
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Number(if *b { 1.0 } else { 0.0 }),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => CellValue::DateTime(naive),
            None => CellValue::Empty,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}
