//! Text rendition of tabular statement originals
//!
//! Banks export statements as spreadsheets (`.xls`, `.xlsx`) or delimited
//! text. Rows of every sheet are flattened to `cell | cell | ...` lines,
//! which the extraction model reads more reliably than the archive's OCR of
//! the same file.

use crate::models::OriginalFile;
use crate::Result;
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;

/// Render a tabular original as text.
///
/// Returns `Ok(None)` for files that are not spreadsheets or delimited text,
/// and for tables without a single non-empty row; the caller then falls back
/// to the archive's OCR content.
pub fn tabulate(original: &OriginalFile) -> Result<Option<String>> {
    let extension = Path::new(&original.filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    let lines = match extension.as_deref() {
        Some("xls") | Some("xlsx") => spreadsheet_lines(&original.bytes)?,
        Some("csv") => delimited_lines(&original.bytes, sniff_delimiter(&original.bytes))?,
        Some("tsv") => delimited_lines(&original.bytes, b'\t')?,
        _ => return Ok(None),
    };

    if lines.is_empty() {
        return Ok(None);
    }
    Ok(Some(lines.join("\n")))
}

fn spreadsheet_lines(bytes: &[u8]) -> Result<Vec<String>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let mut lines = Vec::new();
    for (_, range) in workbook.worksheets() {
        for row in range.rows() {
            push_row(&mut lines, row.iter().map(cell_text).collect());
        }
    }
    Ok(lines)
}

/// Date cells hold day serials; render them as ISO dates.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(|date| date.to_string())
            .unwrap_or_else(|| cell.to_string()),
        _ => cell.to_string().trim().to_string(),
    }
}

fn delimited_lines(bytes: &[u8], delimiter: u8) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let mut lines = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let cells = record
            .iter()
            .map(|cell| String::from_utf8_lossy(cell).trim().to_string())
            .collect();
        push_row(&mut lines, cells);
    }
    Ok(lines)
}

fn push_row(lines: &mut Vec<String>, cells: Vec<String>) {
    if cells.iter().all(|c| c.is_empty()) {
        return;
    }
    lines.push(cells.join(" | "));
}

/// Semicolons are common in European bank exports; pick whichever of `;` and
/// `,` occurs more often on the first line.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or(&[]);
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}
