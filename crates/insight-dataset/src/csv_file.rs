use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::{DatasetError, Result};

const UTF8_BOM: &str = "\u{feff}";

fn reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes)
}

fn record_to_vec(record: &StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}

/// Reads the header row (first record) of a CSV file.
///
/// Fails with [`DatasetError::MalformedFile`] when the file is empty or not
/// valid CSV.
pub fn parse_header(bytes: &[u8]) -> Result<Vec<String>> {
    let mut records = reader(bytes).into_records();
    let first = records
        .next()
        .ok_or_else(|| DatasetError::MalformedFile("file has no header row".into()))?
        .map_err(|e| DatasetError::MalformedFile(e.to_string()))?;

    let mut header = record_to_vec(&first);
    if let Some(name) = header.first_mut() {
        if let Some(stripped) = name.strip_prefix(UTF8_BOM) {
            *name = stripped.to_string();
        }
    }
    Ok(header)
}

/// Reads every row, header included, as raw strings. Rows may be ragged.
pub fn read_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    for record in reader(bytes).into_records() {
        let record = record.map_err(|e| DatasetError::MalformedFile(e.to_string()))?;
        rows.push(record_to_vec(&record));
    }
    if let Some(name) = rows.first_mut().and_then(|row| row.first_mut()) {
        if let Some(stripped) = name.strip_prefix(UTF8_BOM) {
            *name = stripped.to_string();
        }
    }
    Ok(rows)
}

/// Re-encodes CSV text submitted from the spreadsheet editor so the stored
/// file always has consistent quoting.
pub fn normalize(text: &str) -> Result<Vec<u8>> {
    let rows = read_rows(text.as_bytes())?;
    let mut writer = WriterBuilder::new().flexible(true).from_writer(Vec::new());
    for row in &rows {
        writer
            .write_record(row)
            .map_err(|e| DatasetError::MalformedFile(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| DatasetError::MalformedFile(e.to_string()))
}
