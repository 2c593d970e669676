//! Table Reader: turns one source file into raw tables, resolving the header
//! position with a two-attempt state machine.
//!
//! The first physical row is read verbatim and checked by the anomaly
//! detector. A clean header is used as-is; an anomalous one triggers exactly
//! one re-read with the first two rows skipped, taking the header from the
//! third physical row. A second anomalous header excludes the table.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::Context;
use calamine::{Data, Reader, open_workbook_auto};
use encoding_rs::Encoding;
use log::debug;

use crate::{
    data::ColumnType,
    header::{HeaderAttempt, HeaderCandidate},
    io_utils,
    report::{CoercionLoss, SourceError},
    table::RawTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Delimited,
    Workbook,
}

/// Classifies a path by extension; `None` means the file is not a tabular
/// source and is ignored by the pipeline.
pub fn source_kind(path: &Path) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" | "tsv" => Some(SourceKind::Delimited),
        "xlsx" | "xlsm" | "xls" => Some(SourceKind::Workbook),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: encoding_rs::UTF_8,
        }
    }
}

/// Result of reading one source file: the surviving tables plus any per-table
/// errors. A workbook sheet can fail header resolution without taking its
/// sibling sheets down.
#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub tables: Vec<RawTable>,
    pub errors: Vec<SourceError>,
}

/// Reads every table a source yields: one for a CSV/TSV file, one per sheet
/// for a workbook. Never touches the filesystem beyond reading the source.
pub fn read_tables(
    path: &Path,
    overrides: &HashMap<String, ColumnType>,
    options: &ReadOptions,
    losses: &mut Vec<CoercionLoss>,
) -> ReadOutcome {
    match source_kind(path) {
        Some(SourceKind::Delimited) => read_delimited(path, overrides, options, losses),
        Some(SourceKind::Workbook) => read_workbook(path, overrides, losses),
        None => ReadOutcome {
            tables: Vec::new(),
            errors: vec![SourceError::Unreadable {
                path: path.to_path_buf(),
                reason: "unsupported file format".to_string(),
            }],
        },
    }
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_delimited(
    path: &Path,
    overrides: &HashMap<String, ColumnType>,
    options: &ReadOptions,
    losses: &mut Vec<CoercionLoss>,
) -> ReadOutcome {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let table_name = file_stem(path);
    let mut attempt = HeaderAttempt::Offset0;
    let mut outcome = ReadOutcome::default();

    loop {
        let (header, rows) =
            match read_csv_rows(path, delimiter, options.encoding, attempt.skip_rows()) {
                Ok(parts) => parts,
                Err(err) => {
                    outcome.errors.push(SourceError::Unreadable {
                        path: path.to_path_buf(),
                        reason: format!("{err:#}"),
                    });
                    return outcome;
                }
            };
        let candidate = HeaderCandidate::new(header, attempt.skip_rows());
        if !candidate.is_anomalous() {
            outcome.tables.push(RawTable::from_string_rows(
                &table_name,
                candidate.tokens,
                rows,
                overrides,
                losses,
            ));
            return outcome;
        }
        match attempt.next() {
            Some(next) => {
                debug!(
                    "Anomalous header at row offset {} in {path:?}; re-reading from offset {}",
                    candidate.offset,
                    next.skip_rows()
                );
                attempt = next;
            }
            None => {
                outcome.errors.push(SourceError::HeaderStillAnomalous {
                    path: path.to_path_buf(),
                    table: table_name,
                });
                return outcome;
            }
        }
    }
}

/// Reads the file with `skip` leading physical rows discarded and splits off
/// the header row. The skip counts raw lines before any CSV parsing, so blank
/// rows that the parser would drop still count toward the offset.
fn read_csv_rows(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
    skip: usize,
) -> anyhow::Result<(Vec<String>, Vec<Vec<String>>)> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut buffered = BufReader::new(file);
    let mut discard = Vec::new();
    for _ in 0..skip {
        discard.clear();
        if buffered.read_until(b'\n', &mut discard)? == 0 {
            break;
        }
    }
    let mut reader = io_utils::open_csv_reader(buffered, delimiter);
    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        let decoded = io_utils::decode_record(&record, encoding)?;
        if header.is_none() {
            header = Some(decoded);
        } else {
            rows.push(decoded);
        }
    }
    let header = header
        .ok_or_else(|| anyhow::anyhow!("No header row found at physical row offset {skip}"))?;
    Ok((header, rows))
}

fn read_workbook(
    path: &Path,
    overrides: &HashMap<String, ColumnType>,
    losses: &mut Vec<CoercionLoss>,
) -> ReadOutcome {
    let mut outcome = ReadOutcome::default();
    let mut workbook = match open_workbook_auto(path) {
        Ok(workbook) => workbook,
        Err(err) => {
            outcome.errors.push(SourceError::Unreadable {
                path: path.to_path_buf(),
                reason: err.to_string(),
            });
            return outcome;
        }
    };

    let stem = file_stem(path);
    let sheet_names = workbook.sheet_names().to_owned();
    let multi_sheet = sheet_names.len() > 1;
    for sheet in sheet_names {
        let table_name = if multi_sheet {
            format!("{stem}_{}", sheet_slug(&sheet))
        } else {
            stem.clone()
        };
        let range = match workbook.worksheet_range(&sheet) {
            Ok(range) => range,
            Err(err) => {
                outcome.errors.push(SourceError::Unreadable {
                    path: path.to_path_buf(),
                    reason: format!("sheet '{sheet}': {err}"),
                });
                continue;
            }
        };
        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        match resolve_sheet(path, &table_name, rows, overrides, losses) {
            Ok(mut table) => {
                table.sheet = Some(sheet.clone());
                outcome.tables.push(table);
            }
            Err(err) => outcome.errors.push(err),
        }
    }
    outcome
}

/// The in-memory counterpart of the delimited two-attempt read; a workbook
/// range is already materialized, so the retry slices deeper instead of
/// re-reading the file.
fn resolve_sheet(
    path: &Path,
    table_name: &str,
    rows: Vec<Vec<String>>,
    overrides: &HashMap<String, ColumnType>,
    losses: &mut Vec<CoercionLoss>,
) -> Result<RawTable, SourceError> {
    let mut attempt = HeaderAttempt::Offset0;
    loop {
        let skip = attempt.skip_rows();
        let Some(header) = rows.get(skip) else {
            return Err(SourceError::Unreadable {
                path: path.to_path_buf(),
                reason: format!(
                    "sheet '{table_name}': no header row at physical row offset {skip}"
                ),
            });
        };
        let candidate = HeaderCandidate::new(header.clone(), skip);
        if !candidate.is_anomalous() {
            let data_rows = rows[skip + 1..].to_vec();
            return Ok(RawTable::from_string_rows(
                table_name,
                candidate.tokens,
                data_rows,
                overrides,
                losses,
            ));
        }
        match attempt.next() {
            Some(next) => {
                debug!(
                    "Anomalous header at row offset {skip} in {path:?} sheet '{table_name}'; \
                     retrying at offset {}",
                    next.skip_rows()
                );
                attempt = next;
            }
            None => {
                return Err(SourceError::HeaderStillAnomalous {
                    path: path.to_path_buf(),
                    table: table_name.to_string(),
                });
            }
        }
    }
}

fn sheet_slug(sheet: &str) -> String {
    sheet
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Integral floats render without a fraction so integer inference
        // still sees them; spreadsheets store most integers as floats.
        Data::Float(f) if f.fract() == 0.0 && f.is_finite() => (*f as i64).to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
