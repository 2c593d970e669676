//! In-memory table representation and content-driven type inference.

use std::collections::HashMap;

use crate::{
    data::{ColumnType, Value, int_to_float_is_lossy, is_null_token, parse_boolean,
        parse_naive_datetime, parse_typed_value},
    header::normalize_header,
    report::CoercionLoss,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub values: Vec<Option<Value>>,
}

/// One table produced by one read of one file or one workbook sheet.
/// Column-major; immutable once built. Types are resolved once, after all
/// values have been read, never per-access.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Logical/sheet identifier assigned by the reader (file stem, with the
    /// sheet name appended for multi-sheet workbooks).
    pub name: String,
    /// The workbook sheet this table came from, when the source has sheets.
    pub sheet: Option<String>,
    pub columns: Vec<Column>,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Applies the column normalizer to every header. Idempotent; collisions
    /// between normalized names are kept as distinct positional columns.
    pub fn normalize_headers(mut self) -> Self {
        for column in &mut self.columns {
            column.name = normalize_header(&column.name);
        }
        self
    }

    /// Renders the table as CSV records: a header row followed by one record
    /// per row, nulls as empty fields.
    pub fn to_records(&self) -> Vec<Vec<String>> {
        let mut records = Vec::with_capacity(self.row_count() + 1);
        records.push(self.column_names());
        for row_idx in 0..self.row_count() {
            let record = self
                .columns
                .iter()
                .map(|column| {
                    column.values[row_idx]
                        .as_ref()
                        .map(Value::as_display)
                        .unwrap_or_default()
                })
                .collect();
            records.push(record);
        }
        records
    }

    /// Builds a table from a resolved header and raw string rows, inferring
    /// per-column types from content. `overrides` force a type for any column
    /// whose normalized name matches, regardless of inference; cells that do
    /// not parse under a forced type become null and are recorded as losses.
    pub fn from_string_rows(
        name: &str,
        header: Vec<String>,
        rows: Vec<Vec<String>>,
        overrides: &HashMap<String, ColumnType>,
        losses: &mut Vec<CoercionLoss>,
    ) -> Self {
        let width = header.len();
        let types: Vec<ColumnType> = header
            .iter()
            .enumerate()
            .map(|(idx, column_name)| {
                match overrides.get(&normalize_header(column_name)) {
                    Some(forced) => *forced,
                    None => infer_column_type(&rows, idx),
                }
            })
            .collect();

        let mut columns: Vec<Column> = header
            .into_iter()
            .zip(types.iter())
            .map(|(column_name, ty)| Column {
                name: column_name,
                ty: *ty,
                values: Vec::with_capacity(rows.len()),
            })
            .collect();

        for row in &rows {
            for idx in 0..width {
                // Short rows pad with null; cells beyond the header are dropped.
                let raw = row.get(idx).map(String::as_str).unwrap_or("");
                // An integer-looking cell in a float column loses precision
                // past 2^53 when parsed as f64.
                if types[idx] == ColumnType::Float {
                    if let Ok(i) = raw.trim().parse::<i64>() {
                        if int_to_float_is_lossy(i) {
                            losses.push(CoercionLoss {
                                table: name.to_string(),
                                column: columns[idx].name.clone(),
                                value: raw.trim().to_string(),
                            });
                        }
                    }
                }
                let cell = match parse_typed_value(raw, types[idx]) {
                    Ok(cell) => cell,
                    Err(_) => {
                        losses.push(CoercionLoss {
                            table: name.to_string(),
                            column: columns[idx].name.clone(),
                            value: raw.to_string(),
                        });
                        None
                    }
                };
                columns[idx].values.push(cell);
            }
        }

        RawTable {
            name: name.to_string(),
            sheet: None,
            columns,
        }
    }
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_integer: bool,
    possible_float: bool,
    possible_boolean: bool,
    possible_timestamp: bool,
    saw_value: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_integer: true,
            possible_float: true,
            possible_boolean: true,
            possible_timestamp: true,
            saw_value: false,
        }
    }

    fn observe(&mut self, value: &str) {
        if is_null_token(value) {
            return;
        }
        let value = value.trim();
        self.saw_value = true;
        if self.possible_boolean && parse_boolean(value).is_err() {
            self.possible_boolean = false;
        }
        if self.possible_integer && value.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_float && value.parse::<f64>().is_err() {
            self.possible_float = false;
        }
        if self.possible_timestamp && parse_naive_datetime(value).is_err() {
            self.possible_timestamp = false;
        }
    }

    fn decide(&self) -> ColumnType {
        if !self.saw_value {
            ColumnType::Unknown
        } else if self.possible_boolean {
            ColumnType::Boolean
        } else if self.possible_integer {
            ColumnType::Integer
        } else if self.possible_float {
            ColumnType::Float
        } else if self.possible_timestamp {
            ColumnType::Timestamp
        } else {
            ColumnType::Text
        }
    }
}

fn infer_column_type(rows: &[Vec<String>], idx: usize) -> ColumnType {
    let mut candidate = TypeCandidate::new();
    for row in rows {
        if let Some(value) = row.get(idx) {
            candidate.observe(value);
        }
    }
    candidate.decide()
}
