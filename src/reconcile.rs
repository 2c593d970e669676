//! Schema Reconciler: the diagonal/relaxed union of tables with
//! non-identical column sets.
//!
//! The output column set is the union of all members' columns in first-seen
//! order. Every input row survives exactly once; cells for columns a member
//! lacks are null. Column types unify by precedence: equal types keep,
//! unknown yields, integer widens to float, and any other mix falls back to
//! text with each rewritten value recorded as a coercion loss.

use std::collections::HashMap;

use crate::{
    data::{ColumnType, Value, int_to_float_is_lossy},
    report::{CoercionLoss, ReconcileError},
    table::{Column, RawTable},
};

pub fn reconcile(
    name: &str,
    tables: Vec<RawTable>,
    losses: &mut Vec<CoercionLoss>,
) -> Result<RawTable, ReconcileError> {
    if tables.is_empty() {
        return Err(ReconcileError::EmptyGroup(name.to_string()));
    }

    // Union columns are keyed by (name, occurrence) so duplicate column
    // names within one member stay distinct positional columns.
    let mut union: Vec<(String, usize, ColumnType)> = Vec::new();
    let mut union_index: HashMap<(String, usize), usize> = HashMap::new();
    for table in &tables {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for column in &table.columns {
            let occurrence = seen.entry(column.name.as_str()).or_insert(0);
            let key = (column.name.clone(), *occurrence);
            *occurrence += 1;
            match union_index.get(&key) {
                Some(&idx) => {
                    let unified = unify_types(union[idx].2, column.ty);
                    union[idx].2 = unified;
                }
                None => {
                    union_index.insert(key, union.len());
                    union.push((column.name.clone(), *occurrence - 1, column.ty));
                }
            }
        }
    }

    let total_rows: usize = tables.iter().map(RawTable::row_count).sum();
    let mut columns: Vec<Column> = union
        .iter()
        .map(|(column_name, _, ty)| Column {
            name: column_name.clone(),
            ty: *ty,
            values: Vec::with_capacity(total_rows),
        })
        .collect();

    for table in &tables {
        let row_count = table.row_count();
        // Map each union slot to the member's matching column, if present.
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut member_slots: HashMap<usize, &Column> = HashMap::new();
        for column in &table.columns {
            let occurrence = seen.entry(column.name.as_str()).or_insert(0);
            let key = (column.name.clone(), *occurrence);
            *occurrence += 1;
            if let Some(&idx) = union_index.get(&key) {
                member_slots.insert(idx, column);
            }
        }
        for (idx, out_column) in columns.iter_mut().enumerate() {
            match member_slots.get(&idx) {
                Some(member) => {
                    for cell in &member.values {
                        out_column.values.push(convert_cell(
                            cell.clone(),
                            out_column.ty,
                            &table.name,
                            &out_column.name,
                            losses,
                        ));
                    }
                }
                None => out_column
                    .values
                    .extend(std::iter::repeat_n(None, row_count)),
            }
        }
    }

    Ok(RawTable {
        name: name.to_string(),
        sheet: None,
        columns,
    })
}

/// Common representable type for two contributing column types. Text is the
/// universal fallback; nothing here ever discards a value.
pub fn unify_types(left: ColumnType, right: ColumnType) -> ColumnType {
    use ColumnType::*;
    match (left, right) {
        (a, b) if a == b => a,
        (Unknown, other) | (other, Unknown) => other,
        (Integer, Float) | (Float, Integer) => Float,
        _ => Text,
    }
}

fn convert_cell(
    cell: Option<Value>,
    target: ColumnType,
    table_name: &str,
    column_name: &str,
    losses: &mut Vec<CoercionLoss>,
) -> Option<Value> {
    let value = cell?;
    if value.column_type() == target {
        return Some(value);
    }
    match (&value, target) {
        (Value::Integer(i), ColumnType::Float) => {
            // Widening past f64's integer precision changes the value.
            if int_to_float_is_lossy(*i) {
                losses.push(CoercionLoss {
                    table: table_name.to_string(),
                    column: column_name.to_string(),
                    value: i.to_string(),
                });
            }
            Some(Value::Float(*i as f64))
        }
        _ => {
            // Resolved common type is text; rewrite the value in canonical
            // textual form and record the occurrence.
            let rendered = value.as_display();
            losses.push(CoercionLoss {
                table: table_name.to_string(),
                column: column_name.to_string(),
                value: rendered.clone(),
            });
            Some(Value::Text(rendered))
        }
    }
}
