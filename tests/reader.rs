mod common;

use std::collections::HashMap;

use common::TestWorkspace;
use sheetfold::data::{ColumnType, Value};
use sheetfold::header::normalize_header;
use sheetfold::reader::{ReadOptions, read_tables};
use sheetfold::report::SourceError;

fn read_single(
    path: &std::path::Path,
    overrides: &HashMap<String, ColumnType>,
) -> (sheetfold::table::RawTable, Vec<sheetfold::report::CoercionLoss>) {
    let mut losses = Vec::new();
    let mut outcome = read_tables(path, overrides, &ReadOptions::default(), &mut losses);
    assert!(outcome.errors.is_empty(), "unexpected errors: {:?}", outcome.errors);
    assert_eq!(outcome.tables.len(), 1);
    (outcome.tables.remove(0), losses)
}

#[test]
fn clean_header_reads_in_one_pass_with_inferred_types() {
    let ws = TestWorkspace::new();
    let path = ws.write(
        "grades.csv",
        "id,score,grade,enrolled\n1,9.5,A,2023-09-01\n2,NA,B,2023-09-02\n",
    );
    let (table, losses) = read_single(&path, &HashMap::new());
    assert_eq!(table.name, "grades");
    assert_eq!(table.column_names(), vec!["id", "score", "grade", "enrolled"]);
    let types: Vec<ColumnType> = table.columns.iter().map(|c| c.ty).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Integer,
            ColumnType::Float,
            ColumnType::Text,
            ColumnType::Timestamp,
        ]
    );
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.columns[1].values[1], None);
    assert!(losses.is_empty());
}

#[test]
fn anomalous_header_triggers_re_read_from_third_row() {
    let ws = TestWorkspace::new();
    // Placeholder header in row 1, titling junk in row 2, real header in row 3.
    let path = ws.write(
        "export.csv",
        "Unnamed: 0,score,Unnamed: 2\n,,\nid,score,grade\n1,9.5,A\n2,8.0,B\n",
    );
    let (table, _) = read_single(&path, &HashMap::new());
    assert_eq!(table.column_names(), vec!["id", "score", "grade"]);
    assert_eq!(table.row_count(), 2);
    assert_eq!(table.columns[0].values[0], Some(Value::Integer(1)));
}

#[test]
fn blank_physical_row_still_counts_toward_the_retry_offset() {
    let ws = TestWorkspace::new();
    // Row 2 is completely blank; the retry must still take the header from
    // the third physical row.
    let path = ws.write(
        "export.csv",
        "Unnamed: 0,score\n\nid,score\n1,9.5\n",
    );
    let (table, _) = read_single(&path, &HashMap::new());
    assert_eq!(table.column_names(), vec!["id", "score"]);
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.columns[0].values[0], Some(Value::Integer(1)));
}

#[test]
fn still_anomalous_header_after_retry_excludes_the_table() {
    let ws = TestWorkspace::new();
    let path = ws.write(
        "hopeless.csv",
        "Unnamed: 0,Unnamed: 1\nx,y\nUnnamed: 0,value (duplicate)\n1,2\n",
    );
    let mut losses = Vec::new();
    let outcome = read_tables(
        &path,
        &HashMap::new(),
        &ReadOptions::default(),
        &mut losses,
    );
    assert!(outcome.tables.is_empty());
    assert_eq!(outcome.errors.len(), 1);
    assert!(matches!(
        &outcome.errors[0],
        SourceError::HeaderStillAnomalous { table, .. } if table == "hopeless"
    ));
}

#[test]
fn missing_file_reports_unreadable_and_yields_no_tables() {
    let ws = TestWorkspace::new();
    let path = ws.path().join("does_not_exist.csv");
    let mut losses = Vec::new();
    let outcome = read_tables(
        &path,
        &HashMap::new(),
        &ReadOptions::default(),
        &mut losses,
    );
    assert!(outcome.tables.is_empty());
    assert!(matches!(
        &outcome.errors[0],
        SourceError::Unreadable { .. }
    ));
}

#[test]
fn empty_file_reports_missing_header() {
    let ws = TestWorkspace::new();
    let path = ws.write("empty.csv", "");
    let mut losses = Vec::new();
    let outcome = read_tables(
        &path,
        &HashMap::new(),
        &ReadOptions::default(),
        &mut losses,
    );
    assert!(outcome.tables.is_empty());
    assert_eq!(outcome.errors.len(), 1);
}

#[test]
fn tsv_extension_resolves_to_tab_delimiter() {
    let ws = TestWorkspace::new();
    let path = ws.write("sample.tsv", "id\tname\n1\tAlice\n");
    let (table, _) = read_single(&path, &HashMap::new());
    assert_eq!(table.column_names(), vec!["id", "name"]);
    assert_eq!(table.columns[1].values[0], Some(Value::Text("Alice".into())));
}

#[test]
fn type_override_forces_column_type_regardless_of_inference() {
    let ws = TestWorkspace::new();
    let path = ws.write("scores.csv", "id,Score\n1,10\n2,12\n");
    let overrides = HashMap::from([(normalize_header("Score"), ColumnType::Float)]);
    let (table, losses) = read_single(&path, &overrides);
    assert_eq!(table.columns[1].ty, ColumnType::Float);
    assert_eq!(table.columns[1].values[0], Some(Value::Float(10.0)));
    assert!(losses.is_empty());
}

#[test]
fn override_parse_failures_become_null_with_recorded_loss() {
    let ws = TestWorkspace::new();
    let path = ws.write("scores.csv", "score\n10\nwithheld\n");
    let overrides = HashMap::from([("score".to_string(), ColumnType::Integer)]);
    let (table, losses) = read_single(&path, &overrides);
    assert_eq!(table.columns[0].values[1], None);
    assert_eq!(losses.len(), 1);
    assert_eq!(losses[0].value, "withheld");
}
