//! Metadata Cataloger: the schema catalog document enumerating every output
//! table's columns and inferred types.

use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    reader::{self, ReadOptions, SourceKind},
    table::RawTable,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnEntry {
    pub name: String,
    pub dtype: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub file: String,
    pub sheet_name: String,
    pub columns: Vec<ColumnEntry>,
}

/// The whole-run catalog, serialized as a bare JSON array and fully
/// regenerated on every run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Catalog {
    pub entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating catalog file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing catalog JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening catalog file {path:?}"))?;
        serde_json::from_reader(BufReader::new(file)).context("Parsing catalog JSON")
    }
}

/// Builds one entry per output table, columns in the table's own order,
/// entries in the order the outputs were produced. Performs no I/O.
pub fn build_catalog(outputs: &[(String, String, &RawTable)]) -> Catalog {
    let entries = outputs
        .iter()
        .map(|(file, sheet_name, table)| CatalogEntry {
            file: file.clone(),
            sheet_name: sheet_name.clone(),
            columns: table
                .columns
                .iter()
                .map(|column| ColumnEntry {
                    name: column.name.clone(),
                    dtype: column.ty.dtype_str().to_string(),
                })
                .collect(),
        })
        .collect();
    Catalog { entries }
}

/// Rebuilds a catalog by re-inferring the schema of every CSV already sitting
/// in an output directory, in lexicographic order. The standalone counterpart
/// of the end-of-run catalog step.
pub fn catalog_directory(root: &Path, delimiter: Option<u8>) -> Result<Catalog> {
    let mut paths: Vec<_> = std::fs::read_dir(root)
        .with_context(|| format!("Listing output directory {root:?}"))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| matches!(reader::source_kind(path), Some(SourceKind::Delimited)))
        .collect();
    paths.sort();

    let options = ReadOptions {
        delimiter,
        ..ReadOptions::default()
    };
    let overrides = HashMap::new();
    let mut outputs: Vec<(String, String, RawTable)> = Vec::new();
    for path in &paths {
        let mut losses = Vec::new();
        let outcome = reader::read_tables(path, &overrides, &options, &mut losses);
        for error in &outcome.errors {
            warn!("Skipping {path:?} while cataloging: {error}");
        }
        for table in outcome.tables {
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            outputs.push((file, table.name.clone(), table));
        }
    }

    let borrowed = outputs
        .iter()
        .map(|(file, sheet, table)| (file.clone(), sheet.clone(), table))
        .collect_vec();
    Ok(build_catalog(&borrowed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColumnType;
    use crate::table::Column;

    #[test]
    fn entries_follow_output_and_column_order() {
        let table = RawTable {
            name: "school_edunomics".to_string(),
            sheet: None,
            columns: vec![
                Column {
                    name: "id".into(),
                    ty: ColumnType::Integer,
                    values: Vec::new(),
                },
                Column {
                    name: "spend".into(),
                    ty: ColumnType::Float,
                    values: Vec::new(),
                },
            ],
        };
        let catalog = build_catalog(&[(
            "school_edunomics.csv".to_string(),
            "school_edunomics".to_string(),
            &table,
        )]);
        assert_eq!(catalog.entries.len(), 1);
        let entry = &catalog.entries[0];
        assert_eq!(entry.file, "school_edunomics.csv");
        assert_eq!(entry.columns[0].name, "id");
        assert_eq!(entry.columns[0].dtype, "integer");
        assert_eq!(entry.columns[1].dtype, "float");
    }

    #[test]
    fn empty_output_set_yields_empty_catalog() {
        let catalog = build_catalog(&[]);
        assert!(catalog.entries.is_empty());
        let json = serde_json::to_string(&catalog).unwrap();
        assert_eq!(json, "[]");
    }
}
