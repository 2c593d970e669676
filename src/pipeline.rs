//! Pipeline Driver: enumerates input files, fans reads out across a worker
//! pool, routes tables through normalization and per-group reconciliation,
//! writes the outputs, and finishes with the schema catalog.
//!
//! Ordering guarantees: input files are enumerated lexicographically by
//! relative path, output tables appear in discovery order, and the catalog is
//! built strictly after every output write has completed. Per-file and
//! per-group failures are collected into the run report; only a catalog that
//! cannot be written fails the run.

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::{
    catalog,
    config::PipelineSettings,
    io_utils,
    reader::{self, ReadOptions},
    reconcile,
    report::{CoercionLoss, ReconcileError, RunError, RunReport, SourceError},
    table::RawTable,
};

#[derive(Debug, Clone)]
struct SourceFile {
    path: PathBuf,
    relative: String,
    group: Option<String>,
}

#[derive(Debug)]
struct FileRead {
    source: SourceFile,
    tables: Vec<RawTable>,
    errors: Vec<SourceError>,
    losses: Vec<CoercionLoss>,
}

enum OutputSlot {
    Group(String),
    Passthrough { table: RawTable, relative: String },
}

pub fn run(settings: &PipelineSettings) -> Result<RunReport> {
    let mut report = RunReport::default();

    let files = enumerate_sources(&settings.input_root, settings)?;
    report.files_seen = files.len();
    info!(
        "Found {} tabular file(s) under {:?}",
        files.len(),
        settings.input_root
    );

    let reads = read_all(settings, &files)?;

    // Assemble output slots in file discovery order: a group claims its slot
    // at the first file routed to it, passthrough tables claim one each.
    let mut slots: Vec<OutputSlot> = Vec::new();
    let mut group_tables: HashMap<String, Vec<RawTable>> = HashMap::new();
    let mut groups_seen: HashSet<String> = HashSet::new();
    for read in reads {
        for error in &read.errors {
            warn!("{error}");
            report.record_error(RunError::from(error));
        }
        report.coercion_losses.extend(read.losses);
        match &read.source.group {
            Some(group) => {
                if groups_seen.insert(group.clone()) {
                    slots.push(OutputSlot::Group(group.clone()));
                }
                group_tables
                    .entry(group.clone())
                    .or_default()
                    .extend(read.tables);
            }
            None => {
                for table in read.tables {
                    debug!(
                        "{} passes through ungrouped as '{}'",
                        read.source.relative, table.name
                    );
                    slots.push(OutputSlot::Passthrough {
                        table,
                        relative: read.source.relative.clone(),
                    });
                }
            }
        }
    }

    // Configured rules that matched no file still surface as empty groups.
    for matcher in &settings.groups {
        if groups_seen.insert(matcher.name.clone()) {
            slots.push(OutputSlot::Group(matcher.name.clone()));
        }
    }

    fs::create_dir_all(&settings.output_root)
        .with_context(|| format!("Creating output directory {:?}", settings.output_root))?;

    let mut written: Vec<(String, String, RawTable)> = Vec::new();
    let mut used_names: HashSet<String> = HashSet::new();
    for slot in slots {
        let (mut table, relative) = match slot {
            OutputSlot::Passthrough { table, relative } => (table, Some(relative)),
            OutputSlot::Group(name) => {
                let members = group_tables.remove(&name).unwrap_or_default();
                match assemble_group(&name, members, &mut report) {
                    Some(table) => (table, None),
                    None => continue,
                }
            }
        };
        // Two sources with the same stem must not overwrite each other.
        let unique = unique_output_name(&table.name, relative.as_deref(), &used_names);
        if unique != table.name {
            warn!(
                "Output table name '{}' already in use; writing it as '{unique}'",
                table.name
            );
            table.name = unique;
        }
        used_names.insert(table.name.clone());
        let file_name = format!("{}.csv", table.name);
        let path = settings.output_root.join(&file_name);
        write_table(&path, &table)?;
        info!("Wrote {} row(s) to {path:?}", table.row_count());
        written.push((file_name, table.name.clone(), table));
    }

    // The catalog enumerates exactly the outputs written above and must come
    // last; failing to persist it fails the run.
    let outputs: Vec<(String, String, &RawTable)> = written
        .iter()
        .map(|(file, logical, table)| (file.clone(), logical.clone(), table))
        .collect();
    let catalog = catalog::build_catalog(&outputs);
    catalog
        .save(&settings.catalog_path)
        .with_context(|| format!("Persisting schema catalog to {:?}", settings.catalog_path))?;
    info!(
        "Catalog with {} entr(y/ies) written to {:?}",
        catalog.entries.len(),
        settings.catalog_path
    );

    report.tables_written = written.into_iter().map(|(file, ..)| file).collect();

    if let Some(path) = &settings.report_path {
        report.save(path)?;
        info!("Run report written to {path:?}");
    }
    if report.has_errors() {
        warn!(
            "Run finished with {} error(s) and {} coercion loss(es)",
            report.errors.len(),
            report.coercion_losses.len()
        );
    }
    Ok(report)
}

fn read_all(settings: &PipelineSettings, files: &[SourceFile]) -> Result<Vec<FileRead>> {
    let options = ReadOptions {
        delimiter: settings.delimiter,
        ..ReadOptions::default()
    };
    let read_one = |source: &SourceFile| {
        let mut losses = Vec::new();
        let outcome = reader::read_tables(&source.path, &settings.overrides, &options, &mut losses);
        FileRead {
            source: source.clone(),
            tables: outcome
                .tables
                .into_iter()
                .map(RawTable::normalize_headers)
                .collect(),
            errors: outcome.errors,
            losses,
        }
    };

    // Each file unit is independent; reads fan out across the rayon pool.
    let reads = match settings.jobs {
        Some(jobs) => rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("Building worker pool")?
            .install(|| files.par_iter().map(read_one).collect()),
        None => files.par_iter().map(read_one).collect(),
    };
    Ok(reads)
}

fn assemble_group(
    name: &str,
    mut members: Vec<RawTable>,
    report: &mut RunReport,
) -> Option<RawTable> {
    match members.len() {
        0 => {
            let err = ReconcileError::EmptyGroup(name.to_string());
            warn!("{err}");
            report.record_error(RunError::from(&err));
            None
        }
        1 => {
            // Single-member groups pass through unchanged, under the group name.
            let mut table = members.remove(0);
            table.name = name.to_string();
            Some(table)
        }
        _ => {
            let mut losses = Vec::new();
            let merged = match reconcile::reconcile(name, members, &mut losses) {
                Ok(merged) => merged,
                Err(err) => {
                    warn!("{err}");
                    report.record_error(RunError::from(&err));
                    return None;
                }
            };
            for loss in &losses {
                warn!(
                    "Coerced '{}' to text in column '{}' of '{}'",
                    loss.value, loss.column, loss.table
                );
            }
            report.coercion_losses.extend(losses);
            Some(merged)
        }
    }
}

/// Picks an output name not yet taken: the bare name when free, then the
/// name qualified with the source's parent directories, then a numeric
/// suffix as the last resort.
fn unique_output_name(base: &str, relative: Option<&str>, used: &HashSet<String>) -> String {
    if !used.contains(base) {
        return base.to_string();
    }
    if let Some(relative) = relative {
        let mut parts: Vec<&str> = relative.split('/').collect();
        parts.pop(); // the file name itself; its stem is already in `base`
        let mut prefix = String::new();
        for part in parts.iter().rev() {
            prefix = format!("{part}_{prefix}");
            let candidate = format!("{prefix}{base}");
            if !used.contains(&candidate) {
                return candidate;
            }
        }
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if !used.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn write_table(path: &Path, table: &RawTable) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path)?;
    io_utils::write_records(&mut writer, &table.to_records())
        .with_context(|| format!("Writing output table {path:?}"))
}

fn enumerate_sources(root: &Path, settings: &PipelineSettings) -> Result<Vec<SourceFile>> {
    let mut found = Vec::new();
    collect_files(root, root, &mut found)?;
    found.sort_by(|a, b| a.relative.cmp(&b.relative));
    for source in &mut found {
        source.group = settings
            .groups
            .iter()
            .find(|matcher| matcher.matches(&source.relative))
            .map(|matcher| matcher.name.clone());
    }
    Ok(found)
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<SourceFile>) -> Result<()> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Listing input directory {dir:?}"))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Reading directory entry in {dir:?}"))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else if reader::source_kind(&path).is_some() {
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push(SourceFile {
                path,
                relative,
                group: None,
            });
        }
    }
    Ok(())
}
