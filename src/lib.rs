pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod header;
pub mod io_utils;
pub mod pipeline;
pub mod reader;
pub mod reconcile;
pub mod report;
pub mod table;

use std::{collections::HashMap, env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheetfold", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&args),
        Commands::Probe(args) => handle_probe(&args),
        Commands::Catalog(args) => handle_catalog(&args),
    }
}

fn handle_ingest(args: &cli::IngestArgs) -> Result<()> {
    let settings = config::resolve_settings(args)?;
    info!(
        "Ingesting {:?} -> {:?} ({} group rule(s))",
        settings.input_root,
        settings.output_root,
        settings.groups.len()
    );
    let report = pipeline::run(&settings)
        .with_context(|| format!("Ingesting {:?}", settings.input_root))?;
    info!(
        "Processed {} file(s), wrote {} table(s)",
        report.files_seen,
        report.tables_written.len()
    );
    Ok(())
}

fn handle_probe(args: &cli::ProbeArgs) -> Result<()> {
    info!("Probing '{}'", args.input.display());
    let options = reader::ReadOptions {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
    };
    let overrides = HashMap::new();
    let mut losses = Vec::new();
    let outcome = reader::read_tables(&args.input, &overrides, &options, &mut losses);
    for error in &outcome.errors {
        warn!("{error}");
    }

    let file_name = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.input.display().to_string());
    let tables: Vec<_> = outcome
        .tables
        .into_iter()
        .filter(|table| match &args.sheet {
            // Only workbook tables carry a sheet name; a --sheet request that
            // matches nothing fails rather than guessing.
            Some(sheet) => table
                .sheet
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(sheet.trim())),
            None => true,
        })
        .collect();
    if tables.is_empty() {
        return Err(anyhow!("No readable table found in {:?}", args.input));
    }

    let outputs: Vec<(String, String, &table::RawTable)> = tables
        .iter()
        .map(|t| (file_name.clone(), t.name.clone(), t))
        .collect();
    let schema = catalog::build_catalog(&outputs);
    match &args.meta {
        Some(path) => {
            schema
                .save(path)
                .with_context(|| format!("Writing schema to {path:?}"))?;
            info!("Schema for {} table(s) written to {path:?}", schema.entries.len());
        }
        None => {
            let rendered =
                serde_json::to_string_pretty(&schema).context("Rendering schema JSON")?;
            println!("{rendered}");
        }
    }
    Ok(())
}

fn handle_catalog(args: &cli::CatalogArgs) -> Result<()> {
    info!("Cataloging '{}'", args.input_root.display());
    let catalog = catalog::catalog_directory(&args.input_root, args.delimiter)?;
    catalog
        .save(&args.catalog)
        .with_context(|| format!("Writing catalog to {:?}", args.catalog))?;
    info!(
        "Catalog with {} entr(y/ies) written to {:?}",
        catalog.entries.len(),
        args.catalog
    );
    Ok(())
}
