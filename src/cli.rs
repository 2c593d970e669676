use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Fold messy spreadsheet folders into clean, catalogued tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize a folder of CSV/workbook files into grouped output tables
    /// plus a schema catalog
    Ingest(IngestArgs),
    /// Resolve headers and infer the schema of a single file
    Probe(ProbeArgs),
    /// Rebuild the schema catalog from a directory of already-written CSVs
    Catalog(CatalogArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// YAML config file with roots, group rules, and type overrides
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Directory holding the raw input files (overrides the config file)
    #[arg(short = 'i', long = "input-root")]
    pub input_root: Option<PathBuf>,
    /// Directory receiving cleaned tables (overrides the config file)
    #[arg(short = 'o', long = "output-root")]
    pub output_root: Option<PathBuf>,
    /// Schema catalog path (defaults to <output-root>/schema_metadata.json)
    #[arg(long = "catalog")]
    pub catalog: Option<PathBuf>,
    /// Write the structured run report to this JSON file
    #[arg(long = "report")]
    pub report: Option<PathBuf>,
    /// Repeatable path-to-group rules such as `school_edunomics=^school/edunomics/`
    #[arg(short = 'g', long = "group", action = clap::ArgAction::Append)]
    pub groups: Vec<String>,
    /// Repeatable forced column types such as `enrollment=integer`
    #[arg(long = "force-type", action = clap::ArgAction::Append)]
    pub force_types: Vec<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Worker pool size for parallel file reads (defaults to available CPUs)
    #[arg(short = 'j', long = "jobs")]
    pub jobs: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    /// Input CSV or workbook file to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination schema JSON file (stdout if omitted)
    #[arg(short = 'm', long = "meta")]
    pub meta: Option<PathBuf>,
    /// Restrict a workbook probe to one sheet name
    #[arg(long = "sheet")]
    pub sheet: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Directory of CSV files to catalog
    #[arg(short = 'i', long = "input-root")]
    pub input_root: PathBuf,
    /// Destination catalog JSON file
    #[arg(long = "catalog")]
    pub catalog: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
