//! Run configuration: explicit input/output roots, path-to-group rules, and
//! forced column types. Loaded from a YAML file, overridable by CLI flags;
//! nothing is ever derived from the binary's own location.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::Deserialize;

use crate::{cli::IngestArgs, data::ColumnType, header::normalize_header};

pub const DEFAULT_CATALOG_FILE: &str = "schema_metadata.json";

#[derive(Debug, Clone, Deserialize)]
pub struct GroupRule {
    pub name: String,
    /// Regex matched against the `/`-separated path relative to the input
    /// root. First matching rule wins.
    pub pattern: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    pub input_root: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub groups: Vec<GroupRule>,
    #[serde(default)]
    pub type_overrides: BTreeMap<String, String>,
}

impl IngestConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Reading config file {path:?}"))?;
        serde_yaml::from_str(&raw).with_context(|| format!("Parsing config file {path:?}"))
    }
}

/// A compiled path-to-group rule.
#[derive(Debug, Clone)]
pub struct GroupMatcher {
    pub name: String,
    pub pattern: Regex,
}

impl GroupMatcher {
    pub fn matches(&self, relative_path: &str) -> bool {
        self.pattern.is_match(relative_path)
    }
}

/// Everything the pipeline needs, after merging config file and CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub catalog_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub groups: Vec<GroupMatcher>,
    /// Forced column types keyed by normalized column name.
    pub overrides: HashMap<String, ColumnType>,
    pub delimiter: Option<u8>,
    pub jobs: Option<usize>,
}

pub fn resolve_settings(args: &IngestArgs) -> Result<PipelineSettings> {
    let config = match &args.config {
        Some(path) => IngestConfig::load(path)?,
        None => IngestConfig::default(),
    };

    let input_root = args
        .input_root
        .clone()
        .or(config.input_root)
        .ok_or_else(|| anyhow!("An input root is required (--input-root or config file)"))?;
    let output_root = args
        .output_root
        .clone()
        .or(config.output_root)
        .ok_or_else(|| anyhow!("An output root is required (--output-root or config file)"))?;
    let catalog_path = args
        .catalog
        .clone()
        .or(config.catalog)
        .unwrap_or_else(|| output_root.join(DEFAULT_CATALOG_FILE));

    // CLI group rules run ahead of config-file rules.
    let mut rules: Vec<GroupRule> = args
        .groups
        .iter()
        .map(|spec| parse_group_spec(spec))
        .collect::<Result<_>>()?;
    rules.extend(config.groups);
    let groups = rules
        .into_iter()
        .map(|rule| {
            let pattern = Regex::new(&rule.pattern).with_context(|| {
                format!("Compiling group pattern '{}' for '{}'", rule.pattern, rule.name)
            })?;
            Ok(GroupMatcher {
                name: rule.name,
                pattern,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut overrides = HashMap::new();
    for (column, type_name) in &config.type_overrides {
        overrides.insert(normalize_header(column), ColumnType::parse_name(type_name)?);
    }
    for spec in &args.force_types {
        let (column, ty) = parse_override_spec(spec)?;
        overrides.insert(column, ty);
    }

    Ok(PipelineSettings {
        input_root,
        output_root,
        catalog_path,
        report_path: args.report.clone(),
        groups,
        overrides,
        delimiter: args.delimiter,
        jobs: args.jobs,
    })
}

fn parse_group_spec(spec: &str) -> Result<GroupRule> {
    let (name, pattern) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("Group rule '{spec}' must look like name=pattern"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Group rule '{spec}' is missing a name"));
    }
    Ok(GroupRule {
        name: name.to_string(),
        pattern: pattern.trim().to_string(),
    })
}

fn parse_override_spec(spec: &str) -> Result<(String, ColumnType)> {
    let (column, type_name) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("Type override '{spec}' must look like column=type"))?;
    let column = normalize_header(column);
    if column.is_empty() {
        return Err(anyhow!("Type override '{spec}' is missing a column name"));
    }
    Ok((column, ColumnType::parse_name(type_name)?))
}
