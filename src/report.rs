//! Error taxonomy and the structured run report.
//!
//! Per-file and per-group failures are collected as values and aggregated
//! into a [`RunReport`], never merely printed. Nothing in file- or
//! group-level processing aborts a run; the only fatal error is a catalog
//! document that cannot be written, handled at the pipeline boundary.

use std::{fs::File, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Unreadable source {path:?}: {reason}")]
    Unreadable { path: PathBuf, reason: String },
    #[error("Header still anomalous after retry for '{table}' in {path:?}")]
    HeaderStillAnomalous { path: PathBuf, table: String },
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Logical group '{0}' has no surviving tables to reconcile")]
    EmptyGroup(String),
}

/// A value that could not be represented under its column's resolved type
/// and was nulled or rewritten as text. Warning-level, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoercionLoss {
    pub table: String,
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    SourceUnreadable,
    HeaderStillAnomalous,
    EmptyGroup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub kind: RunErrorKind,
    /// Source path for file-level errors, group name for group-level ones.
    pub subject: String,
    pub detail: String,
}

impl From<&SourceError> for RunError {
    fn from(err: &SourceError) -> Self {
        match err {
            SourceError::Unreadable { path, .. } => RunError {
                kind: RunErrorKind::SourceUnreadable,
                subject: path.display().to_string(),
                detail: err.to_string(),
            },
            SourceError::HeaderStillAnomalous { path, .. } => RunError {
                kind: RunErrorKind::HeaderStillAnomalous,
                subject: path.display().to_string(),
                detail: err.to_string(),
            },
        }
    }
}

impl From<&ReconcileError> for RunError {
    fn from(err: &ReconcileError) -> Self {
        let ReconcileError::EmptyGroup(group) = err;
        RunError {
            kind: RunErrorKind::EmptyGroup,
            subject: group.clone(),
            detail: err.to_string(),
        }
    }
}

/// Aggregated outcome of one pipeline run.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub files_seen: usize,
    pub tables_written: Vec<String>,
    pub errors: Vec<RunError>,
    pub coercion_losses: Vec<CoercionLoss>,
}

impl RunReport {
    pub fn record_error(&mut self, error: RunError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating report file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing run report JSON")
    }
}
