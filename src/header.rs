//! Header resolution: anomaly detection on candidate header rows and column
//! name normalization.
//!
//! Spreadsheet exports frequently bury the real header under one or two rows
//! of titling, leaving auto-generated placeholders ("Unnamed: 3",
//! "Column.1 (duplicate)") in the first physical row. The detector flags
//! exactly those placeholder tokens and nothing else; empty or numeric-looking
//! tokens are legitimate in terse feeds and are never flagged.

/// Substrings that mark an auto-generated placeholder header token.
const ANOMALY_MARKERS: &[&str] = &["unnamed", "duplicate"];

/// Returns true when any header token, lowercased and trimmed, contains a
/// placeholder marker. Pure predicate, no other signals.
pub fn is_anomalous<S: AsRef<str>>(header: &[S]) -> bool {
    header.iter().any(|token| {
        let lowered = token.as_ref().trim().to_ascii_lowercase();
        ANOMALY_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
    })
}

/// Canonical column name: lowercased, surrounding whitespace stripped.
/// Collisions between normalized names are deliberately preserved upstream.
pub fn normalize_header(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// A candidate header row found at a specific physical row offset.
#[derive(Debug, Clone)]
pub struct HeaderCandidate {
    pub tokens: Vec<String>,
    pub offset: usize,
}

impl HeaderCandidate {
    pub fn new(tokens: Vec<String>, offset: usize) -> Self {
        Self { tokens, offset }
    }

    pub fn is_anomalous(&self) -> bool {
        is_anomalous(&self.tokens)
    }
}

/// The two-attempt header state machine. The second attempt takes the header
/// from the third physical row (two rows skipped); there is no third attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAttempt {
    Offset0,
    Offset2,
}

impl HeaderAttempt {
    pub fn skip_rows(&self) -> usize {
        match self {
            HeaderAttempt::Offset0 => 0,
            HeaderAttempt::Offset2 => 2,
        }
    }

    /// The follow-up attempt after an anomalous header, if any remains.
    pub fn next(&self) -> Option<HeaderAttempt> {
        match self {
            HeaderAttempt::Offset0 => Some(HeaderAttempt::Offset2),
            HeaderAttempt::Offset2 => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_unnamed_and_duplicate_tokens() {
        assert!(is_anomalous(&["Unnamed: 0", "score"]));
        assert!(is_anomalous(&["id", "Column.1 (duplicate)"]));
        assert!(is_anomalous(&["  UNNAMED: 3  "]));
    }

    #[test]
    fn clean_headers_pass() {
        assert!(!is_anomalous(&["id", "score", "grade"]));
        // Terse or odd headers are legitimate and must not be flagged.
        assert!(!is_anomalous(&["", "1", "x"]));
    }

    #[test]
    fn normalize_header_is_idempotent() {
        let once = normalize_header("  District Name ");
        assert_eq!(once, "district name");
        assert_eq!(normalize_header(&once), once);
    }

    #[test]
    fn attempt_chain_has_exactly_one_retry() {
        let second = HeaderAttempt::Offset0.next().unwrap();
        assert_eq!(second, HeaderAttempt::Offset2);
        assert_eq!(second.skip_rows(), 2);
        assert!(second.next().is_none());
    }
}
