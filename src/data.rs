use std::fmt;

use anyhow::{Result, anyhow};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Cell values carried by every table. Cells are `Option<Value>`; `None`
/// stands for null/missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Canonical textual form, used when a column resolves to text and when
    /// writing CSV output.
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
            Value::Boolean(b) => b.to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Value::Text(_) => ColumnType::Text,
            Value::Integer(_) => ColumnType::Integer,
            Value::Float(_) => ColumnType::Float,
            Value::Boolean(_) => ColumnType::Boolean,
            Value::Timestamp(_) => ColumnType::Timestamp,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Column type vocabulary. `Unknown` marks columns with no non-null values;
/// the catalog spells these out as fixed lowercase strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Text,
    Unknown,
}

impl ColumnType {
    pub fn dtype_str(&self) -> &'static str {
        match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Text => "text",
            ColumnType::Unknown => "unknown",
        }
    }

    pub fn parse_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" => Ok(ColumnType::Integer),
            "float" => Ok(ColumnType::Float),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "timestamp" => Ok(ColumnType::Timestamp),
            "text" | "string" => Ok(ColumnType::Text),
            "unknown" => Ok(ColumnType::Unknown),
            other => Err(anyhow!("Unknown column type '{other}'")),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dtype_str())
    }
}

/// Cell tokens treated as null during parsing. The raw feeds use `NA` for
/// missing values alongside plain empty cells.
pub fn is_null_token(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "NA"
}

pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    // Bare dates count as timestamps at midnight.
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = chrono::NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed.and_hms_opt(0, 0, 0).unwrap());
        }
    }
    Err(anyhow!("Failed to parse '{value}' as timestamp"))
}

/// True when an i64 cannot survive a round trip through f64 (magnitudes
/// beyond 2^53). Widening such a value changes it, which must be surfaced
/// as a coercion loss rather than happen silently.
pub fn int_to_float_is_lossy(i: i64) -> bool {
    (i as f64) as i64 != i
}

pub fn parse_boolean(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" => Ok(true),
        "false" | "f" | "no" | "n" => Ok(false),
        _ => Err(anyhow!("Failed to parse '{value}' as boolean")),
    }
}

/// Parses a raw cell under a known column type. Null tokens yield `None`;
/// a non-null cell that does not parse is an error the caller decides on.
pub fn parse_typed_value(value: &str, ty: ColumnType) -> Result<Option<Value>> {
    if is_null_token(value) {
        return Ok(None);
    }
    let value = value.trim();
    let parsed = match ty {
        ColumnType::Text => Value::Text(value.to_string()),
        ColumnType::Integer => {
            let parsed: i64 = value
                .parse()
                .map_err(|_| anyhow!("Failed to parse '{value}' as integer"))?;
            Value::Integer(parsed)
        }
        ColumnType::Float => {
            let parsed: f64 = value
                .parse()
                .map_err(|_| anyhow!("Failed to parse '{value}' as float"))?;
            Value::Float(parsed)
        }
        ColumnType::Boolean => Value::Boolean(parse_boolean(value)?),
        ColumnType::Timestamp => Value::Timestamp(parse_naive_datetime(value)?),
        ColumnType::Unknown => return Err(anyhow!("Cannot parse '{value}' as unknown type")),
    };
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parse_naive_datetime_supports_multiple_formats() {
        let expected =
            NaiveDateTime::parse_from_str("2024-05-06 14:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(
            parse_naive_datetime("2024-05-06T14:30:00").unwrap(),
            expected
        );
        assert_eq!(
            parse_naive_datetime("06/05/2024 14:30:00").unwrap(),
            expected
        );
        assert_eq!(parse_naive_datetime("2024-05-06 14:30").unwrap(), expected);
    }

    #[test]
    fn parse_naive_datetime_accepts_bare_dates_at_midnight() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_naive_datetime("2024-05-06").unwrap(), expected);
        assert_eq!(parse_naive_datetime("06/05/2024").unwrap(), expected);
    }

    #[test]
    fn parse_typed_value_handles_null_tokens() {
        assert_eq!(parse_typed_value("", ColumnType::Integer).unwrap(), None);
        assert_eq!(parse_typed_value("NA", ColumnType::Float).unwrap(), None);
        assert_eq!(parse_typed_value("  ", ColumnType::Text).unwrap(), None);
    }

    #[test]
    fn parse_typed_value_parses_primitives() {
        assert_eq!(
            parse_typed_value("42", ColumnType::Integer).unwrap(),
            Some(Value::Integer(42))
        );
        assert_eq!(
            parse_typed_value("42.5", ColumnType::Float).unwrap(),
            Some(Value::Float(42.5))
        );
        assert_eq!(
            parse_typed_value("Yes", ColumnType::Boolean).unwrap(),
            Some(Value::Boolean(true))
        );
        assert!(parse_typed_value("maybe", ColumnType::Boolean).is_err());
    }

    #[test]
    fn int_to_float_round_trip_detects_precision_loss() {
        assert!(!int_to_float_is_lossy(9_007_199_254_740_992)); // 2^53
        assert!(int_to_float_is_lossy(9_007_199_254_740_993));
        assert!(!int_to_float_is_lossy(-42));
        assert!(int_to_float_is_lossy(i64::MAX));
    }

    #[test]
    fn float_display_keeps_integral_values_distinct_from_integers() {
        assert_eq!(Value::Float(3.0).as_display(), "3.0");
        assert_eq!(Value::Float(3.25).as_display(), "3.25");
        assert_eq!(Value::Integer(3).as_display(), "3");
    }
}
