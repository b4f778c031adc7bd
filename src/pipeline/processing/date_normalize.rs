use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::str::FromStr;
use tracing::warn;

use crate::error::{CleaningError, Result};
use crate::pipeline::table::{ColumnType, Table, Value};

/// What to do with a non-empty value that is not a date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum DateParsePolicy {
    /// Fail the run on the first unparseable value
    #[default]
    Strict,
    /// Replace unparseable values with missing values
    Coerce,
}

impl FromStr for DateParsePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "coerce" => Ok(Self::Coerce),
            other => Err(format!(
                "unknown date policy '{}', expected 'strict' or 'coerce'",
                other
            )),
        }
    }
}

impl TryFrom<String> for DateParsePolicy {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Tokens the listing exports use for an absent value
const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null", "NaT",
];

pub fn is_na_token(text: &str) -> bool {
    NA_TOKENS.contains(&text.trim())
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse the textual date forms found in listing exports.
/// Offsets (RFC 3339) are converted to UTC.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOutcome {
    pub table: Table,
    /// Values replaced by missing under [`DateParsePolicy::Coerce`]
    pub coerced: usize,
}

/// Retype `column` from text to date/time.
pub fn normalize_dates(table: Table, column: &str, policy: DateParsePolicy) -> Result<NormalizeOutcome> {
    let idx = table.require_column(column)?;
    let mut coerced = 0;

    let table = table.retype_column(idx, ColumnType::DateTime, |line, value| match value {
        Value::Missing => Ok(Value::Missing),
        Value::DateTime(dt) => Ok(Value::DateTime(dt)),
        Value::Text(text) if is_na_token(&text) => Ok(Value::Missing),
        Value::Text(text) => match parse_date(&text) {
            Some(dt) => Ok(Value::DateTime(dt)),
            None if policy == DateParsePolicy::Coerce => {
                warn!(column, line, value = %text, "Coercing unparseable date to missing");
                coerced += 1;
                Ok(Value::Missing)
            }
            None => Err(CleaningError::ColumnParse {
                column: column.to_string(),
                line,
                value: text,
            }),
        },
    })?;

    Ok(NormalizeOutcome { table, coerced })
}
