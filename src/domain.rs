use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CensusError;

/// Which side of the base date a record must fall on to count as available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DateMode {
    #[default]
    Before,
    After,
}

impl fmt::Display for DateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateMode::Before => write!(f, "before"),
            DateMode::After => write!(f, "after"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadLayout {
    Paired,
    Single,
}

impl ReadLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadLayout::Paired => "PAIRED",
            ReadLayout::Single => "SINGLE",
        }
    }
}

impl fmt::Display for ReadLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strict parse for operator-supplied dates (config file, CLI flags).
pub fn parse_base_date(value: &str) -> Result<DateTime<Utc>, CensusError> {
    try_parse_date(value).ok_or_else(|| CensusError::InvalidDate(value.to_string()))
}

/// Lenient parse for dates found in archive tables. Archive exports mix
/// RFC 3339 timestamps and bare dates; anything else is not a date.
pub fn try_parse_date(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Run accession for a read file id: the part before the first underscore.
/// `DRR000001_1` and `DRR000001_2` both belong to run `DRR000001`; a
/// single-end file id carries no suffix and maps to itself.
pub fn run_id_of_file_id(file_id: &str) -> &str {
    file_id.split('_').next().unwrap_or(file_id)
}

/// Run accession for a summary archive path: basename, mate suffix stripped.
pub fn run_id_of_summary_path(path: &str) -> &str {
    let basename = path.rsplit('/').next().unwrap_or(path);
    run_id_of_file_id(basename)
}

/// Mate number for a read file id, when the id follows the `_1`/`_2`
/// mate-suffix convention. `DRR000001_1_fastqc` and `DRR000001_1` both
/// report 1.
pub fn mate_number(file_id: &str) -> Option<u8> {
    let suffix = file_id.split('_').nth(1)?;
    match suffix.as_bytes().first() {
        Some(b'1') if suffix.len() == 1 => Some(1),
        Some(b'2') if suffix.len() == 1 => Some(2),
        _ => None,
    }
}
