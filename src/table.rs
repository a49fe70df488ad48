use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::CensusError;

/// One row of a tab-separated table. Fields are addressed positionally;
/// the first column is the entity key unless a table says otherwise.
pub type Record = Vec<String>;

/// What to do with an output target that may already exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Write,
    SkipExisting,
}

pub struct TableStore;

impl TableStore {
    /// Read a TSV into records, one per line, fields split on tab. Rows
    /// with the wrong column count are passed through as-is; downstream
    /// positional access treats the missing fields as absent values.
    pub fn load(path: &Path) -> Result<Vec<Record>, CensusError> {
        if !path.exists() {
            return Err(CensusError::MissingInput(path.to_path_buf()));
        }
        let content =
            fs::read_to_string(path).map_err(|err| CensusError::Filesystem(err.to_string()))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Vec<Record> {
        content
            .lines()
            .map(|line| line.split('\t').map(str::to_string).collect())
            .collect()
    }

    /// Write records tab-joined, one per line, atomically: the content
    /// lands in a tempfile next to the target and is renamed into place.
    pub fn save(records: &[Record], path: &Path) -> Result<(), CensusError> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|err| CensusError::Filesystem(err.to_string()))?;

        let mut temp = tempfile::Builder::new()
            .prefix("qc-census")
            .tempfile_in(parent)
            .map_err(|err| CensusError::Filesystem(err.to_string()))?;
        for record in records {
            temp.write_all(record.join("\t").as_bytes())
                .map_err(|err| CensusError::Filesystem(err.to_string()))?;
            temp.write_all(b"\n")
                .map_err(|err| CensusError::Filesystem(err.to_string()))?;
        }
        temp.persist(path)
            .map_err(|err| CensusError::Filesystem(err.to_string()))?;
        Ok(())
    }

    /// Build a key -> record lookup from a TSV, dropping the header row.
    /// Duplicate keys keep the last occurrence; rows too short to carry
    /// the key column are skipped.
    pub fn load_indexed(
        path: &Path,
        key_column: usize,
    ) -> Result<HashMap<String, Record>, CensusError> {
        let records = Self::load(path)?;
        let mut index = HashMap::new();
        for record in records.into_iter().skip(1) {
            if let Some(key) = record.get(key_column) {
                index.insert(key.clone(), record);
            }
        }
        Ok(index)
    }

    /// Decide whether a target path should be rewritten. An existing
    /// target is moved aside to `<path>.<YYYYMMDD>` when overwriting,
    /// otherwise the computation is skipped so re-runs are idempotent.
    pub fn prepare_target(
        path: &Path,
        overwrite: bool,
        today: NaiveDate,
    ) -> Result<Disposition, CensusError> {
        if !path.exists() {
            return Ok(Disposition::Write);
        }
        if !overwrite {
            return Ok(Disposition::SkipExisting);
        }
        let backup = Self::backup_path(path, today);
        fs::rename(path, &backup).map_err(|err| {
            CensusError::Filesystem(format!("backup {} failed: {err}", path.display()))
        })?;
        Ok(Disposition::Write)
    }

    pub fn backup_path(path: &Path, today: NaiveDate) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(".{}", today.format("%Y%m%d")));
        PathBuf::from(name)
    }
}
