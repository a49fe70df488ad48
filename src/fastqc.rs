use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::warn;
use zip::ZipArchive;

use crate::config::worker_pool;
use crate::error::CensusError;
use crate::table::Record;

/// Version value recorded for a result archive that cannot be read.
/// Downstream treats such runs as not finished, so they get re-queued,
/// and skips them in version-outdated checks.
pub const CORRUPT_FLAG: &str = "CORRUPT";

/// Scans a FastQC output tree for finished result archives. Results live
/// three directory levels below the root (accession prefix, accession,
/// run), each run directory holding one zip per read file.
pub struct FastqcResults {
    fastqc_dir: PathBuf,
    pool: rayon::ThreadPool,
}

impl FastqcResults {
    pub fn new(fastqc_dir: &Path, parallels: usize) -> Result<Self, CensusError> {
        Ok(Self {
            fastqc_dir: fastqc_dir.to_path_buf(),
            pool: worker_pool(parallels)?,
        })
    }

    /// All finished results as `[archive_path, fastqc_version]` records,
    /// in path order. A broken archive yields the corrupt flag for its
    /// version instead of failing the batch.
    pub fn finished(&self) -> Result<Vec<Record>, CensusError> {
        if !self.fastqc_dir.exists() {
            return Err(CensusError::MissingInput(self.fastqc_dir.clone()));
        }
        let mut zipfiles = self.result_archives()?;
        zipfiles.sort();
        Ok(self.pool.install(|| {
            zipfiles
                .par_iter()
                .map(|path| {
                    let version = match extract_version(path) {
                        Some(version) => version,
                        None => {
                            warn!(path = %path.display(), "unreadable result archive");
                            CORRUPT_FLAG.to_string()
                        }
                    };
                    vec![path.to_string_lossy().to_string(), version]
                })
                .collect()
        }))
    }

    /// Finished entries whose recorded version differs from the wanted
    /// one. Corrupt entries are not versioned and stay out of the list.
    pub fn outdated(finished: &[Record], version: &str) -> Vec<Record> {
        finished
            .iter()
            .filter(|record| {
                record
                    .get(1)
                    .is_some_and(|found| found != version && found != CORRUPT_FLAG)
            })
            .cloned()
            .collect()
    }

    fn result_archives(&self) -> Result<Vec<PathBuf>, CensusError> {
        let mut dirs = vec![self.fastqc_dir.clone()];
        for _ in 0..3 {
            let mut next = Vec::new();
            for dir in &dirs {
                for entry in list_dir(dir)? {
                    if entry.is_dir() {
                        next.push(entry);
                    }
                }
            }
            dirs = next;
        }

        let mut zipfiles = Vec::new();
        for dir in &dirs {
            for entry in list_dir(dir)? {
                if entry.extension().is_some_and(|ext| ext == "zip") {
                    zipfiles.push(entry);
                }
            }
        }
        Ok(zipfiles)
    }
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, CensusError> {
    let entries = fs::read_dir(dir).map_err(|err| {
        CensusError::Filesystem(format!("read dir {}: {err}", dir.display()))
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| CensusError::Filesystem(err.to_string()))?;
        paths.push(entry.path());
    }
    Ok(paths)
}

/// FastQC version from the first line of `fastqc_data.txt` inside a
/// result archive. Any unreadable or unexpected content reads as None.
pub fn extract_version(zip_path: &Path) -> Option<String> {
    let file = fs::File::open(zip_path).ok()?;
    let mut archive = ZipArchive::new(file).ok()?;
    let name = archive
        .file_names()
        .find(|name| name.ends_with("fastqc_data.txt"))
        .map(str::to_string)?;
    let mut entry = archive.by_name(&name).ok()?;
    let mut content = String::new();
    entry.read_to_string(&mut content).ok()?;
    let first_line = content.lines().next()?;
    first_line.split('\t').next_back().map(str::to_string)
}
