use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use regex::Regex;
use tracing::debug;

use crate::config::worker_pool;
use crate::domain::{DateMode, run_id_of_summary_path, try_parse_date};
use crate::error::CensusError;
use crate::fastqc::CORRUPT_FLAG;
use crate::table::Record;

/// Column positions in the `SRA_Accessions` reference table.
pub mod accessions {
    pub const ACCESSION: usize = 0;
    pub const SUBMISSION: usize = 1;
    pub const STATUS: usize = 2;
    pub const RECEIVED: usize = 5;
    pub const VISIBILITY: usize = 8;
    pub const EXPERIMENT: usize = 10;
}

/// Column positions in the intermediate live-run list produced by
/// [`AvailabilitySet::live_runs`].
pub mod live {
    pub const RUN: usize = 0;
    pub const SUBMISSION: usize = 1;
    pub const EXPERIMENT: usize = 2;
    pub const RECEIVED: usize = 3;
    pub const LAYOUT: usize = 4;
}

pub const UNDEFINED_LAYOUT: &str = "UNDEFINED";

/// Computes which archive records still need a QC pass: live, public,
/// not yet finished, and on the requested side of the base date.
pub struct AvailabilitySet {
    date_mode: DateMode,
    base_date: DateTime<Utc>,
    pool: rayon::ThreadPool,
    run_accession: Regex,
}

impl AvailabilitySet {
    pub fn new(
        date_mode: DateMode,
        base_date: DateTime<Utc>,
        parallels: usize,
    ) -> Result<Self, CensusError> {
        Ok(Self {
            date_mode,
            base_date,
            pool: worker_pool(parallels)?,
            run_accession: Regex::new("^.RR").map_err(|err| {
                CensusError::Filesystem(format!("run accession pattern: {err}"))
            })?,
        })
    }

    /// Run ids already covered by a finished QC result. Records flagged
    /// as corrupt do not count: those runs must be processed again.
    pub fn finished_run_ids(&self, finished: &[Record]) -> HashSet<String> {
        self.pool.install(|| {
            finished
                .par_iter()
                .filter(|record| record.get(1).map(String::as_str) != Some(CORRUPT_FLAG))
                .filter_map(|record| record.first())
                .map(|path| run_id_of_summary_path(path).to_string())
                .collect()
        })
    }

    /// Project `SRA_Accessions` down to live public runs, attaching the
    /// read layout recorded for the run's experiment (`UNDEFINED` when
    /// the experiment has no layout entry).
    pub fn live_runs(
        &self,
        accession_records: &[Record],
        layout_by_experiment: &HashMap<String, String>,
    ) -> Vec<Record> {
        self.pool.install(|| {
            accession_records
                .par_iter()
                .filter(|record| self.is_live_public_run(record))
                .map(|record| {
                    let experiment = record
                        .get(accessions::EXPERIMENT)
                        .cloned()
                        .unwrap_or_default();
                    let layout = layout_by_experiment
                        .get(&experiment)
                        .cloned()
                        .unwrap_or_else(|| UNDEFINED_LAYOUT.to_string());
                    vec![
                        record[accessions::ACCESSION].clone(),
                        record
                            .get(accessions::SUBMISSION)
                            .cloned()
                            .unwrap_or_default(),
                        experiment,
                        record
                            .get(accessions::RECEIVED)
                            .cloned()
                            .unwrap_or_default(),
                        layout,
                    ]
                })
                .collect()
        })
    }

    fn is_live_public_run(&self, record: &Record) -> bool {
        let Some(accession) = record.first() else {
            return false;
        };
        self.run_accession.is_match(accession)
            && record.get(accessions::STATUS).map(String::as_str) == Some("live")
            && record.get(accessions::VISIBILITY).map(String::as_str) == Some("public")
    }

    /// The reconciliation itself: every live run that has no finished QC
    /// result and whose received date satisfies the date predicate, as
    /// `[experiment_id, submission_id, read_layout]` tuples. Exact
    /// duplicates collapse to the first occurrence; records whose date
    /// does not parse are excluded.
    pub fn compute_available(
        &self,
        live_records: &[Record],
        finished_keys: &HashSet<String>,
    ) -> Vec<Record> {
        let validated: Vec<Option<Record>> = self.pool.install(|| {
            live_records
                .par_iter()
                .map(|record| self.validate_record(record, finished_keys))
                .collect()
        });

        let mut seen = HashSet::new();
        let mut available = Vec::new();
        for record in validated.into_iter().flatten() {
            if seen.insert(record.clone()) {
                available.push(record);
            }
        }
        available
    }

    fn validate_record(&self, record: &Record, finished_keys: &HashSet<String>) -> Option<Record> {
        let run_id = record.get(live::RUN)?;
        if finished_keys.contains(run_id) {
            return None;
        }
        let received = record.get(live::RECEIVED)?;
        let Some(date) = try_parse_date(received) else {
            debug!(run = run_id.as_str(), received = received.as_str(), "unparseable received date, excluded");
            return None;
        };
        let valid = match self.date_mode {
            DateMode::Before => self.base_date > date,
            DateMode::After => self.base_date < date,
        };
        if !valid {
            return None;
        }
        Some(vec![
            record.get(live::EXPERIMENT)?.clone(),
            record.get(live::SUBMISSION)?.clone(),
            record.get(live::LAYOUT)?.clone(),
        ])
    }
}
