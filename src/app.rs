use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::aggregate::{AggregationEngine, is_complete};
use crate::annotate::{
    AnnotationJoiner, EXPERIMENT_ANNOTATION_HEADER, SAMPLE_ANNOTATION_HEADER, library,
};
use crate::availability::{AvailabilitySet, accessions};
use crate::config::{ResolvedConfig, worker_pool};
use crate::domain::run_id_of_file_id;
use crate::error::CensusError;
use crate::fastqc::{CORRUPT_FLAG, FastqcResults};
use crate::hierarchy::HierarchyIndex;
use crate::summary::{col, header_record};
use crate::table::{Disposition, Record, TableStore};

#[derive(Debug, Clone)]
pub struct AvailableInputs {
    pub accessions: PathBuf,
    pub layouts: Option<PathBuf>,
    pub fastqc_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct MergeInputs {
    pub summary_list: PathBuf,
    pub run_members: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AnnotateInputs {
    pub experiments: PathBuf,
    pub samples: PathBuf,
    pub run_members: PathBuf,
    pub taxonomy: PathBuf,
    pub library: PathBuf,
    pub accessions: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteOutcome {
    pub path: String,
    pub action: String,
    pub records: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailableResult {
    pub finished: usize,
    pub live: usize,
    pub available: usize,
    pub outputs: Vec<WriteOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeResult {
    pub reads: usize,
    pub unreadable_reads: usize,
    pub runs: usize,
    pub imperfect_runs: usize,
    pub experiments: usize,
    pub orphan_runs: usize,
    pub samples: usize,
    pub orphan_experiments: usize,
    pub outputs: Vec<WriteOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotateResult {
    pub experiments: usize,
    pub samples: usize,
    pub outputs: Vec<WriteOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutdatedResult {
    pub finished: usize,
    pub outdated: usize,
    pub outputs: Vec<WriteOutcome>,
}

/// Tracks the tables one operation writes. Every target is derived
/// deterministically and must be unique within the run; a repeat means
/// two results would race for the same file, which is an error rather
/// than a silent overwrite.
struct OutputWriter {
    overwrite: bool,
    written: HashSet<PathBuf>,
    outcomes: Vec<WriteOutcome>,
}

impl OutputWriter {
    fn new(overwrite: bool) -> Self {
        Self {
            overwrite,
            written: HashSet::new(),
            outcomes: Vec::new(),
        }
    }

    fn write(&mut self, records: &[Record], path: &Path) -> Result<bool, CensusError> {
        if !self.written.insert(path.to_path_buf()) {
            return Err(CensusError::DuplicateOutputPath(
                path.to_string_lossy().to_string(),
            ));
        }
        let today = chrono::Utc::now().date_naive();
        let action = match TableStore::prepare_target(path, self.overwrite, today)? {
            Disposition::SkipExisting => {
                info!(path = %path.display(), "output exists, skipping");
                self.outcomes.push(WriteOutcome {
                    path: path.to_string_lossy().to_string(),
                    action: "skipped".to_string(),
                    records: 0,
                });
                return Ok(false);
            }
            Disposition::Write => "written",
        };
        TableStore::save(records, path)?;
        self.outcomes.push(WriteOutcome {
            path: path.to_string_lossy().to_string(),
            action: action.to_string(),
            records: records.len(),
        });
        Ok(true)
    }
}

pub struct App {
    config: ResolvedConfig,
}

impl App {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    /// Re-run skip: when overwriting is off and every target of an
    /// operation already exists, the computation itself is skipped.
    fn skip_existing(&self, names: &[&str]) -> Option<Vec<WriteOutcome>> {
        if self.config.overwrite {
            return None;
        }
        let targets: Vec<PathBuf> = names
            .iter()
            .map(|name| self.config.outdir.join(name))
            .collect();
        if !targets.iter().all(|path| path.exists()) {
            return None;
        }
        info!("all outputs exist, skipping computation");
        Some(
            targets
                .iter()
                .map(|path| WriteOutcome {
                    path: path.to_string_lossy().to_string(),
                    action: "skipped".to_string(),
                    records: 0,
                })
                .collect(),
        )
    }

    /// Reconcile the archive against finished QC results: which live,
    /// public runs inside the date window still need processing.
    pub fn available(&self, inputs: &AvailableInputs) -> Result<AvailableResult, CensusError> {
        if let Some(outputs) = self.skip_existing(&["finished.tsv", "available.tsv"]) {
            return Ok(AvailableResult {
                finished: 0,
                live: 0,
                available: 0,
                outputs,
            });
        }
        let accession_records = TableStore::load(&inputs.accessions)?;
        let layout_by_experiment = match &inputs.layouts {
            Some(path) => index_values(TableStore::load_indexed(path, 0)?, 1),
            None => HashMap::new(),
        };

        let scanner = FastqcResults::new(&inputs.fastqc_dir, self.config.parallels)?;
        let finished = scanner.finished()?;
        info!(finished = finished.len(), "scanned finished QC results");

        let set = AvailabilitySet::new(
            self.config.date_mode,
            self.config.base_date,
            self.config.parallels,
        )?;
        let finished_keys = set.finished_run_ids(&finished);
        let live = set.live_runs(&accession_records, &layout_by_experiment);
        info!(live = live.len(), "filtered live public runs");
        let available = set.compute_available(&live, &finished_keys);
        info!(available = available.len(), "records awaiting QC");

        let mut writer = OutputWriter::new(self.config.overwrite);
        writer.write(&finished, &self.config.outdir.join("finished.tsv"))?;
        writer.write(&available, &self.config.outdir.join("available.tsv"))?;

        Ok(AvailableResult {
            finished: finished.len(),
            live: live.len(),
            available: available.len(),
            outputs: writer.outcomes,
        })
    }

    /// Merge per-read summaries upward: reads are concatenated, runs
    /// collapse their mate pairs, experiments collapse their runs, and
    /// samples collapse their experiments.
    pub fn merge(&self, inputs: &MergeInputs) -> Result<MergeResult, CensusError> {
        let targets = ["reads.tsv", "runs.tsv", "experiments.tsv", "samples.tsv"];
        if let Some(outputs) = self.skip_existing(&targets) {
            return Ok(MergeResult {
                reads: 0,
                unreadable_reads: 0,
                runs: 0,
                imperfect_runs: 0,
                experiments: 0,
                orphan_runs: 0,
                samples: 0,
                orphan_experiments: 0,
                outputs,
            });
        }
        let list = TableStore::load(&inputs.summary_list)?;
        let summary_paths: Vec<&str> = list
            .iter()
            .filter_map(|record| record.first())
            .map(String::as_str)
            .collect();

        let pool = worker_pool(self.config.parallels)?;
        let reads: Vec<Record> = pool.install(|| {
            summary_paths
                .par_iter()
                .map(|path| read_summary_row(Path::new(path)))
                .collect()
        });
        let unreadable = reads
            .iter()
            .filter(|record| record.get(1).map(String::as_str) == Some(CORRUPT_FLAG))
            .count();
        if unreadable > 0 {
            warn!(unreadable, "summary files could not be read");
        }

        let members_records = TableStore::load(&inputs.run_members)?;
        let members = HierarchyIndex::live_members(&members_records);
        let experiment_runs = HierarchyIndex::experiment_to_runs(&members);
        let sample_experiments = HierarchyIndex::sample_to_experiments(&members);

        // read -> run
        let complete_reads: Vec<Record> = reads.iter().filter(|r| is_complete(r)).cloned().collect();
        let (read_groups, unkeyed) = HierarchyIndex::group_by_parent(complete_reads, |record| {
            record
                .get(col::ID)
                .map(|id| run_id_of_file_id(id).to_string())
        });
        if !unkeyed.is_empty() {
            warn!(count = unkeyed.len(), "read summaries without a run id");
        }
        let runs: Vec<Record> = pool.install(|| {
            read_groups
                .par_iter()
                .map(|(run_id, group)| AggregationEngine::merge_reads_to_run(run_id, group))
                .collect()
        });
        let imperfect = runs.iter().filter(|record| !is_complete(record)).count();

        // run -> experiment
        let mergeable_runs: Vec<Record> =
            runs.iter().filter(|r| is_complete(r)).cloned().collect();
        let (run_groups, orphan_runs) = HierarchyIndex::group_by_parent(mergeable_runs, |record| {
            record
                .get(col::ID)
                .and_then(|run| experiment_runs.parent_of(run))
                .map(str::to_string)
        });
        if !orphan_runs.is_empty() {
            warn!(count = orphan_runs.len(), "runs without a live experiment membership");
        }
        let experiments: Vec<Record> = pool.install(|| {
            run_groups
                .par_iter()
                .map(|(experiment_id, group)| AggregationEngine::merge_group(experiment_id, group))
                .collect()
        });

        // experiment -> sample
        let (experiment_groups, orphan_experiments) =
            HierarchyIndex::group_by_parent(experiments.clone(), |record| {
                record
                    .get(col::ID)
                    .and_then(|experiment| sample_experiments.parent_of(experiment))
                    .map(str::to_string)
            });
        if !orphan_experiments.is_empty() {
            warn!(count = orphan_experiments.len(), "experiments without a live sample membership");
        }
        let samples: Vec<Record> = pool.install(|| {
            experiment_groups
                .par_iter()
                .map(|(sample_id, group)| AggregationEngine::merge_group(sample_id, group))
                .collect()
        });

        let mut writer = OutputWriter::new(self.config.overwrite);
        writer.write(
            &with_header(reads.clone()),
            &self.config.outdir.join("reads.tsv"),
        )?;
        writer.write(
            &with_header(runs.clone()),
            &self.config.outdir.join("runs.tsv"),
        )?;
        writer.write(
            &with_header(experiments.clone()),
            &self.config.outdir.join("experiments.tsv"),
        )?;
        writer.write(
            &with_header(samples.clone()),
            &self.config.outdir.join("samples.tsv"),
        )?;

        Ok(MergeResult {
            reads: reads.len(),
            unreadable_reads: unreadable,
            runs: runs.len(),
            imperfect_runs: imperfect,
            experiments: experiments.len(),
            orphan_runs: orphan_runs.len(),
            samples: samples.len(),
            orphan_experiments: orphan_experiments.len(),
            outputs: writer.outcomes,
        })
    }

    /// Enrich the merged experiment and sample tables with library,
    /// taxonomy, and received-date metadata.
    pub fn annotate(&self, inputs: &AnnotateInputs) -> Result<AnnotateResult, CensusError> {
        let targets = ["experiments_annotated.tsv", "samples_annotated.tsv"];
        if let Some(outputs) = self.skip_existing(&targets) {
            return Ok(AnnotateResult {
                experiments: 0,
                samples: 0,
                outputs,
            });
        }
        let members_records = TableStore::load(&inputs.run_members)?;
        let members = HierarchyIndex::live_members(&members_records);
        let biosample_of_sample = HierarchyIndex::sample_biosamples(&members);

        let taxonomy_index = TableStore::load_indexed(&inputs.taxonomy, 0)?;
        let library_index = TableStore::load_indexed(&inputs.library, library::EXPERIMENT)?;
        let received_index =
            index_values(TableStore::load_indexed(&inputs.accessions, 0)?, accessions::RECEIVED);

        let experiment_rows = drop_header(TableStore::load(&inputs.experiments)?);
        let annotated_experiments = AnnotationJoiner::left_join(
            experiment_rows,
            &library_index,
            &[
                library::INSTRUMENT,
                library::LIBRARY_STRATEGY,
                library::LIBRARY_SOURCE,
                library::LIBRARY_SELECTION,
            ],
            |record| record.first().cloned(),
        );

        let sample_rows = drop_header(TableStore::load(&inputs.samples)?);
        let annotated_samples = AnnotationJoiner::annotate_samples(
            sample_rows,
            &biosample_of_sample,
            &taxonomy_index,
            &received_index,
        );

        let mut writer = OutputWriter::new(self.config.overwrite);
        let mut experiment_header = header_record();
        experiment_header.extend(EXPERIMENT_ANNOTATION_HEADER.iter().map(|s| s.to_string()));
        let mut experiment_table = vec![experiment_header];
        experiment_table.extend(annotated_experiments.iter().cloned());
        writer.write(
            &experiment_table,
            &self.config.outdir.join("experiments_annotated.tsv"),
        )?;

        let mut sample_header = header_record();
        sample_header.extend(SAMPLE_ANNOTATION_HEADER.iter().map(|s| s.to_string()));
        let mut sample_table = vec![sample_header];
        sample_table.extend(annotated_samples.iter().cloned());
        writer.write(
            &sample_table,
            &self.config.outdir.join("samples_annotated.tsv"),
        )?;

        Ok(AnnotateResult {
            experiments: annotated_experiments.len(),
            samples: annotated_samples.len(),
            outputs: writer.outcomes,
        })
    }

    /// List finished results produced by a different FastQC version.
    pub fn outdated(
        &self,
        fastqc_dir: &Path,
        version: &str,
    ) -> Result<OutdatedResult, CensusError> {
        if let Some(outputs) = self.skip_existing(&["outdated.tsv"]) {
            return Ok(OutdatedResult {
                finished: 0,
                outdated: 0,
                outputs,
            });
        }
        let scanner = FastqcResults::new(fastqc_dir, self.config.parallels)?;
        let finished = scanner.finished()?;
        let outdated = FastqcResults::outdated(&finished, version);

        let mut writer = OutputWriter::new(self.config.overwrite);
        writer.write(&outdated, &self.config.outdir.join("outdated.tsv"))?;

        Ok(OutdatedResult {
            finished: finished.len(),
            outdated: outdated.len(),
            outputs: writer.outcomes,
        })
    }
}

/// One per-read summary row from its own TSV file. Unreadable files get
/// a sentinel row so the batch keeps going and the gap stays visible.
fn read_summary_row(path: &Path) -> Record {
    match fs::read_to_string(path) {
        Ok(content) => match content.lines().next() {
            Some(line) => line.split('\t').map(str::to_string).collect(),
            None => corrupt_row(path),
        },
        Err(_) => corrupt_row(path),
    }
}

fn corrupt_row(path: &Path) -> Record {
    vec![
        path.to_string_lossy().to_string(),
        CORRUPT_FLAG.to_string(),
    ]
}

fn with_header(mut records: Vec<Record>) -> Vec<Record> {
    let mut table = vec![header_record()];
    table.append(&mut records);
    table
}

fn drop_header(records: Vec<Record>) -> Vec<Record> {
    records.into_iter().skip(1).collect()
}

fn index_values(index: HashMap<String, Record>, column: usize) -> HashMap<String, String> {
    index
        .into_iter()
        .filter_map(|(key, record)| record.get(column).cloned().map(|value| (key, value)))
        .collect()
}
