use tracing::debug;

use crate::domain::{ReadLayout, mate_number, run_id_of_file_id};
use crate::summary::{AggRule, COLUMN_COUNT, HEADER, col, rule_for};
use crate::table::Record;

/// Placeholder for values that cannot be computed or looked up.
pub const NA: &str = "NA";

/// Flag written in place of metric values when a run's read files do not
/// form a clean mate pair. The row stays visible in output but is kept
/// out of the upper aggregation levels.
pub const IMPERFECT_PAIR_FLAG: &str = "IMPERFECT PAIR DETECTED";

/// Result of a numeric parse that is not allowed to fail the batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parsed {
    Value(f64),
    Fallback(f64),
}

impl Parsed {
    pub fn get(self) -> f64 {
        match self {
            Parsed::Value(value) | Parsed::Fallback(value) => value,
        }
    }

    pub fn is_fallback(self) -> bool {
        matches!(self, Parsed::Fallback(_))
    }
}

/// Parse a metric field, falling back to 0.0 on a missing or non-numeric
/// value. The caller decides whether the fallback is worth logging.
pub fn parse_numeric_or_default(raw: Option<&str>) -> Parsed {
    match raw.and_then(|value| value.trim().parse::<f64>().ok()) {
        Some(value) => Parsed::Value(value),
        None => Parsed::Fallback(0.0),
    }
}

/// A record produced by the merge paths below carries all 18 columns;
/// imperfect-pair rows and malformed pass-through rows do not.
pub fn is_complete(record: &Record) -> bool {
    record.len() == COLUMN_COUNT
}

pub struct AggregationEngine;

impl AggregationEngine {
    /// Collapse the read records of one run. A single read copies through
    /// with layout SINGLE; a clean mate pair merges column by column; any
    /// other shape is flagged instead of merged.
    pub fn merge_reads_to_run(run_id: &str, reads: &[Record]) -> Record {
        if reads.len() == 1 {
            let mut record = reads[0].clone();
            if let Some(id) = record.get_mut(col::ID) {
                *id = run_id.to_string();
            }
            if let Some(layout) = record.get_mut(col::READ_LAYOUT) {
                *layout = ReadLayout::Single.as_str().to_string();
            }
            return record;
        }

        let mates: Vec<&Record> = reads
            .iter()
            .filter(|read| {
                read.get(col::ID)
                    .is_some_and(|id| mate_number(id).is_some())
            })
            .collect();
        let forward = mates
            .iter()
            .find(|read| read.get(col::ID).and_then(|id| mate_number(id)) == Some(1));
        let reverse = mates
            .iter()
            .find(|read| read.get(col::ID).and_then(|id| mate_number(id)) == Some(2));

        match (mates.len(), forward, reverse) {
            (2, Some(forward), Some(reverse)) => Self::merge_columns(
                &[(*forward).clone(), (*reverse).clone()],
                Some(ReadLayout::Paired),
            ),
            _ => vec![run_id.to_string(), IMPERFECT_PAIR_FLAG.to_string()],
        }
    }

    /// Collapse child records one level up (run -> experiment or
    /// experiment -> sample). A group of one passes through untouched
    /// apart from the id; larger groups merge with the N-ary rules, the
    /// layout column becoming the union of child layouts.
    pub fn merge_group(parent_id: &str, children: &[Record]) -> Record {
        let mut record = if children.len() == 1 {
            children[0].clone()
        } else {
            Self::merge_columns(children, None)
        };
        if let Some(id) = record.get_mut(col::ID) {
            *id = parent_id.to_string();
        }
        record
    }

    fn merge_columns(children: &[Record], layout: Option<ReadLayout>) -> Record {
        (0..COLUMN_COUNT)
            .map(|column| match rule_for(column) {
                AggRule::JoinIds => join_ids(children, column),
                AggRule::UnionJoin => union_join(children, column),
                AggRule::Sum => fmt_float(numeric_values(children, column).iter().sum()),
                AggRule::Mean => {
                    let values = numeric_values(children, column);
                    fmt_float(values.iter().sum::<f64>() / values.len() as f64)
                }
                AggRule::WeightedPercent => weighted_percent(children, column),
                AggRule::Layout => match layout {
                    Some(layout) => layout.as_str().to_string(),
                    None => union_join(children, column),
                },
            })
            .collect()
    }
}

fn field<'a>(record: &'a Record, column: usize) -> Option<&'a str> {
    record.get(column).map(String::as_str)
}

fn join_ids(children: &[Record], column: usize) -> String {
    let mut seen = Vec::new();
    for child in children {
        let id = run_id_of_file_id(field(child, column).unwrap_or(NA));
        if !seen.iter().any(|known| known == id) {
            seen.push(id.to_string());
        }
    }
    seen.join(",")
}

fn union_join(children: &[Record], column: usize) -> String {
    let mut seen = Vec::new();
    for child in children {
        let value = field(child, column).unwrap_or(NA);
        if !seen.iter().any(|known| known == value) {
            seen.push(value.to_string());
        }
    }
    seen.join(",")
}

fn numeric_values(children: &[Record], column: usize) -> Vec<f64> {
    children
        .iter()
        .map(|child| {
            let parsed = parse_numeric_or_default(field(child, column));
            if parsed.is_fallback() {
                debug!(
                    column = HEADER[column],
                    id = field(child, col::ID).unwrap_or(NA),
                    "non-numeric metric value, using 0"
                );
            }
            parsed.get()
        })
        .collect()
}

/// Recombine percentages through absolute counts: each child's percentage
/// is converted back to a count against its own total_sequences, the
/// counts and totals are summed, and the ratio becomes the new
/// percentage. A zero combined total has no defined percentage.
fn weighted_percent(children: &[Record], column: usize) -> String {
    let mut count_sum = 0.0;
    let mut total_sum = 0.0;
    for child in children {
        let total = parse_numeric_or_default(field(child, col::TOTAL_SEQUENCES)).get();
        let percent = parse_numeric_or_default(field(child, column)).get();
        count_sum += total * (percent / 100.0);
        total_sum += total;
    }
    if total_sum == 0.0 {
        return NA.to_string();
    }
    fmt_float(count_sum / total_sum * 100.0)
}

fn fmt_float(value: f64) -> String {
    format!("{value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(id: &str, total: &str, dup: &str) -> Record {
        vec![
            id.to_string(),
            "0.11.3".to_string(),
            format!("{id}.fastq"),
            "Conventional base calls".to_string(),
            "Sanger / Illumina 1.9".to_string(),
            total.to_string(),
            "0".to_string(),
            "100".to_string(),
            "100".to_string(),
            "100".to_string(),
            "100".to_string(),
            "100".to_string(),
            "50".to_string(),
            dup.to_string(),
            "30".to_string(),
            "32".to_string(),
            "0.5".to_string(),
            "".to_string(),
        ]
    }

    #[test]
    fn weighted_percent_recombines_counts() {
        let pair = vec![read("RUN_1", "100", "10"), read("RUN_2", "200", "25")];
        let merged = AggregationEngine::merge_reads_to_run("RUN", &pair);
        assert_eq!(merged[col::TOTAL_DUPLICATE_PERCENTAGE], "20");
        assert_eq!(merged[col::TOTAL_SEQUENCES], "300");
        assert_eq!(merged[col::ID], "RUN");
        assert_eq!(merged[col::READ_LAYOUT], "PAIRED");
    }

    #[test]
    fn weighted_percent_zero_total_is_na() {
        let pair = vec![read("RUN_1", "0", "10"), read("RUN_2", "0", "25")];
        let merged = AggregationEngine::merge_reads_to_run("RUN", &pair);
        assert_eq!(merged[col::PERCENT_GC], NA);
        assert_eq!(merged[col::TOTAL_DUPLICATE_PERCENTAGE], NA);
    }

    #[test]
    fn single_read_run_copies_through() {
        let only = vec![read("RUN", "100", "10")];
        let merged = AggregationEngine::merge_reads_to_run("RUN", &only);
        assert_eq!(merged[col::ID], "RUN");
        assert_eq!(merged[col::READ_LAYOUT], "SINGLE");
        assert_eq!(merged[col::TOTAL_SEQUENCES], "100");
    }

    #[test]
    fn extra_forward_mate_is_imperfect() {
        let reads = vec![
            read("RUN_1", "100", "10"),
            read("RUN_1", "100", "10"),
            read("RUN_2", "200", "25"),
        ];
        let merged = AggregationEngine::merge_reads_to_run("RUN", &reads);
        assert_eq!(merged, vec!["RUN".to_string(), IMPERFECT_PAIR_FLAG.to_string()]);
        assert!(!is_complete(&merged));
    }

    #[test]
    fn two_forward_mates_are_imperfect() {
        let reads = vec![read("RUN_1", "100", "10"), read("RUN_1", "200", "25")];
        let merged = AggregationEngine::merge_reads_to_run("RUN", &reads);
        assert_eq!(merged[1], IMPERFECT_PAIR_FLAG);
    }

    #[test]
    fn non_mate_reads_are_dropped_before_pairing() {
        let reads = vec![
            read("RUN_1", "100", "10"),
            read("RUN_2", "200", "25"),
            read("RUN_trimmed", "999", "99"),
        ];
        let merged = AggregationEngine::merge_reads_to_run("RUN", &reads);
        assert_eq!(merged[col::READ_LAYOUT], "PAIRED");
        assert_eq!(merged[col::TOTAL_SEQUENCES], "300");
    }

    #[test]
    fn group_of_one_keeps_child_metrics() {
        let child = AggregationEngine::merge_reads_to_run("RUN", &[read("RUN", "100", "10")]);
        let merged = AggregationEngine::merge_group("EXP", &[child.clone()]);
        assert_eq!(merged[col::ID], "EXP");
        assert_eq!(merged[col::TOTAL_SEQUENCES], child[col::TOTAL_SEQUENCES]);
        assert_eq!(merged[col::READ_LAYOUT], "SINGLE");
    }

    #[test]
    fn nary_group_merge() {
        let mut a = read("RUN1", "100", "10");
        a[col::READ_LAYOUT] = "SINGLE".to_string();
        let mut b = read("RUN2", "200", "25");
        b[col::READ_LAYOUT] = "PAIRED".to_string();
        let mut c = read("RUN3", "100", "40");
        c[col::READ_LAYOUT] = "PAIRED".to_string();

        let merged = AggregationEngine::merge_group("EXP", &[a, b, c]);
        assert_eq!(merged[col::ID], "EXP");
        assert_eq!(merged[col::TOTAL_SEQUENCES], "400");
        // (10 + 50 + 40) / 400 * 100
        assert_eq!(merged[col::TOTAL_DUPLICATE_PERCENTAGE], "25");
        assert_eq!(merged[col::READ_LAYOUT], "SINGLE,PAIRED");
    }

    #[test]
    fn mean_columns_are_unweighted() {
        let pair = vec![read("RUN_1", "100", "10"), read("RUN_2", "200", "25")];
        let merged = AggregationEngine::merge_reads_to_run("RUN", &pair);
        assert_eq!(merged[col::MEAN_SEQUENCE_LENGTH], "100");
        assert_eq!(merged[col::OVERALL_MEAN_QUALITY_SCORE], "30");
    }

    #[test]
    fn non_numeric_metric_falls_back_to_zero() {
        let pair = vec![read("RUN_1", "100", "n/a"), read("RUN_2", "100", "30")];
        let merged = AggregationEngine::merge_reads_to_run("RUN", &pair);
        // (0 + 30) / 200 * 100
        assert_eq!(merged[col::TOTAL_DUPLICATE_PERCENTAGE], "15");
    }

    #[test]
    fn parse_tagging() {
        assert_eq!(parse_numeric_or_default(Some("1.5")), Parsed::Value(1.5));
        assert!(parse_numeric_or_default(Some("abc")).is_fallback());
        assert!(parse_numeric_or_default(None).is_fallback());
        assert_eq!(parse_numeric_or_default(Some("abc")).get(), 0.0);
    }
}
