use std::collections::HashMap;

use crate::aggregate::NA;
use crate::summary::col;
use crate::table::Record;

/// Column positions in the extracted biosample taxonomy table.
pub mod taxonomy {
    pub const ACCESSION: usize = 0;
    pub const TAXONOMY_ID: usize = 1;
    pub const TAXONOMY_NAME: usize = 2;
    pub const GENOME_SIZE: usize = 3;
}

/// Column positions in the extracted experiment library table.
pub mod library {
    pub const EXPERIMENT: usize = 0;
    pub const INSTRUMENT: usize = 1;
    pub const LIBRARY_STRATEGY: usize = 2;
    pub const LIBRARY_SOURCE: usize = 3;
    pub const LIBRARY_SELECTION: usize = 4;
}

pub const SAMPLE_ANNOTATION_HEADER: [&str; 6] = [
    "biosample",
    "taxonomy_id",
    "taxonomy_name",
    "genome_size",
    "coverage",
    "received_date",
];

pub const EXPERIMENT_ANNOTATION_HEADER: [&str; 4] = [
    "instrument",
    "library_strategy",
    "library_source",
    "library_selection",
];

pub struct AnnotationJoiner;

impl AnnotationJoiner {
    /// Left outer join: append the chosen metadata columns to every base
    /// record, filling NA on a lookup miss. No row is ever dropped.
    pub fn left_join<K>(
        base: Vec<Record>,
        index: &HashMap<String, Record>,
        value_columns: &[usize],
        key_of: K,
    ) -> Vec<Record>
    where
        K: Fn(&Record) -> Option<String>,
    {
        base.into_iter()
            .map(|mut record| {
                let matched = key_of(&record).and_then(|key| index.get(&key));
                for &column in value_columns {
                    let value = matched
                        .and_then(|metadata| metadata.get(column))
                        .filter(|value| !value.is_empty())
                        .cloned()
                        .unwrap_or_else(|| NA.to_string());
                    record.push(value);
                }
                record
            })
            .collect()
    }

    /// Sample-level enrichment: biosample accession, taxonomy, genome
    /// size, the coverage derived from it, and the received date.
    pub fn annotate_samples(
        samples: Vec<Record>,
        biosample_of_sample: &HashMap<String, String>,
        taxonomy_index: &HashMap<String, Record>,
        received_index: &HashMap<String, String>,
    ) -> Vec<Record> {
        samples
            .into_iter()
            .map(|mut record| {
                let sample_id = record.first().cloned().unwrap_or_default();
                let biosample = biosample_of_sample
                    .get(&sample_id)
                    .map(String::as_str)
                    .and_then(|raw| resolve_biosample(raw, &sample_id));
                let matched = biosample
                    .as_deref()
                    .and_then(|accession| taxonomy_index.get(accession));

                record.push(biosample.unwrap_or_else(|| NA.to_string()));
                for column in [
                    taxonomy::TAXONOMY_ID,
                    taxonomy::TAXONOMY_NAME,
                    taxonomy::GENOME_SIZE,
                ] {
                    let value = matched
                        .and_then(|metadata| metadata.get(column))
                        .filter(|value| !value.is_empty())
                        .cloned()
                        .unwrap_or_else(|| NA.to_string());
                    record.push(value);
                }

                let genome_size = record
                    .last()
                    .map(String::as_str)
                    .unwrap_or(NA)
                    .to_string();
                let read_count = record
                    .get(col::TOTAL_SEQUENCES)
                    .map(String::as_str)
                    .unwrap_or(NA);
                record.push(coverage(read_count, &genome_size));

                let received = received_index
                    .get(&sample_id)
                    .filter(|value| !value.is_empty())
                    .cloned()
                    .unwrap_or_else(|| NA.to_string());
                record.push(received);
                record
            })
            .collect()
    }
}

/// Normalize a biosample field from the membership table into a full
/// accession. The archive records three shapes: a complete accession, a
/// `-` placeholder (the sample id stands in), and a bare number whose
/// authority prefix is recovered from the sample accession's first
/// letter (SRS -> SAMN, ERS -> SAME, DRS -> SAMD).
pub fn resolve_biosample(raw: &str, sample_id: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with("SAM") {
        return Some(trimmed.to_string());
    }
    if trimmed.is_empty() || trimmed == "-" {
        if sample_id.is_empty() {
            return None;
        }
        return Some(sample_id.to_string());
    }
    if trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        let prefix = match sample_id.chars().next() {
            Some('S') => "SAMN",
            Some('E') => "SAME",
            Some('D') => "SAMD",
            _ => return None,
        };
        return Some(format!("{prefix}{trimmed}"));
    }
    Some(trimmed.to_string())
}

/// Expected depth of coverage per million: read count over genome size,
/// scaled. Unknown or degenerate genome size has no coverage.
pub fn coverage(read_count: &str, genome_size: &str) -> String {
    let Ok(reads) = read_count.trim().parse::<f64>() else {
        return NA.to_string();
    };
    let Ok(size) = genome_size.trim().parse::<f64>() else {
        return NA.to_string();
    };
    if size <= 0.0 {
        return NA.to_string();
    }
    format!("{}", reads / size * 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_full_accession() {
        assert_eq!(
            resolve_biosample("SAMD00016353", "DRS000123"),
            Some("SAMD00016353".to_string())
        );
    }

    #[test]
    fn resolve_placeholder_falls_back_to_sample() {
        assert_eq!(
            resolve_biosample("-", "DRS000123"),
            Some("DRS000123".to_string())
        );
    }

    #[test]
    fn resolve_bare_number_by_authority() {
        assert_eq!(
            resolve_biosample("16353", "SRS000123"),
            Some("SAMN16353".to_string())
        );
        assert_eq!(
            resolve_biosample("16353", "ERS000123"),
            Some("SAME16353".to_string())
        );
        assert_eq!(
            resolve_biosample("16353", "DRS000123"),
            Some("SAMD16353".to_string())
        );
        assert_eq!(resolve_biosample("16353", "XRS000123"), None);
    }

    #[test]
    fn coverage_requires_genome_size() {
        assert_eq!(coverage("3000000", "3000000000"), "1000");
        assert_eq!(coverage("3000000", "NA"), "NA");
        assert_eq!(coverage("3000000", "0"), "NA");
        assert_eq!(coverage("NA", "3000000000"), "NA");
    }
}
