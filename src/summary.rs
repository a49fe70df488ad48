//! The shared schema of per-read quality summary tables. Every level of
//! the hierarchy (read, run, experiment, sample) speaks these 18 columns.

/// Column positions within a summary record.
pub mod col {
    pub const ID: usize = 0;
    pub const FASTQC_VERSION: usize = 1;
    pub const FILENAME: usize = 2;
    pub const FILE_TYPE: usize = 3;
    pub const ENCODING: usize = 4;
    pub const TOTAL_SEQUENCES: usize = 5;
    pub const FILTERED_SEQUENCES: usize = 6;
    pub const SEQUENCE_LENGTH: usize = 7;
    pub const MIN_SEQUENCE_LENGTH: usize = 8;
    pub const MAX_SEQUENCE_LENGTH: usize = 9;
    pub const MEAN_SEQUENCE_LENGTH: usize = 10;
    pub const MEDIAN_SEQUENCE_LENGTH: usize = 11;
    pub const PERCENT_GC: usize = 12;
    pub const TOTAL_DUPLICATE_PERCENTAGE: usize = 13;
    pub const OVERALL_MEAN_QUALITY_SCORE: usize = 14;
    pub const OVERALL_MEDIAN_QUALITY_SCORE: usize = 15;
    pub const OVERALL_N_CONTENT: usize = 16;
    pub const READ_LAYOUT: usize = 17;
}

pub const COLUMN_COUNT: usize = 18;

pub const HEADER: [&str; COLUMN_COUNT] = [
    "ID",
    "fastqc_version",
    "filename",
    "file_type",
    "encoding",
    "total_sequences",
    "filtered_sequences",
    "sequence_length",
    "min_sequence_length",
    "max_sequence_length",
    "mean_sequence_length",
    "median_sequence_length",
    "percent_gc",
    "total_duplicate_percentage",
    "overall_mean_quality_score",
    "overall_median_quality_score",
    "overall_n_content",
    "read_layout",
];

pub fn header_record() -> Vec<String> {
    HEADER.iter().map(|name| name.to_string()).collect()
}

/// How a column merges when child records collapse into a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggRule {
    /// Child ids stripped of their mate suffix, deduplicated, comma-joined.
    JoinIds,
    /// Unique literal values, comma-joined.
    UnionJoin,
    /// Arithmetic sum.
    Sum,
    /// Arithmetic mean, every child weighted equally.
    Mean,
    /// Percentages recombined through absolute counts weighted by each
    /// child's total_sequences.
    WeightedPercent,
    /// Layout literal decided by the merge, not by the children.
    Layout,
}

pub fn rule_for(column: usize) -> AggRule {
    match column {
        col::ID => AggRule::JoinIds,
        col::FASTQC_VERSION | col::FILENAME | col::FILE_TYPE | col::ENCODING => AggRule::UnionJoin,
        col::TOTAL_SEQUENCES | col::FILTERED_SEQUENCES => AggRule::Sum,
        col::SEQUENCE_LENGTH
        | col::MIN_SEQUENCE_LENGTH
        | col::MAX_SEQUENCE_LENGTH
        | col::MEAN_SEQUENCE_LENGTH
        | col::MEDIAN_SEQUENCE_LENGTH => AggRule::Mean,
        col::PERCENT_GC | col::TOTAL_DUPLICATE_PERCENTAGE => AggRule::WeightedPercent,
        col::OVERALL_MEAN_QUALITY_SCORE
        | col::OVERALL_MEDIAN_QUALITY_SCORE
        | col::OVERALL_N_CONTENT => AggRule::Mean,
        col::READ_LAYOUT => AggRule::Layout,
        _ => AggRule::UnionJoin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_matches_column_count() {
        assert_eq!(HEADER.len(), COLUMN_COUNT);
        assert_eq!(HEADER[col::READ_LAYOUT], "read_layout");
        assert_eq!(HEADER[col::TOTAL_SEQUENCES], "total_sequences");
    }

    #[test]
    fn every_column_has_a_rule() {
        let rules: Vec<AggRule> = (0..COLUMN_COUNT).map(rule_for).collect();
        assert_eq!(rules[col::ID], AggRule::JoinIds);
        assert_eq!(rules[col::ENCODING], AggRule::UnionJoin);
        assert_eq!(rules[col::FILTERED_SEQUENCES], AggRule::Sum);
        assert_eq!(rules[col::MEDIAN_SEQUENCE_LENGTH], AggRule::Mean);
        assert_eq!(rules[col::PERCENT_GC], AggRule::WeightedPercent);
        assert_eq!(rules[col::READ_LAYOUT], AggRule::Layout);
    }
}
