use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CensusError {
    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("parallelism width must be at least 1")]
    InvalidParallelism,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("required input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("worker pool setup failed: {0}")]
    PoolBuild(String),

    #[error("two records derived the same output path: {0}")]
    DuplicateOutputPath(String),
}
