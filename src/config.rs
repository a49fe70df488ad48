use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{DateMode, parse_base_date};
use crate::error::CensusError;

pub const DEFAULT_PARALLELS: usize = 4;

/// One fixed-width pool per pipeline stage; the width comes from the
/// resolved config and is never read from ambient state.
pub fn worker_pool(parallels: usize) -> Result<rayon::ThreadPool, CensusError> {
    if parallels < 1 {
        return Err(CensusError::InvalidParallelism);
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(parallels)
        .build()
        .map_err(|err| CensusError::PoolBuild(err.to_string()))
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub parallels: Option<usize>,
    #[serde(default)]
    pub date_mode: Option<DateMode>,
    #[serde(default)]
    pub base_date: Option<String>,
    #[serde(default)]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub outdir: Option<PathBuf>,
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub parallels: Option<usize>,
    pub date_mode: Option<DateMode>,
    pub base_date: Option<String>,
    pub overwrite: Option<bool>,
    pub outdir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub parallels: usize,
    pub date_mode: DateMode,
    pub base_date: DateTime<Utc>,
    pub overwrite: bool,
    pub outdir: PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `qc-census.json` (or an explicit path) and fold in overrides.
    /// With no explicit path a missing file is fine: every field has a
    /// default, so the tool runs configured from the command line alone.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, CensusError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("qc-census.json"),
        };

        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| CensusError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| CensusError::ConfigParse(err.to_string()))?
        } else if path.is_some() {
            return Err(CensusError::ConfigRead(config_path));
        } else {
            Config::default()
        };

        Self::resolve_config(config, overrides)
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, CensusError> {
        let parallels = overrides
            .parallels
            .or(config.parallels)
            .unwrap_or(DEFAULT_PARALLELS);
        if parallels < 1 {
            return Err(CensusError::InvalidParallelism);
        }

        let date_mode = overrides
            .date_mode
            .or(config.date_mode)
            .unwrap_or_default();

        let base_date = match overrides.base_date.or(config.base_date) {
            Some(value) => parse_base_date(&value)?,
            None => Utc::now(),
        };

        let overwrite = overrides.overwrite.or(config.overwrite).unwrap_or(false);

        let outdir = overrides
            .outdir
            .or(config.outdir)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(ResolvedConfig {
            parallels,
            date_mode,
            base_date,
            overwrite,
            outdir,
        })
    }
}
