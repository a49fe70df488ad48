use std::fs;
use std::path::PathBuf;

use assert_matches::assert_matches;
use qc_census::config::{ConfigLoader, ConfigOverrides, DEFAULT_PARALLELS};
use qc_census::domain::DateMode;
use qc_census::error::CensusError;
use tempfile::TempDir;

#[test]
fn resolve_reads_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("qc-census.json");
    fs::write(
        &path,
        r#"{
            "parallels": 8,
            "date_mode": "after",
            "base_date": "2015-03-01",
            "overwrite": true,
            "outdir": "/data/out"
        }"#,
    )
    .unwrap();

    let resolved =
        ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap();
    assert_eq!(resolved.parallels, 8);
    assert_eq!(resolved.date_mode, DateMode::After);
    assert_eq!(resolved.base_date.date_naive().to_string(), "2015-03-01");
    assert!(resolved.overwrite);
    assert_eq!(resolved.outdir, PathBuf::from("/data/out"));
}

#[test]
fn explicit_config_path_must_exist() {
    let err = ConfigLoader::resolve(Some("/definitely/not/here.json"), ConfigOverrides::default())
        .unwrap_err();
    assert_matches!(err, CensusError::ConfigRead(_));
}

#[test]
fn cli_overrides_beat_the_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("qc-census.json");
    fs::write(&path, r#"{ "parallels": 2, "overwrite": false }"#).unwrap();

    let overrides = ConfigOverrides {
        parallels: Some(16),
        overwrite: Some(true),
        ..ConfigOverrides::default()
    };
    let resolved = ConfigLoader::resolve(path.to_str(), overrides).unwrap();
    assert_eq!(resolved.parallels, 16);
    assert!(resolved.overwrite);
    assert_eq!(resolved.date_mode, DateMode::Before);
}

#[test]
fn malformed_config_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("qc-census.json");
    fs::write(&path, "{ parallels: oops }").unwrap();
    let err = ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap_err();
    assert_matches!(err, CensusError::ConfigParse(_));
}

#[test]
fn defaults_apply_without_a_file() {
    let resolved = ConfigLoader::resolve_config(
        qc_census::config::Config::default(),
        ConfigOverrides::default(),
    )
    .unwrap();
    assert_eq!(resolved.parallels, DEFAULT_PARALLELS);
    assert_eq!(resolved.date_mode, DateMode::Before);
}
