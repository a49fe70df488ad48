use std::fs;
use std::io::Write;
use std::path::Path;

use qc_census::fastqc::{CORRUPT_FLAG, FastqcResults, extract_version};
use tempfile::TempDir;

fn write_zip(run_dir: &Path, run: &str, version: &str) {
    fs::create_dir_all(run_dir).unwrap();
    let file = fs::File::create(run_dir.join(format!("{run}_fastqc.zip"))).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    zip.start_file(
        format!("{run}_fastqc/fastqc_data.txt"),
        zip::write::SimpleFileOptions::default(),
    )
    .unwrap();
    zip.write_all(format!("##FastQC\t{version}\n>>Basic Statistics\tpass\n").as_bytes())
        .unwrap();
    zip.finish().unwrap();
}

#[test]
fn finished_scans_three_levels_and_reads_versions() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_zip(&root.join("DRA000/DRA000001/DRR000001"), "DRR000001", "0.11.3");
    write_zip(&root.join("DRA000/DRA000001/DRR000002"), "DRR000002", "0.10.1");

    // an unreadable archive is flagged, not fatal
    let broken_dir = root.join("DRA000/DRA000002/DRR000009");
    fs::create_dir_all(&broken_dir).unwrap();
    fs::write(broken_dir.join("DRR000009_fastqc.zip"), b"not a zip").unwrap();

    let scanner = FastqcResults::new(root, 2).unwrap();
    let finished = scanner.finished().unwrap();

    assert_eq!(finished.len(), 3);
    assert!(finished[0][0].ends_with("DRR000001_fastqc.zip"));
    assert_eq!(finished[0][1], "0.11.3");
    assert_eq!(finished[1][1], "0.10.1");
    assert_eq!(finished[2][1], CORRUPT_FLAG);
}

#[test]
fn outdated_ignores_current_and_corrupt_entries() {
    let finished = vec![
        vec!["a.zip".to_string(), "0.11.3".to_string()],
        vec!["b.zip".to_string(), "0.10.1".to_string()],
        vec!["c.zip".to_string(), CORRUPT_FLAG.to_string()],
    ];
    let outdated = FastqcResults::outdated(&finished, "0.11.3");
    assert_eq!(outdated.len(), 1);
    assert_eq!(outdated[0][0], "b.zip");
}

#[test]
fn extract_version_reads_the_data_file_header() {
    let dir = TempDir::new().unwrap();
    write_zip(dir.path(), "DRR000007", "0.11.9");
    let version = extract_version(&dir.path().join("DRR000007_fastqc.zip"));
    assert_eq!(version.as_deref(), Some("0.11.9"));
}

#[test]
fn extract_version_is_none_for_garbage() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("garbage.zip");
    fs::write(&path, b"garbage").unwrap();
    assert_eq!(extract_version(&path), None);
    assert_eq!(extract_version(&dir.path().join("absent.zip")), None);
}

#[test]
fn missing_root_is_a_hard_error() {
    let dir = TempDir::new().unwrap();
    let scanner = FastqcResults::new(&dir.path().join("nope"), 1).unwrap();
    assert!(scanner.finished().is_err());
}
