// Tests for verification against a stored report

use std::fs;

use checksum::hash::{collect, ErrorKind, Report, VerifyEngine};
use tempfile::tempdir;

use crate::common::{engine, write_file};

fn snapshot(root: &std::path::Path, algorithm: &str) -> Report {
    collect(engine().checksum_tree(root, algorithm)).into_report(algorithm)
}

#[test]
fn test_unchanged_tree_verifies_clean() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"alpha");
    write_file(dir.path(), "nested/b.txt", b"beta");
    let report = snapshot(dir.path(), "sha256");
    let engine = engine();

    let outcome = VerifyEngine::new(&engine).verify(&report, &[dir.path().to_path_buf()]);

    assert_eq!(outcome.matches, 2);
    assert!(!outcome.has_issues());
}

#[test]
fn test_detects_modified_deleted_and_new_files() {
    let dir = tempdir().unwrap();
    let changed = write_file(dir.path(), "changed.txt", b"before");
    let deleted = write_file(dir.path(), "deleted.txt", b"bye");
    write_file(dir.path(), "same.txt", b"same");
    let report = snapshot(dir.path(), "md5");

    fs::write(&changed, b"after").unwrap();
    fs::remove_file(&deleted).unwrap();
    let added = write_file(dir.path(), "added.txt", b"hello");
    let engine = engine();

    let outcome = VerifyEngine::new(&engine).verify(&report, &[dir.path().to_path_buf()]);

    assert_eq!(outcome.matches, 1);
    assert_eq!(outcome.mismatches.len(), 1);
    assert_eq!(outcome.mismatches[0].path, changed);
    assert_eq!(outcome.mismatches[0].expected, report.files[&changed]);
    assert_eq!(outcome.missing_files, vec![deleted]);
    assert_eq!(outcome.new_files, vec![added]);
    assert!(outcome.errors.is_empty());
    assert!(outcome.has_issues());
}

#[test]
fn test_without_sources_checks_listed_files_only() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "kept.txt", b"kept");
    let removed = write_file(dir.path(), "removed.txt", b"removed");
    let report = snapshot(dir.path(), "sha1");

    fs::remove_file(&removed).unwrap();
    // Not listed, and no source is walked, so it is never seen
    write_file(dir.path(), "unlisted.txt", b"new");
    let engine = engine();

    let outcome = VerifyEngine::new(&engine).verify(&report, &[]);

    assert_eq!(outcome.matches, 1);
    assert_eq!(outcome.missing_files, vec![removed]);
    assert!(outcome.new_files.is_empty());
}

#[test]
fn test_unsupported_report_algorithm_is_an_error() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "a.txt", b"a");
    let mut report = Report::new("md4");
    report.files.insert(path.clone(), "00".to_string());
    let engine = engine();

    let outcome = VerifyEngine::new(&engine).verify(&report, &[]);

    assert_eq!(outcome.matches, 0);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].kind, ErrorKind::UnsupportedAlgorithm);
    assert_eq!(outcome.errors[0].path, path);
}
