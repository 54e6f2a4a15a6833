// Tests for the checksum report format and stream collection

use std::io::Cursor;
use std::path::PathBuf;

use checksum::hash::{collect, collect_with, ChecksumError, ErrorKind, FileChecksum, Report, ReportError};
use tempfile::tempdir;

use crate::common::{engine, write_file};

fn render(report: &Report) -> String {
    let mut out = Vec::new();
    report.write_to(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_write_layout() {
    let mut report = Report::new("md5");
    report.add_checksum(&FileChecksum {
        path: PathBuf::from("b/two.txt"),
        digest: vec![0xde, 0xad],
    });
    report.add_checksum(&FileChecksum {
        path: PathBuf::from("a/one.txt"),
        digest: vec![0xbe, 0xef],
    });

    assert_eq!(
        render(&report),
        "[Config]\nhash=md5\n[Files]\na/one.txt=beef\nb/two.txt=dead\n"
    );
}

#[test]
fn test_errors_section_only_when_needed() {
    let mut report = Report::new("sha1");
    report.add_error(&ChecksumError::new("gone.txt", ErrorKind::CannotBeRead).with_detail("no such file"));

    let text = render(&report);

    assert!(text.ends_with("[Errors]\ngone.txt=file/folder could not be read: no such file\n"));
    assert!(!render(&Report::new("sha1")).contains("[Errors]"));
}

#[test]
fn test_parse_written_report() {
    let mut report = Report::new("sha256");
    report.add_checksum(&FileChecksum {
        path: PathBuf::from("dir/with=equals.txt"),
        digest: vec![0x0a, 0xff],
    });
    report.add_error(&ChecksumError::new("x", ErrorKind::WrongFileType));

    let parsed = Report::parse(Cursor::new(render(&report))).unwrap();

    assert_eq!(parsed, report);
}

#[test]
fn test_parse_skips_comments_and_normalises_case() {
    let text = "; generated by hand\n\n[Config]\nhash = SHA1\n# files follow\n[Files]\nfile.txt=ABCDEF\n";

    let report = Report::parse(Cursor::new(text)).unwrap();

    assert_eq!(report.algorithm, "SHA1");
    assert_eq!(report.files[&PathBuf::from("file.txt")], "abcdef");
}

#[test]
fn test_parse_rejects_bad_input() {
    let missing_hash = "[Config]\n[Files]\na=00\n";
    assert!(matches!(
        Report::parse(Cursor::new(missing_hash)),
        Err(ReportError::MissingAlgorithm)
    ));

    let no_section = "a=00\n";
    assert!(matches!(
        Report::parse(Cursor::new(no_section)),
        Err(ReportError::Parse { line: 1, .. })
    ));

    let bad_digest = "[Config]\nhash=md5\n[Files]\na=not-hex\n";
    assert!(matches!(
        Report::parse(Cursor::new(bad_digest)),
        Err(ReportError::Parse { line: 4, .. })
    ));

    let unknown = "[Config]\nhash=md5\n[Extra]\nk=v\n";
    assert!(matches!(
        Report::parse(Cursor::new(unknown)),
        Err(ReportError::Parse { line: 4, .. })
    ));
}

#[test]
fn test_load_missing_report() {
    let dir = tempdir().unwrap();

    let err = Report::load(&dir.path().join("nope.ini")).unwrap_err();

    assert!(matches!(err, ReportError::Open { .. }));
}

#[test]
fn test_collect_into_report_and_back() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"abc");
    write_file(dir.path(), "b.txt", b"");
    let report_path = dir.path().join("sums.ini");

    let collected = collect(engine().checksum_tree(dir.path(), "md5"));
    assert!(collected.is_clean());
    let report = collected.into_report("md5");
    std::fs::write(&report_path, render(&report)).unwrap();

    let loaded = Report::load(&report_path).unwrap();
    assert_eq!(loaded.algorithm, "md5");
    assert_eq!(loaded.files[&dir.path().join("a.txt")], "900150983cd24fb0d6963f7d28e17f72");
    assert_eq!(loaded.files[&dir.path().join("b.txt")], "d41d8cd98f00b204e9800998ecf8427e");
}

#[test]
fn test_collect_with_sees_every_result() {
    let dir = tempdir().unwrap();
    write_file(dir.path(), "a.txt", b"a");
    let missing = dir.path().join("missing");
    let roots = vec![dir.path().to_path_buf(), missing];

    let mut observed = 0;
    let collected = collect_with(engine().checksum_many(&roots, "md5"), |_| observed += 1);

    assert_eq!(observed, 2);
    assert_eq!(collected.checksums.len(), 1);
    assert_eq!(collected.errors.len(), 1);
    assert!(!collected.is_clean());
}

#[test]
fn test_error_paths_with_equals_survive() {
    let mut report = Report::new("md5");
    let odd = PathBuf::from("dir/key=value\\name.txt");
    report.add_error(&ChecksumError::new(odd.clone(), ErrorKind::ReadFailure).with_detail("offset=4096"));

    let text = render(&report);
    let parsed = Report::parse(Cursor::new(text.as_str())).unwrap();

    assert!(text.contains("dir/key\\=value\\\\name.txt="));
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed.errors[&odd], "error while reading file: offset=4096");
}
