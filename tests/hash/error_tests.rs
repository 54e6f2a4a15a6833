// Tests for the error taxonomy and result values

use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};

use checksum::hash::{ChecksumError, ChecksumResult, ErrorKind, FileChecksum};

#[test]
fn test_display_includes_path_kind_and_cause() {
    let err = ChecksumError::new("/data/file.bin", ErrorKind::ReadFailure)
        .with_cause(io::Error::new(io::ErrorKind::UnexpectedEof, "disk went away"));

    let text = err.to_string();

    assert!(text.starts_with("/data/file.bin: error while reading file"));
    assert!(text.ends_with("disk went away"));
    assert!(err.source().is_some());
}

#[test]
fn test_description_without_cause() {
    let err = ChecksumError::new("dir", ErrorKind::WrongFileType);

    assert_eq!(err.description(), ErrorKind::WrongFileType.to_string());
    assert!(err.source().is_none());
}

#[test]
fn test_equality_ignores_cause() {
    let plain = ChecksumError::new("a", ErrorKind::CannotOpen);
    let detailed = ChecksumError::new("a", ErrorKind::CannotOpen).with_detail("permission denied");
    let other_kind = ChecksumError::new("a", ErrorKind::CannotBeRead);

    assert_eq!(plain, detailed);
    assert_ne!(plain, other_kind);
}

#[test]
fn test_every_kind_has_a_message() {
    let kinds = [
        ErrorKind::UnsupportedAlgorithm,
        ErrorKind::CannotBeRead,
        ErrorKind::WrongFileType,
        ErrorKind::CannotOpen,
        ErrorKind::ReadFailure,
        ErrorKind::HashWriteFailure,
        ErrorKind::WalkFailure,
        ErrorKind::InternalAggregationFailure,
    ];

    for kind in kinds {
        assert!(!kind.to_string().is_empty(), "{:?}", kind);
    }
}

#[test]
fn test_kind_serializes_by_name() {
    let json = serde_json::to_string(&ErrorKind::HashWriteFailure).unwrap();

    assert_eq!(json, "\"HashWriteFailure\"");
}

#[test]
fn test_result_carries_exactly_one_outcome() {
    let ok = ChecksumResult::from(FileChecksum {
        path: PathBuf::from("ok.txt"),
        digest: vec![0x00, 0xff],
    });
    let failed = ChecksumResult::from(ChecksumError::new("bad.txt", ErrorKind::CannotOpen));

    assert!(ok.is_ok());
    assert!(!failed.is_ok());
    assert_eq!(ok.path(), Path::new("ok.txt"));
    assert_eq!(failed.path(), Path::new("bad.txt"));
    assert_eq!(ok.into_result().unwrap().hex(), "00ff");
    assert_eq!(failed.into_result().unwrap_err().kind, ErrorKind::CannotOpen);
}

#[test]
fn test_result_from_std_result() {
    let res: Result<FileChecksum, ChecksumError> = Err(ChecksumError::new("x", ErrorKind::WalkFailure));

    match ChecksumResult::from(res) {
        ChecksumResult::Error(err) => assert_eq!(err.kind, ErrorKind::WalkFailure),
        ChecksumResult::Checksum(_) => panic!("expected an error"),
    }
}
