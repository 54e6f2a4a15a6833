// Values flowing through the checksum engine

use std::path::{Path, PathBuf};

use super::error::ChecksumError;
use super::hash::HasherFactory;

/// Digest of one file, produced once hashing completed successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChecksum {
    pub path: PathBuf,
    pub digest: Vec<u8>,
}

impl FileChecksum {
    /// Lowercase hex rendering of the digest
    pub fn hex(&self) -> String {
        hex::encode(&self.digest)
    }
}

/// Exactly one of a checksum or the failure that replaced it
#[derive(Debug, Clone, PartialEq)]
pub enum ChecksumResult {
    Checksum(FileChecksum),
    Error(ChecksumError),
}

impl ChecksumResult {
    pub fn path(&self) -> &Path {
        match self {
            ChecksumResult::Checksum(cs) => &cs.path,
            ChecksumResult::Error(err) => &err.path,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ChecksumResult::Checksum(_))
    }

    pub fn into_result(self) -> Result<FileChecksum, ChecksumError> {
        match self {
            ChecksumResult::Checksum(cs) => Ok(cs),
            ChecksumResult::Error(err) => Err(err),
        }
    }
}

impl From<FileChecksum> for ChecksumResult {
    fn from(cs: FileChecksum) -> Self {
        ChecksumResult::Checksum(cs)
    }
}

impl From<ChecksumError> for ChecksumResult {
    fn from(err: ChecksumError) -> Self {
        ChecksumResult::Error(err)
    }
}

impl From<Result<FileChecksum, ChecksumError>> for ChecksumResult {
    fn from(res: Result<FileChecksum, ChecksumError>) -> Self {
        match res {
            Ok(cs) => ChecksumResult::Checksum(cs),
            Err(err) => ChecksumResult::Error(err),
        }
    }
}

/// A discovered path paired with the constructor of the digest to run over it.
/// Moved into exactly one pool executor.
#[derive(Clone)]
pub struct WorkItem {
    pub path: PathBuf,
    pub factory: HasherFactory,
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Element of a per-source stream before it reaches the fan-in
#[derive(Debug, Clone)]
pub enum SourceMessage {
    Result(ChecksumResult),
    /// Something a producer emitted that is not a checksum result (a panicking adapter)
    Malformed { path: PathBuf, detail: String },
}

impl From<ChecksumResult> for SourceMessage {
    fn from(result: ChecksumResult) -> Self {
        SourceMessage::Result(result)
    }
}

impl From<ChecksumError> for SourceMessage {
    fn from(err: ChecksumError) -> Self {
        SourceMessage::Result(ChecksumResult::Error(err))
    }
}
