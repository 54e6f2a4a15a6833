// Centralized error handling module
// Every per-path failure is a value that travels on the result stream

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Underlying cause attached to a [`ChecksumError`], shared so results stay cheap to clone
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Classification of a per-path failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    /// The requested digest algorithm is not in the registry
    #[error("hash algorithm is not available (run `checksum list` to see supported algorithms)")]
    UnsupportedAlgorithm,

    /// The file or folder could not be read for meta information
    #[error("file/folder could not be read")]
    CannotBeRead,

    /// A directory or special file was given where a regular file was required
    #[error("not a regular file (directories need the recursive tree walk)")]
    WrongFileType,

    /// The file exists but could not be opened for reading
    #[error("file could not be opened")]
    CannotOpen,

    /// Reading the file failed before end of input
    #[error("error while reading file")]
    ReadFailure,

    /// The digest accumulator rejected or short-wrote a chunk
    #[error("could not write the expected bytes to the hash function")]
    HashWriteFailure,

    /// A traversal step failed for this entry
    #[error("problem walking to this file/folder")]
    WalkFailure,

    /// A merged stream produced an element that is not a checksum result
    #[error("internal aggregation failure")]
    InternalAggregationFailure,
}

/// A failure tied to the path it happened on
#[derive(Debug, Clone)]
pub struct ChecksumError {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub cause: Option<Cause>,
}

impl ChecksumError {
    pub fn new(path: impl Into<PathBuf>, kind: ErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
            cause: None,
        }
    }

    /// Attach an underlying error for diagnostics
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Attach a plain message as the underlying cause
    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        self.with_cause(Detail(detail.into()))
    }

    pub(crate) fn from_io(path: &Path, kind: ErrorKind, err: io::Error) -> Self {
        Self::new(path, kind).with_cause(err)
    }

    /// Description without the path, as written to the `[Errors]` report section
    pub fn description(&self) -> String {
        match &self.cause {
            Some(cause) => format!("{}: {}", self.kind, cause),
            None => self.kind.to_string(),
        }
    }
}

impl fmt::Display for ChecksumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.description())
    }
}

impl StdError for ChecksumError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn StdError + 'static))
    }
}

impl PartialEq for ChecksumError {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.kind == other.kind
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Detail(String);
