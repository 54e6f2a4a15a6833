// Report format handler module
// Reads and writes the sectioned key/value checksum report

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::error::ChecksumError;
use super::fanin::ResultStream;
use super::types::{ChecksumResult, FileChecksum};

const CONFIG_SECTION: &str = "Config";
const FILES_SECTION: &str = "Files";
const ERRORS_SECTION: &str = "Errors";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("could not open report {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error reading report at line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("malformed report at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("report has no `hash=` entry in its [Config] section")]
    MissingAlgorithm,
}

/// In-memory form of a checksum report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub algorithm: String,
    /// path -> lowercase hex digest
    pub files: BTreeMap<PathBuf, String>,
    /// path -> error description
    pub errors: BTreeMap<PathBuf, String>,
}

impl Report {
    pub fn new(algorithm: &str) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            ..Self::default()
        }
    }

    pub fn add_checksum(&mut self, checksum: &FileChecksum) {
        self.files.insert(checksum.path.clone(), checksum.hex());
    }

    pub fn add_error(&mut self, error: &ChecksumError) {
        self.errors.insert(error.path.clone(), error.description());
    }

    /// Write the report; entries come out sorted by path
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "[{}]", CONFIG_SECTION)?;
        writeln!(writer, "hash={}", self.algorithm)?;
        writeln!(writer, "[{}]", FILES_SECTION)?;
        for (path, digest) in &self.files {
            writeln!(writer, "{}={}", path.display(), digest)?;
        }
        if !self.errors.is_empty() {
            writeln!(writer, "[{}]", ERRORS_SECTION)?;
            for (path, description) in &self.errors {
                writeln!(writer, "{}={}", escape_key(&path.display().to_string()), single_line(description))?;
            }
        }
        writer.flush()
    }

    /// Read a report from disk
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        let file = File::open(path).map_err(|source| ReportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(BufReader::new(file))
    }

    /// Parse the sectioned layout. Blank lines and `;`/`#` comments are skipped.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, ReportError> {
        let mut report = Report::default();
        let mut algorithm = None;
        let mut section: Option<String> = None;

        for (index, line_result) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line_result.map_err(|source| ReportError::Read {
                line: line_number,
                source,
            })?;
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
                continue;
            }

            if let Some(name) = trimmed.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
                section = Some(name.trim().to_string());
                continue;
            }

            let parse_error = |reason: &str| ReportError::Parse {
                line: line_number,
                reason: reason.to_string(),
            };

            match section.as_deref() {
                Some(CONFIG_SECTION) => {
                    let (key, value) = trimmed.split_once('=').ok_or_else(|| parse_error("expected key=value"))?;
                    if key.trim() == "hash" {
                        algorithm = Some(value.trim().to_string());
                    }
                }
                Some(FILES_SECTION) => {
                    // Digests are hex, so the last '=' always separates path from digest
                    let (path, digest) = trimmed.rsplit_once('=').ok_or_else(|| parse_error("expected path=digest"))?;
                    let digest = digest.trim();
                    if path.is_empty() || digest.is_empty() || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                        return Err(parse_error("expected path=hex digest"));
                    }
                    report.files.insert(PathBuf::from(path), digest.to_ascii_lowercase());
                }
                Some(ERRORS_SECTION) => {
                    // Error paths are escaped since descriptions may contain '=' too
                    let (path, description) =
                        split_escaped_key(trimmed).ok_or_else(|| parse_error("expected path=description"))?;
                    report.errors.insert(PathBuf::from(path), description.to_string());
                }
                Some(other) => return Err(parse_error(&format!("unknown section [{}]", other))),
                None => return Err(parse_error("entry before any section header")),
            }
        }

        report.algorithm = algorithm.ok_or(ReportError::MissingAlgorithm)?;
        Ok(report)
    }
}

/// Everything drained from one result stream
#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub checksums: Vec<FileChecksum>,
    pub errors: Vec<ChecksumError>,
}

impl Collected {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_report(self, algorithm: &str) -> Report {
        let mut report = Report::new(algorithm);
        for checksum in &self.checksums {
            report.add_checksum(checksum);
        }
        for error in &self.errors {
            report.add_error(error);
        }
        report
    }
}

/// Drain a stream until it closes
pub fn collect(stream: ResultStream) -> Collected {
    collect_with(stream, |_| {})
}

/// Drain a stream, calling `observe` on every result as it arrives
pub fn collect_with<F>(stream: ResultStream, mut observe: F) -> Collected
where
    F: FnMut(&ChecksumResult),
{
    let mut collected = Collected::default();
    for result in stream {
        observe(&result);
        match result {
            ChecksumResult::Checksum(checksum) => collected.checksums.push(checksum),
            ChecksumResult::Error(error) => collected.errors.push(error),
        }
    }
    collected
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// `\` and `=` in error paths are backslash-escaped
fn escape_key(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len());
    for c in key.chars() {
        if c == '\\' || c == '=' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Split at the first unescaped `=`, unescaping the key
fn split_escaped_key(line: &str) -> Option<(String, &str)> {
    let mut key = String::new();
    let mut chars = line.char_indices();
    while let Some((index, c)) = chars.next() {
        match c {
            '\\' => key.push(chars.next().map_or('\\', |(_, next)| next)),
            '=' => return Some((key, &line[index + 1..])),
            _ => key.push(c),
        }
    }
    None
}
