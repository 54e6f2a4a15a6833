// Verification module
// Re-hashes files and compares them against a stored report

use std::collections::HashSet;
use std::path::PathBuf;

use super::engine::ChecksumEngine;
use super::error::{ChecksumError, ErrorKind};
use super::report::Report;
use super::types::ChecksumResult;

/// Represents a hash mismatch between expected and actual values
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Mismatch {
    pub path: PathBuf,
    pub expected: String,
    pub actual: String,
}

/// Report of verification results
#[derive(Debug, Default)]
pub struct VerifyReport {
    pub matches: usize,
    pub mismatches: Vec<Mismatch>,
    /// In the report but gone from disk
    pub missing_files: Vec<PathBuf>,
    /// Found on disk under a checked source but absent from the report
    pub new_files: Vec<PathBuf>,
    /// Any other failure while re-hashing
    pub errors: Vec<ChecksumError>,
}

impl VerifyReport {
    pub fn has_issues(&self) -> bool {
        !self.mismatches.is_empty()
            || !self.missing_files.is_empty()
            || !self.new_files.is_empty()
            || !self.errors.is_empty()
    }

    /// Print a human readable summary to stdout
    pub fn display(&self) {
        println!("Verification Summary:");
        println!("  Matches:        {}", self.matches);
        println!("  Mismatches:     {}", self.mismatches.len());
        println!("  Missing files:  {}", self.missing_files.len());
        println!("  New files:      {}", self.new_files.len());
        println!("  Errors:         {}", self.errors.len());

        if !self.has_issues() {
            println!("\nAll files match the report.");
            return;
        }

        if !self.mismatches.is_empty() {
            println!("\n--- Files with Changed Hashes ({}) ---", self.mismatches.len());
            for mismatch in &self.mismatches {
                println!("  File: {}", mismatch.path.display());
                println!("    Expected: {}", mismatch.expected);
                println!("    Actual:   {}", mismatch.actual);
            }
        }

        if !self.missing_files.is_empty() {
            println!("\n--- Deleted Files ({}) ---", self.missing_files.len());
            for path in &self.missing_files {
                println!("  - {}", path.display());
            }
        }

        if !self.new_files.is_empty() {
            println!("\n--- New Files ({}) ---", self.new_files.len());
            for path in &self.new_files {
                println!("  + {}", path.display());
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- Errors ({}) ---", self.errors.len());
            for error in &self.errors {
                println!("  ! {}", error);
            }
        }
    }
}

/// Engine for verifying file integrity against a checksum report
pub struct VerifyEngine<'a> {
    engine: &'a ChecksumEngine,
}

impl<'a> VerifyEngine<'a> {
    pub fn new(engine: &'a ChecksumEngine) -> Self {
        Self { engine }
    }

    /// Compare current digests with `report`.
    ///
    /// With no `sources`, exactly the files listed in the report are re-hashed.
    /// Otherwise the sources are walked and anything found there that the report
    /// does not list counts as new.
    pub fn verify(&self, report: &Report, sources: &[PathBuf]) -> VerifyReport {
        let stream = if sources.is_empty() {
            self.engine
                .checksum_list(report.files.keys().cloned().collect(), &report.algorithm)
        } else {
            self.engine.checksum_many(sources, &report.algorithm)
        };

        let mut outcome = VerifyReport::default();
        let mut seen = HashSet::new();

        for result in stream {
            seen.insert(result.path().to_path_buf());
            match result {
                ChecksumResult::Checksum(checksum) => match report.files.get(&checksum.path) {
                    Some(expected) => {
                        let actual = checksum.hex();
                        if *expected == actual {
                            outcome.matches += 1;
                        } else {
                            outcome.mismatches.push(Mismatch {
                                path: checksum.path,
                                expected: expected.clone(),
                                actual,
                            });
                        }
                    }
                    None => outcome.new_files.push(checksum.path),
                },
                ChecksumResult::Error(error) => {
                    let listed = report.files.contains_key(&error.path);
                    if listed && error.kind == ErrorKind::CannotBeRead {
                        outcome.missing_files.push(error.path);
                    } else {
                        outcome.errors.push(error);
                    }
                }
            }
        }

        if !sources.is_empty() {
            let unseen = report
                .files
                .keys()
                .filter(|path| !seen.contains(*path))
                .filter(|path| sources.iter().any(|source| path.starts_with(source)));
            outcome.missing_files.extend(unseen.cloned());
        }

        outcome.mismatches.sort_by(|a, b| a.path.cmp(&b.path));
        outcome.missing_files.sort();
        outcome.new_files.sort();
        outcome.errors.sort_by(|a, b| a.path.cmp(&b.path));
        outcome
    }
}
