// Tree walker
// Discovers files under a root and feeds them to a worker pool; traversal
// failures become error results and never stop the walk

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::Sender;
use jwalk::WalkDir;
use tracing::{debug, warn};

use super::computer::HashComputer;
use super::config::EngineConfig;
use super::error::{ChecksumError, ErrorKind};
use super::hash::HasherFactory;
use super::pool::{process_item, CancelToken, PoolStats, WorkerPool};
use super::types::{SourceMessage, WorkItem};

/// Counts from one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub discovered: usize,
    pub failures: usize,
    pub pool: PoolStats,
}

/// Walks one root with its own worker pool
pub struct TreeWalker {
    config: EngineConfig,
    cancel: CancelToken,
}

impl TreeWalker {
    pub fn new(config: EngineConfig, cancel: CancelToken) -> Self {
        Self { config, cancel }
    }

    /// Checksum everything under `root`, sending one message per discovered file
    /// and one per traversal failure. Returns when the pool has drained.
    pub fn run(&self, root: &Path, factory: &HasherFactory, results: &Sender<SourceMessage>) -> WalkStats {
        let mut stats = WalkStats::default();

        let metadata = match fs::metadata(root) {
            Ok(metadata) => metadata,
            Err(e) => {
                stats.failures += 1;
                let _ = results.send(ChecksumError::from_io(root, ErrorKind::CannotBeRead, e).into());
                return stats;
            }
        };

        if !metadata.is_dir() {
            // A single file needs no pool
            stats.discovered = 1;
            let item = WorkItem {
                path: root.to_path_buf(),
                factory: Arc::clone(factory),
            };
            let computer = HashComputer::with_buffer_size(self.config.buffer_size);
            let _ = results.send(process_item(&computer, &item));
            return stats;
        }

        let pool = match WorkerPool::spawn(&self.config, results.clone(), self.cancel.clone()) {
            Ok(pool) => pool,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "could not start worker pool");
                stats.failures += 1;
                let _ = results.send(ChecksumError::from_io(root, ErrorKind::WalkFailure, e).into());
                return stats;
            }
        };

        self.walk_directory(root, factory, &pool, results, &mut stats);
        stats.pool = pool.finish();

        debug!(
            root = %root.display(),
            discovered = stats.discovered,
            failures = stats.failures,
            "walk complete"
        );
        stats
    }

    fn walk_directory(
        &self,
        root: &Path,
        factory: &HasherFactory,
        pool: &WorkerPool,
        results: &Sender<SourceMessage>,
        stats: &mut WalkStats,
    ) {
        // Symlinks are not followed so link cycles cannot trap the walk; a link to a
        // file is still hashed through the file processor, which resolves it.
        let walker = WalkDir::new(root)
            .parallelism(jwalk::Parallelism::RayonNewPool(0))
            .skip_hidden(false)
            .follow_links(false);

        for entry_result in walker {
            if self.cancel.is_cancelled() {
                debug!(root = %root.display(), "walk cancelled");
                return;
            }

            let failure = match entry_result {
                Ok(mut entry) => {
                    // jwalk parks a failed read_dir on the directory's own entry
                    if let Some(e) = entry.read_children_error.take() {
                        ChecksumError::new(entry.path(), ErrorKind::WalkFailure).with_cause(e)
                    } else if entry.depth == 0 || entry.file_type().is_dir() {
                        // The root was already classified by its metadata, even when it is a link
                        continue;
                    } else {
                        match dispatch_entry(entry.path(), factory, pool) {
                            Dispatch::Queued => {
                                stats.discovered += 1;
                                continue;
                            }
                            Dispatch::PoolGone => {
                                debug!(root = %root.display(), "pool gone, stopping walk");
                                return;
                            }
                            Dispatch::Failed(failure) => failure,
                        }
                    }
                }
                Err(e) => {
                    let path = e.path().map(PathBuf::from).unwrap_or_else(|| root.to_path_buf());
                    ChecksumError::new(path, ErrorKind::WalkFailure).with_cause(e)
                }
            };

            warn!(path = %failure.path.display(), "{}", failure.description());
            stats.failures += 1;
            if results.send(failure.into()).is_err() {
                return;
            }
        }
    }
}

fn dispatch_entry(path: PathBuf, factory: &HasherFactory, pool: &WorkerPool) -> Dispatch {
    if let Err(e) = fs::metadata(&path) {
        return Dispatch::Failed(ChecksumError::from_io(&path, ErrorKind::WalkFailure, e));
    }
    let item = WorkItem {
        path,
        factory: Arc::clone(factory),
    };
    // Blocks while the pool is saturated
    match pool.dispatch(item) {
        Ok(()) => Dispatch::Queued,
        Err(_) => Dispatch::PoolGone,
    }
}

enum Dispatch {
    Queued,
    PoolGone,
    Failed(ChecksumError),
}
