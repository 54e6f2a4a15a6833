// Checksum engine
// Entry points that turn roots into result streams

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error, warn};

use super::computer::HashComputer;
use super::config::EngineConfig;
use super::error::{ChecksumError, ErrorKind};
use super::fanin::{merge, ResultStream};
use super::hash::{HashRegistry, HasherFactory};
use super::pool::{process_item, CancelToken, WorkerPool};
use super::types::{SourceMessage, WorkItem};
use super::walk::TreeWalker;

/// Engine computing checksums over files and trees.
///
/// Each call returns immediately with a stream; the work runs on background
/// threads and the stream closes once every result has been delivered.
pub struct ChecksumEngine {
    registry: Arc<HashRegistry>,
    config: EngineConfig,
    cancel: CancelToken,
}

impl ChecksumEngine {
    /// Create an engine over the given algorithm table with default settings
    pub fn new(registry: HashRegistry) -> Self {
        Self::with_registry(Arc::new(registry))
    }

    pub fn with_registry(registry: Arc<HashRegistry>) -> Self {
        Self {
            registry,
            config: EngineConfig::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Replace every tunable at once
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the executor count of each worker pool
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers.max(1);
        self
    }

    /// Set the chunk size fed to the digest adapters
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.config.buffer_size = buffer_size.max(1);
        self
    }

    /// Share an existing cancellation token
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn registry(&self) -> &HashRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token that stops every walk started by this engine
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Checksum one file. The stream yields exactly one result.
    pub fn checksum_file(&self, path: impl AsRef<Path>, algorithm: &str) -> ResultStream {
        merge(vec![self.file_source(path.as_ref(), algorithm)], self.config.result_capacity)
    }

    /// Checksum a file or every file beneath a directory
    pub fn checksum_tree(&self, root: impl AsRef<Path>, algorithm: &str) -> ResultStream {
        merge(vec![self.tree_source(root.as_ref(), algorithm)], self.config.result_capacity)
    }

    /// Checksum several independent roots, each with its own walker and pool,
    /// merged into one stream in arrival order
    pub fn checksum_many<P: AsRef<Path>>(&self, roots: &[P], algorithm: &str) -> ResultStream {
        let sources = roots
            .iter()
            .map(|root| self.tree_source(root.as_ref(), algorithm))
            .collect();
        merge(sources, self.config.result_capacity)
    }

    /// Checksum an explicit list of paths through a single pool.
    /// Every path is processed as a file; nothing is walked.
    pub fn checksum_list(&self, paths: Vec<PathBuf>, algorithm: &str) -> ResultStream {
        let (results, source) = self.source_channel();
        let Some(factory) = self.resolve(algorithm, &paths, &results) else {
            return merge(vec![source], self.config.result_capacity);
        };

        let config = self.config.clone();
        let cancel = self.cancel.clone();
        let listed = paths.clone();
        let kind = ErrorKind::WalkFailure;
        self.spawn_source("checksum-list", &listed, kind, results, move |results| {
            let pool = match WorkerPool::spawn(&config, results.clone(), cancel.clone()) {
                Ok(pool) => pool,
                Err(e) => {
                    error!(error = %e, "could not start worker pool");
                    let detail = e.to_string();
                    for path in paths {
                        let err = ChecksumError::new(path, kind).with_detail(detail.clone());
                        if results.send(err.into()).is_err() {
                            break;
                        }
                    }
                    return;
                }
            };
            for path in paths {
                if cancel.is_cancelled() {
                    break;
                }
                let item = WorkItem {
                    path,
                    factory: Arc::clone(&factory),
                };
                if pool.dispatch(item).is_err() {
                    break;
                }
            }
            pool.finish();
        });
        merge(vec![source], self.config.result_capacity)
    }

    fn file_source(&self, path: &Path, algorithm: &str) -> Receiver<SourceMessage> {
        let (results, source) = self.source_channel();
        let Some(factory) = self.resolve(algorithm, &[path.to_path_buf()], &results) else {
            return source;
        };

        let path = path.to_path_buf();
        let computer = HashComputer::with_buffer_size(self.config.buffer_size);
        let affected = [path.clone()];
        let kind = ErrorKind::WalkFailure;
        self.spawn_source("checksum-file", &affected, kind, results, move |results| {
            let _ = results.send(process_item(&computer, &WorkItem { path, factory }));
        });
        source
    }

    fn tree_source(&self, root: &Path, algorithm: &str) -> Receiver<SourceMessage> {
        let (results, source) = self.source_channel();
        let Some(factory) = self.resolve(algorithm, &[root.to_path_buf()], &results) else {
            return source;
        };

        let root = root.to_path_buf();
        let walker = TreeWalker::new(self.config.clone(), self.cancel.clone());
        let affected = [root.clone()];
        let kind = ErrorKind::WalkFailure;
        self.spawn_source("checksum-walker", &affected, kind, results, move |results| {
            walker.run(&root, &factory, &results);
        });
        source
    }

    fn source_channel(&self) -> (Sender<SourceMessage>, Receiver<SourceMessage>) {
        bounded(self.config.result_capacity.max(1))
    }

    /// Look the algorithm up once per source. When it is missing, every affected
    /// path gets an `UnsupportedAlgorithm` result instead of any work starting.
    fn resolve(
        &self,
        algorithm: &str,
        paths: &[PathBuf],
        results: &Sender<SourceMessage>,
    ) -> Option<HasherFactory> {
        if let Some(factory) = self.registry.factory(algorithm) {
            return Some(factory);
        }

        debug!(algorithm, "algorithm not in registry");
        let owned = paths.to_vec();
        let algorithm = algorithm.to_string();
        let kind = ErrorKind::UnsupportedAlgorithm;
        self.spawn_source("checksum-unsupported", paths, kind, results.clone(), move |results| {
            for path in owned {
                let err = ChecksumError::new(path, kind).with_detail(format!("no hash named `{}`", algorithm));
                if results.send(err.into()).is_err() {
                    break;
                }
            }
        });
        None
    }

    /// Run `body` on its own thread. If the thread cannot start, every path in
    /// `affected` gets a `kind` error instead so the source still reports them.
    fn spawn_source<F>(
        &self,
        name: &str,
        affected: &[PathBuf],
        kind: ErrorKind,
        results: Sender<SourceMessage>,
        body: F,
    ) where
        F: FnOnce(Sender<SourceMessage>) + Send + 'static,
    {
        let fallback = results.clone();
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(results));
        if let Err(e) = spawned {
            error!(thread = name, error = %e, "could not start source thread");
            report_unstarted(&fallback, affected, kind, &e);
        }
    }
}

/// Fill the source channel with one error per path without blocking the caller.
/// Returns how many were delivered.
fn report_unstarted(
    results: &Sender<SourceMessage>,
    paths: &[PathBuf],
    kind: ErrorKind,
    cause: &io::Error,
) -> usize {
    let detail = format!("could not start worker thread: {}", cause);
    let mut delivered = 0;
    for path in paths {
        let err = ChecksumError::new(path.clone(), kind).with_detail(detail.clone());
        match results.try_send(err.into()) {
            Ok(()) => delivered += 1,
            Err(e) => {
                // Nobody is reading yet, so a full channel cannot drain
                warn!(dropped = paths.len() - delivered, error = %e, "result channel full, dropping errors");
                break;
            }
        }
    }
    delivered
}

impl Default for ChecksumEngine {
    fn default() -> Self {
        Self::new(HashRegistry::standard())
    }
}
