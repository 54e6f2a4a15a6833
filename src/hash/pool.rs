// Worker pool
// Fixed set of executor threads pulling work items from one bounded intake

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, trace, warn};

use super::computer::HashComputer;
use super::config::EngineConfig;
use super::types::{ChecksumResult, SourceMessage, WorkItem};

/// Cooperative stop signal shared by walkers and pools.
///
/// Once set, walkers stop producing and executors drain the intake without
/// hashing; a file already being read is finished.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts reported once a pool has been drained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub dispatched: usize,
    pub completed: usize,
    /// Items drained without hashing after cancellation
    pub skipped: usize,
}

#[derive(Debug, Default)]
struct Counters {
    in_flight: AtomicUsize,
    dispatched: AtomicUsize,
    completed: AtomicUsize,
    skipped: AtomicUsize,
    closed: AtomicBool,
    /// Set once the result stream is gone
    abandoned: AtomicBool,
}

impl Counters {
    fn begin(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.dispatched.fetch_add(1, Ordering::SeqCst);
    }

    fn retract(&self) {
        self.dispatched.fetch_sub(1, Ordering::SeqCst);
        self.end();
    }

    fn end(&self) {
        let decremented = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if decremented.is_err() {
            warn!("in-flight counter would go below zero; ignoring extra completion");
        }
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            dispatched: self.dispatched.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
        }
    }
}

/// Bounded set of interchangeable executors.
///
/// At most `workers` files are open at once no matter how many items the walker
/// produces; `dispatch` blocks while every executor is busy and the intake is full.
pub struct WorkerPool {
    intake: Option<Sender<WorkItem>>,
    handles: Vec<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl WorkerPool {
    /// Start the executors. Results are sent on `results`, one per dispatched item.
    pub fn spawn(
        config: &EngineConfig,
        results: Sender<SourceMessage>,
        cancel: CancelToken,
    ) -> io::Result<Self> {
        let workers = config.workers.max(1);
        let (intake, queue) = bounded::<WorkItem>(config.intake_capacity());
        let counters = Arc::new(Counters::default());
        let computer = HashComputer::with_buffer_size(config.buffer_size);

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let queue = queue.clone();
            let results = results.clone();
            let counters = Arc::clone(&counters);
            let cancel = cancel.clone();

            let spawned = thread::Builder::new()
                .name(format!("checksum-worker-{}", id))
                .spawn(move || run_worker(queue, results, computer, counters, cancel));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) if handles.is_empty() => return Err(e),
                Err(e) => {
                    warn!(requested = workers, started = handles.len(), error = %e, "could not start every worker");
                    break;
                }
            }
        }

        debug!(workers = handles.len(), capacity = config.intake_capacity(), "worker pool started");

        Ok(Self {
            intake: Some(intake),
            handles,
            counters,
        })
    }

    /// Number of executors actually running
    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Hand an item to the pool, blocking while the intake is full.
    /// Returns the item back if every executor has gone away or nobody is
    /// reading results any more.
    pub fn dispatch(&self, item: WorkItem) -> Result<(), WorkItem> {
        let Some(intake) = &self.intake else {
            return Err(item);
        };
        if self.counters.abandoned.load(Ordering::SeqCst) {
            return Err(item);
        }
        trace!(path = %item.path.display(), "dispatch");
        self.counters.begin();
        intake.send(item).map_err(|e| {
            self.counters.retract();
            e.into_inner()
        })
    }

    /// Items dispatched whose result has not been emitted yet
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    /// True once the intake is closed and every dispatched item has completed
    pub fn is_idle(&self) -> bool {
        self.counters.closed.load(Ordering::SeqCst) && self.in_flight() == 0
    }

    /// Close the intake, wait for every executor to drain it and exit
    pub fn finish(mut self) -> PoolStats {
        self.shutdown();
        let stats = self.counters.snapshot();
        debug!(
            dispatched = stats.dispatched,
            completed = stats.completed,
            skipped = stats.skipped,
            idle = self.is_idle(),
            "worker pool drained"
        );
        stats
    }

    fn shutdown(&mut self) {
        // Dropping the only sender lets the executors' intake iterators end
        self.intake.take();
        self.counters.closed.store(true, Ordering::SeqCst);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked outside of file processing");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    queue: Receiver<WorkItem>,
    results: Sender<SourceMessage>,
    computer: HashComputer,
    counters: Arc<Counters>,
    cancel: CancelToken,
) {
    // Keeps draining until the intake closes so every dispatched item is accounted for
    for item in queue.iter() {
        if cancel.is_cancelled() || counters.abandoned.load(Ordering::SeqCst) {
            counters.skipped.fetch_add(1, Ordering::SeqCst);
            counters.end();
            continue;
        }

        let message = process_item(&computer, &item);
        let delivered = results.send(message).is_ok();
        counters.completed.fetch_add(1, Ordering::SeqCst);
        counters.end();

        if !delivered && !counters.abandoned.swap(true, Ordering::SeqCst) {
            debug!("result stream closed, draining intake");
        }
    }
}

/// Run the file processor for one item, converting an adapter panic into a
/// malformed message instead of losing the result.
pub(crate) fn process_item(computer: &HashComputer, item: &WorkItem) -> SourceMessage {
    match panic::catch_unwind(AssertUnwindSafe(|| computer.compute(&item.path, &item.factory))) {
        Ok(result) => SourceMessage::Result(ChecksumResult::from(result)),
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            warn!(path = %item.path.display(), %detail, "digest adapter panicked");
            SourceMessage::Malformed {
                path: item.path.clone(),
                detail,
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked with a non-string payload".to_string()
    }
}
