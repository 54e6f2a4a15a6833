// Result fan-in
// Merges independent per-source streams into one arrival-ordered stream

use std::thread;

use crossbeam_channel::{bounded, Receiver, Select, Sender};
use tracing::{debug, error, warn};

use super::error::{ChecksumError, ErrorKind};
use super::types::{ChecksumResult, SourceMessage};

/// Stream of results handed to consumers; closed once every producer is done
pub type ResultStream = Receiver<ChecksumResult>;

/// Merge `sources` into a single stream.
///
/// One aggregator thread blocks on whichever source is ready first, forwards each
/// element exactly once, and closes the merged stream after the last source has
/// disconnected. Dropping the returned stream stops the aggregator, which in turn
/// drops the sources and unblocks their producers.
pub fn merge(sources: Vec<Receiver<SourceMessage>>, capacity: usize) -> ResultStream {
    let (sink, stream) = bounded(capacity.max(1));
    if sources.is_empty() {
        return stream;
    }

    let spawned = thread::Builder::new()
        .name("checksum-fanin".to_string())
        .spawn(move || aggregate(sources, sink));
    if let Err(e) = spawned {
        // The sink went down with the closure, so consumers see an empty stream
        error!(error = %e, "could not start result aggregator");
    }
    stream
}

fn aggregate(sources: Vec<Receiver<SourceMessage>>, sink: Sender<ChecksumResult>) {
    let mut select = Select::new();
    for source in &sources {
        select.recv(source);
    }

    let mut remaining = sources.len();
    let mut forwarded = 0usize;
    while remaining > 0 {
        let operation = select.select();
        let index = operation.index();
        match operation.recv(&sources[index]) {
            Ok(message) => {
                if sink.send(interpret(message)).is_err() {
                    debug!(forwarded, "merged stream dropped by consumer");
                    return;
                }
                forwarded += 1;
            }
            Err(_) => {
                // Disconnected sources stay ready forever, so stop selecting on them
                select.remove(index);
                remaining -= 1;
            }
        }
    }
    debug!(forwarded, sources = sources.len(), "all sources closed");
}

fn interpret(message: SourceMessage) -> ChecksumResult {
    match message {
        SourceMessage::Result(result) => result,
        SourceMessage::Malformed { path, detail } => {
            warn!(path = %path.display(), %detail, "unrecognised element on result stream");
            ChecksumError::new(path, ErrorKind::InternalAggregationFailure)
                .with_detail(detail)
                .into()
        }
    }
}
