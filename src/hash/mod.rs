// Checksum core library
// Concurrent file/tree hashing with per-path failure isolation

pub mod computer;
pub mod config;
pub mod engine;
pub mod error;
pub mod fanin;
pub mod hash;
pub mod pool;
pub mod report;
pub mod types;
pub mod verify;
pub mod walk;

// Re-export commonly used types for convenience
pub use computer::HashComputer;
pub use config::{Config, ConfigError, EngineConfig, LogConfig, LogFormat};
pub use engine::ChecksumEngine;
pub use error::{ChecksumError, ErrorKind};
pub use fanin::{merge, ResultStream};
pub use hash::{AlgorithmInfo, HashRegistry, Hasher, HasherFactory};
pub use pool::{CancelToken, PoolStats, WorkerPool};
pub use report::{collect, collect_with, Collected, Report, ReportError};
pub use types::{ChecksumResult, FileChecksum, SourceMessage, WorkItem};
pub use verify::{Mismatch, VerifyEngine, VerifyReport};
pub use walk::{TreeWalker, WalkStats};
