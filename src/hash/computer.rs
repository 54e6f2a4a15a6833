// File processor
// Streams one file through a digest adapter and turns every failure into a typed error

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::error::{ChecksumError, ErrorKind};
use super::hash::{Hasher, HasherFactory};
use super::types::FileChecksum;

/// Default chunk size fed to the digest adapter
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Hash computer with streaming I/O
#[derive(Debug, Clone, Copy)]
pub struct HashComputer {
    buffer_size: usize,
}

impl HashComputer {
    /// Create a new HashComputer with the default 4 KiB chunk size
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new HashComputer with custom buffer size
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Compute the digest of a single regular file.
    ///
    /// The path is statted first so directories and special files (FIFOs, sockets,
    /// devices) are rejected without ever being opened; opening a FIFO would block.
    pub fn compute(&self, path: &Path, factory: &HasherFactory) -> Result<FileChecksum, ChecksumError> {
        let metadata = fs::metadata(path)
            .map_err(|e| ChecksumError::from_io(path, ErrorKind::CannotBeRead, e))?;
        if !metadata.is_file() {
            return Err(ChecksumError::new(path, ErrorKind::WrongFileType));
        }

        let file = File::open(path).map_err(|e| ChecksumError::from_io(path, ErrorKind::CannotOpen, e))?;

        let mut hasher = factory();
        self.stream(&mut hasher, file, path)?;

        Ok(FileChecksum {
            path: path.to_path_buf(),
            digest: hasher.finalize(),
        })
    }

    /// Feed the whole reader through the hasher chunk by chunk
    fn stream(&self, hasher: &mut Box<dyn Hasher>, file: File, path: &Path) -> Result<(), ChecksumError> {
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ChecksumError::from_io(path, ErrorKind::ReadFailure, e)),
            };

            match hasher.update(&buffer[..bytes_read]) {
                Ok(written) if written == bytes_read => {}
                Ok(written) => {
                    return Err(ChecksumError::new(path, ErrorKind::HashWriteFailure)
                        .with_detail(format!("read {} bytes but hash accepted {}", bytes_read, written)));
                }
                Err(e) => return Err(ChecksumError::from_io(path, ErrorKind::HashWriteFailure, e)),
            }
        }
    }
}

impl Default for HashComputer {
    fn default() -> Self {
        Self::new()
    }
}
