//! Log sinks — where encoded blocks go.
//!
//! The broadcaster publishes each block exactly once through a `LogSink`.
//! Durability is entirely the sink's concern; the orderer keeps nothing
//! across restarts.
//!
//! File logs are a flat sequence of records:
//!   {log_dir}/{topic}.log = (u32 LE length | encoded block)*

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use bytes::Bytes;
use memmap2::Mmap;

/// Destination for encoded blocks.
///
/// `send` is a single best-effort publish. `close` releases resources, is
/// idempotent, and is safe on a sink that never finished opening.
pub trait LogSink: Send + Sync {
    fn send(&self, block: &[u8]) -> Result<(), SinkError>;

    fn close(&self) -> Result<(), SinkError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,
    #[error("log i/o on {0}: {1}")]
    Io(PathBuf, std::io::Error),
    #[error("record of {0} bytes does not fit a u32 length")]
    RecordTooLarge(usize),
    #[error("log {0} ends in a truncated record at offset {1}")]
    Truncated(PathBuf, usize),
}

const RECORD_PREFIX: usize = 4;

// ── File sink ─────────────────────────────────────────────────────────────────

/// Append-only log file for one topic.
pub struct FileLogSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
    sync_every_block: bool,
}

impl FileLogSink {
    /// Open (or create) `{dir}/{topic}.log` for appending. A restarted
    /// orderer appends a fresh chain, starting at genesis, after the old one.
    pub fn open(path: impl Into<PathBuf>, sync_every_block: bool) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SinkError::Io(parent.to_path_buf(), e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SinkError::Io(path.clone(), e))?;
        tracing::info!(path = %path.display(), "block log opened");
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
            sync_every_block,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogSink {
    fn send(&self, block: &[u8]) -> Result<(), SinkError> {
        let len = u32::try_from(block.len()).map_err(|_| SinkError::RecordTooLarge(block.len()))?;
        let mut guard = self.file.lock().map_err(|_| SinkError::Closed)?;
        let file = guard.as_mut().ok_or(SinkError::Closed)?;

        // One write per record so a crash leaves at most one torn tail.
        let mut record = Vec::with_capacity(RECORD_PREFIX + block.len());
        record.extend_from_slice(&len.to_le_bytes());
        record.extend_from_slice(block);
        file.write_all(&record)
            .map_err(|e| SinkError::Io(self.path.clone(), e))?;
        if self.sync_every_block {
            file.sync_data()
                .map_err(|e| SinkError::Io(self.path.clone(), e))?;
        }
        tracing::trace!(bytes = block.len(), "block appended to log");
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        let mut guard = self.file.lock().map_err(|_| SinkError::Closed)?;
        if let Some(file) = guard.take() {
            file.sync_all()
                .map_err(|e| SinkError::Io(self.path.clone(), e))?;
            tracing::info!(path = %self.path.display(), "block log closed");
        }
        Ok(())
    }
}

// ── Memory sink ───────────────────────────────────────────────────────────────

/// In-process sink. Records are kept until the sink is dropped.
#[derive(Default)]
pub struct MemoryLogSink {
    records: Mutex<Vec<Bytes>>,
    closed: Mutex<bool>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record sent so far, in send order.
    pub fn records(&self) -> Vec<Bytes> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.lock().map(|c| *c).unwrap_or(true)
    }
}

impl LogSink for MemoryLogSink {
    fn send(&self, block: &[u8]) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        let mut records = self.records.lock().map_err(|_| SinkError::Closed)?;
        records.push(Bytes::copy_from_slice(block));
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        if let Ok(mut closed) = self.closed.lock() {
            *closed = true;
        }
        Ok(())
    }
}

// ── Reading ───────────────────────────────────────────────────────────────────

/// Read every record from a file log.
///
/// The file is memory-mapped; records are copied out so the map can be
/// dropped before returning.
pub fn read_log(path: impl AsRef<Path>) -> Result<Vec<Bytes>, SinkError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| SinkError::Io(path.to_path_buf(), e))?;
    let len = file
        .metadata()
        .map_err(|e| SinkError::Io(path.to_path_buf(), e))?
        .len();
    if len == 0 {
        return Ok(Vec::new());
    }

    // Safety: file is opened read-only and we don't mutate the mmap
    let mmap = unsafe { Mmap::map(&file).map_err(|e| SinkError::Io(path.to_path_buf(), e))? };
    split_records(&mmap).map_err(|offset| SinkError::Truncated(path.to_path_buf(), offset))
}

/// Split a length-prefixed byte stream. Err carries the offset of the torn record.
fn split_records(buf: &[u8]) -> Result<Vec<Bytes>, usize> {
    let mut records = Vec::new();
    let mut offset = 0;
    while offset < buf.len() {
        let Some(prefix) = buf.get(offset..offset + RECORD_PREFIX) else {
            return Err(offset);
        };
        let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
        let start = offset + RECORD_PREFIX;
        let Some(record) = buf.get(start..start + len) else {
            return Err(offset);
        };
        records.push(Bytes::copy_from_slice(record));
        offset = start + len;
    }
    Ok(records)
}
