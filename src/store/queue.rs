//! Durable local queue of pending positions.
//!
//! Append-only between drains: the uploader reads everything and clears
//! the queue in the same logical step. The compound drain is not atomic
//! at this trait level - two racing flushes may observe overlapping
//! contents. Individual calls are serialized by the implementations.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::position::Position;
use crate::store::StoreError;

/// Append-only store of positions awaiting delivery.
///
/// `get_all` and `remove_all` are only ever used together as a drain;
/// insertion order is preserved but is not a delivery guarantee.
pub trait LocationQueue: Send + Sync {
    /// Append positions to the queue.
    fn insert(&self, positions: Vec<Position>) -> Result<(), StoreError>;

    /// Read every queued position, oldest first.
    fn get_all(&self) -> Result<Vec<Position>, StoreError>;

    /// Clear the queue.
    fn remove_all(&self) -> Result<(), StoreError>;
}

/// In-memory queue for tests and non-durable embeddings.
#[derive(Debug, Default)]
pub struct MemoryLocationQueue {
    entries: Mutex<Vec<Position>>,
}

impl MemoryLocationQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued positions.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocationQueue for MemoryLocationQueue {
    fn insert(&self, positions: Vec<Position>) -> Result<(), StoreError> {
        self.entries.lock().unwrap().extend(positions);
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Position>, StoreError> {
        Ok(self.entries.lock().unwrap().clone())
    }

    fn remove_all(&self) -> Result<(), StoreError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

/// File-backed queue holding one JSON array of positions.
///
/// Writes go to a sibling temp file first and are renamed into place, so
/// a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileLocationQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLocationQueue {
    /// Create a queue backed by the given file path.
    ///
    /// The file is created lazily on first insert; a missing file reads
    /// as an empty queue.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read_entries(&self) -> Result<Vec<Position>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_entries(&self, entries: &[Position]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocationQueue for FileLocationQueue {
    fn insert(&self, positions: Vec<Position>) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap();
        let mut entries = self.read_entries()?;
        entries.extend(positions);
        self.write_entries(&entries)?;
        tracing::debug!(
            path = %self.path.display(),
            queued = entries.len(),
            "Positions appended to local queue"
        );
        Ok(())
    }

    fn get_all(&self) -> Result<Vec<Position>, StoreError> {
        let _guard = self.lock.lock().unwrap();
        self.read_entries()
    }

    fn remove_all(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
