//! Persisted session state.
//!
//! A [`SessionState`] record exists exactly while a tracking session is
//! active: created by `start_tracking`, updated on every flush decision,
//! cleared together by `stop_tracking`. The `last_flush_time` and
//! `last_delivered_location` fields form the baseline the batching policy
//! compares new samples against.

use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::position::Coordinates;
use crate::store::StoreError;

/// The persisted record for an active tracking session.
///
/// Read-modify-write on this record is deliberately unlocked across
/// operations: concurrent flush decisions may interleave their updates.
/// The baseline only throttles flush frequency, so weak consistency is
/// accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Identifier positions are recorded under.
    pub device_id: String,

    /// When the last flush decision stamped the baseline.
    pub last_flush_time: Option<DateTime<Utc>>,

    /// The most recently observed sample location.
    pub last_delivered_location: Option<Coordinates>,
}

impl SessionState {
    /// Fresh state for a newly started session.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            last_flush_time: None,
            last_delivered_location: None,
        }
    }
}

/// Keyed persistence for the session record.
pub trait SessionStateStore: Send + Sync {
    /// Read the current session state, if a session is active.
    fn get(&self) -> Result<Option<SessionState>, StoreError>;

    /// Write (create or replace) the session state.
    fn put(&self, state: SessionState) -> Result<(), StoreError>;

    /// Remove the session state.
    fn clear(&self) -> Result<(), StoreError>;
}

/// In-memory store for tests and non-durable embeddings.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<Option<SessionState>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStateStore for MemorySessionStore {
    fn get(&self) -> Result<Option<SessionState>, StoreError> {
        Ok(self.state.lock().unwrap().clone())
    }

    fn put(&self, state: SessionState) -> Result<(), StoreError> {
        *self.state.lock().unwrap() = Some(state);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.state.lock().unwrap() = None;
        Ok(())
    }
}

/// File-backed store holding one JSON session record.
///
/// A missing file reads as "no active session". Writes rename a temp file
/// into place so a crash mid-write cannot corrupt the record.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl SessionStateStore for FileSessionStore {
    fn get(&self) -> Result<Option<SessionState>, StoreError> {
        let _guard = self.lock.lock().unwrap();
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, state: SessionState) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap();
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec(&state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
