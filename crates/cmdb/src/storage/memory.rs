//! In-memory storage backend for testing.
//!
//! **Note**: This backend is for testing only. Nothing survives the process.

use super::StorageBackend;
use crate::error::Result;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Snapshot slot shared between clones.
///
/// Cloning the backend before handing it to a store lets a test inspect or
/// reuse what the store saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<Option<Vec<u8>>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryBackend {
    /// Create a backend with no snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that already holds `bytes`.
    pub fn with_snapshot(bytes: Vec<u8>) -> Self {
        let backend = Self::new();
        *backend.data.write() = Some(bytes);
        backend
    }

    /// Copy of the stored snapshot.
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        self.data.read().clone()
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Drop the stored snapshot.
    pub fn clear(&self) {
        *self.data.write() = None;
    }
}

impl StorageBackend for MemoryBackend {
    fn write_snapshot(&mut self, bytes: &[u8]) -> Result<()> {
        *self.data.write() = Some(bytes.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read_snapshot(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().clone())
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}
