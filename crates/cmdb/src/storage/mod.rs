//! Snapshot persistence.
//!
//! This module defines the [`StorageBackend`] trait and provides implementations:
//! - [`FileBackend`]: flat binary file with a rename guard against torn writes
//! - [`MemoryBackend`]: in-memory snapshot slot for testing
//!
//! Backends only move opaque snapshot bytes; [`codec`] defines what is in them.
//! Secondary indices are never persisted and are rebuilt on load.

pub mod codec;
mod file;
mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

use crate::error::Result;

/// Trait defining where snapshots are kept.
///
/// Every call is explicit; the store decides when to save and load.
pub trait StorageBackend: Send {
    /// Replace the stored snapshot with `bytes`.
    ///
    /// On failure the previously stored snapshot must remain readable.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::Storage`](crate::CmdbError::Storage) if the write fails.
    fn write_snapshot(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read the stored snapshot.
    ///
    /// Returns `Ok(None)` if nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns [`CmdbError::Storage`](crate::CmdbError::Storage) if the read fails.
    fn read_snapshot(&self) -> Result<Option<Vec<u8>>>;

    /// Human-readable location for log messages.
    fn describe(&self) -> String;
}
