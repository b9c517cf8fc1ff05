//! Flat-file storage backend.
//!
//! Saving follows a rename guard:
//!
//! 1. rename `<file>` to `<file>.tmp` (if it exists)
//! 2. write and fsync a new `<file>`
//! 3. on success delete `<file>.tmp`; on failure delete the partial `<file>`
//!    and rename `<file>.tmp` back
//!
//! A reader never sees a half-written primary file. A crash between steps 1
//! and 3 can leave only `<file>.tmp` behind; recovering it is left to the
//! operator. Until then reads fail and writes refuse to touch the leftover
//! `<file>.tmp`.

use super::StorageBackend;
use crate::error::{CmdbError, Result};
use log::{debug, error, warn};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Snapshot kept in a single binary file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    #[cfg(test)]
    fail_next_write: bool,
}

impl FileBackend {
    /// Use the file at `path`. Nothing is touched until the first read or write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            #[cfg(test)]
            fail_next_write: false,
        }
    }

    /// Primary file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the guard copy used while a save is in progress.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn write_new_file(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(&self.path)?;

        #[cfg(test)]
        {
            if std::mem::take(&mut self.fail_next_write) {
                file.write_all(&bytes[..bytes.len() / 2])?;
                return Err(std::io::Error::new(ErrorKind::Other, "injected write failure"));
            }
        }

        file.write_all(bytes)?;
        file.sync_all()
    }

    fn leftover_guard_error(&self, temp_path: &Path) -> CmdbError {
        CmdbError::storage(
            format!(
                "{:?} exists from an interrupted save; recover or remove it before using {:?}",
                temp_path, self.path
            ),
            None::<std::io::Error>,
        )
    }
}

impl StorageBackend for FileBackend {
    fn write_snapshot(&mut self, bytes: &[u8]) -> Result<()> {
        let temp_path = self.temp_path();
        if temp_path.exists() {
            return Err(self.leftover_guard_error(&temp_path));
        }

        let guarded = match fs::rename(&self.path, &temp_path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                return Err(CmdbError::storage(
                    format!("Failed to move {:?} aside to {:?}", self.path, temp_path),
                    Some(e),
                ))
            }
        };

        if let Err(e) = self.write_new_file(bytes) {
            error!("Failed to write snapshot to {:?}: {e}", self.path);
            if let Err(remove_err) = fs::remove_file(&self.path) {
                if remove_err.kind() != ErrorKind::NotFound {
                    warn!("Could not remove partial file {:?}: {remove_err}", self.path);
                }
            }
            if guarded {
                if let Err(restore_err) = fs::rename(&temp_path, &self.path) {
                    error!(
                        "Could not restore {:?} from {:?}: {restore_err}",
                        self.path, temp_path
                    );
                }
            }
            return Err(CmdbError::storage(
                format!("Failed to write snapshot to {:?}", self.path),
                Some(e),
            ));
        }

        if guarded {
            if let Err(e) = fs::remove_file(&temp_path) {
                warn!("Snapshot saved but {:?} could not be removed: {e}", temp_path);
            }
        }

        debug!("Wrote {} bytes to {:?}", bytes.len(), self.path);
        Ok(())
    }

    fn read_snapshot(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let temp_path = self.temp_path();
                if temp_path.exists() {
                    error!("{:?} is missing but {:?} exists", self.path, temp_path);
                    return Err(self.leftover_guard_error(&temp_path));
                }
                Ok(None)
            }
            Err(e) => Err(CmdbError::storage(
                format!("Failed to read {:?}", self.path),
                Some(e),
            )),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
