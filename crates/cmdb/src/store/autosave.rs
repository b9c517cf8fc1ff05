//! Background thread that periodically flushes dirty state.

use crate::config::MIN_AUTOSAVE_INTERVAL;
use crate::error::{CmdbError, Result};
use log::{debug, error};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    /// Sleep for `interval` unless stopped first. Returns `true` once stopped.
    fn wait(&self, interval: Duration) -> bool {
        let deadline = Instant::now() + interval;
        let mut stopped = self.stopped.lock();
        while !*stopped {
            if self.cv.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.cv.notify_all();
    }
}

/// Handle to the autosave thread.
///
/// The thread calls `tick` once per interval (at least
/// [`MIN_AUTOSAVE_INTERVAL`]) until [`AutoSave::shutdown`] is called.
/// Deciding whether a save is needed, and guarding against overlapping
/// saves, is up to `tick`.
#[derive(Debug)]
pub(crate) struct AutoSave {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl AutoSave {
    pub(crate) fn spawn<F>(interval: Duration, tick: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let interval = interval.max(MIN_AUTOSAVE_INTERVAL);
        let signal = Arc::new(StopSignal::default());
        let handle = std::thread::Builder::new()
            .name("cmdb-autosave".to_owned())
            .spawn({
                let signal = signal.clone();
                move || {
                    debug!("Autosave thread started, interval {interval:?}");
                    while !signal.wait(interval) {
                        tick();
                    }
                    debug!("Autosave thread stopped");
                }
            })
            .map_err(|e| CmdbError::storage("Failed to spawn autosave thread", Some(e)))?;

        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Signal the thread and wait for it to exit. Safe to call more than once.
    pub(crate) fn shutdown(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Autosave thread panicked");
            }
        }
    }
}

impl Drop for AutoSave {
    fn drop(&mut self) {
        self.shutdown();
    }
}
