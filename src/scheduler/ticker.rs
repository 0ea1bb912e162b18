//! Background thread that ticks a [`SyncScheduler`] on a fixed interval.

use crate::scheduler::SyncScheduler;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Owns the scheduler thread. Stopping (or dropping) the handle wakes the
/// thread immediately and joins it.
pub struct SchedulerHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Start ticking `scheduler` every `interval`.
    ///
    /// With `sync_on_startup` the cache is marked dirty and a first tick runs
    /// as soon as the thread starts instead of after one full interval.
    pub fn spawn(
        scheduler: Arc<SyncScheduler>,
        interval: Duration,
        sync_on_startup: bool,
    ) -> io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("gallery-sync-scheduler".into())
            .spawn(move || {
                log::info!("Sync scheduler started (interval {:?})", interval);
                if sync_on_startup {
                    log::info!("Sync on startup requested");
                    scheduler.cache().mark_dirty();
                    let _ = scheduler.tick();
                }

                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            let _ = scheduler.tick();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::info!("Sync scheduler stopped");
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    /// Whether the scheduler thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the thread to stop and wait for it.
    ///
    /// A pass in progress runs to completion first.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Sync scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
