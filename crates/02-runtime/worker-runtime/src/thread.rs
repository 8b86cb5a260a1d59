//! Hosting a [`WorkerCore`] on a dedicated OS thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use mailbox::wait::IdleBackoff;
use tracing::{debug, info, warn};

use crate::{RuntimeResult, WorkerCore};

/// How a worker thread ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// The stop flag was observed.
    Stopped,
    /// The core panicked.
    Panicked,
}

/// Handle to a running worker thread.
///
/// Stopping is cooperative: [`WorkerThread::request_stop`] raises a flag the
/// loop checks between quanta. The core (and with it the ring's consumer
/// claim) is dropped on the worker thread before completion is signalled.
pub struct WorkerThread {
    name: String,
    stop: Arc<AtomicBool>,
    steps: Arc<AtomicU64>,
    done: Receiver<()>,
    handle: Option<JoinHandle<WorkerExit>>,
}

impl WorkerThread {
    /// Spawns `core` on a thread called `name`.
    pub fn spawn(
        name: impl Into<String>,
        mut core: Box<dyn WorkerCore>,
        idle_sleep: Duration,
    ) -> RuntimeResult<Self> {
        let name = name.into();
        let stop = Arc::new(AtomicBool::new(false));
        let steps = Arc::new(AtomicU64::new(0));
        let (done_tx, done) = crossbeam_channel::bounded::<()>(1);

        let thread_stop = Arc::clone(&stop);
        let thread_steps = Arc::clone(&steps);
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            info!(worker = core.name(), "worker started");
            let mut backoff = IdleBackoff::new(idle_sleep);
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                while !thread_stop.load(Ordering::Acquire) {
                    let work = core.step();
                    if work == 0 {
                        backoff.snooze();
                    } else {
                        thread_steps.fetch_add(work as u64, Ordering::Relaxed);
                        backoff.reset();
                    }
                }
            }));
            let label = core.name();
            drop(core);
            let exit = match outcome {
                Ok(()) => {
                    info!(worker = label, "worker stopped");
                    WorkerExit::Stopped
                }
                Err(_) => {
                    warn!(worker = label, "worker core panicked");
                    WorkerExit::Panicked
                }
            };
            let _ = done_tx.send(());
            exit
        })?;

        Ok(Self {
            name,
            stop,
            steps,
            done,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units of work the core has reported so far.
    pub fn progress(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    /// Asks the loop to exit after the current quantum.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// True once the loop has exited and the core has been dropped.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Waits up to `grace` for the loop to exit, joining the thread if it
    /// did. Returns `false` if the worker is still running.
    pub fn wait_stopped(&mut self, grace: Duration) -> bool {
        match self.done.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                warn!(worker = %self.name, ?grace, "worker did not stop within grace period");
                return false;
            }
        }
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(exit) => debug!(worker = %self.name, ?exit, "worker joined"),
                Err(_) => warn!(worker = %self.name, "worker thread panicked outside its core"),
            }
        }
        true
    }

    /// Raises the stop flag and waits up to `grace` for the loop to exit.
    pub fn stop(&mut self, grace: Duration) -> bool {
        self.request_stop();
        self.wait_stopped(grace)
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        // Detached if still running; the flag makes it exit on its next quantum.
        self.request_stop();
    }
}

impl std::fmt::Debug for WorkerThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerThread")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}
