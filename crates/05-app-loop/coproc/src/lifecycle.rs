//! Worker start/stop bookkeeping.
//!
//! Joining a worker thread can take up to the stop grace period, so the
//! engine lock is never held across it: the record is detached under the
//! lock, the thread is joined without it, and tickets are settled after
//! re-locking. Start and stop serialize on a separate lifecycle lock.

use std::sync::Arc;

use coproc_abi::{CoprocError, CoprocResult, CpuFamily, TicketStatus};
use mailbox::{BankedAddressSpace, MailboxError};
use tracing::{info, warn};
use worker_runtime::{CoreFactory, WorkerContext, WorkerThread};

use crate::engine::Engine;
use crate::Coprocessor;

fn load_failed(family: CpuFamily, err: impl std::fmt::Display) -> CoprocError {
    CoprocError::load_failed(format!("{family}: {err}"))
}

fn check_fits(family: CpuFamily, image: &[u8]) -> CoprocResult<()> {
    let window = family.load_window();
    if image.len() > window.size() {
        return Err(load_failed(
            family,
            format!(
                "image is {} bytes, window holds {}",
                image.len(),
                window.size()
            ),
        ));
    }
    Ok(())
}

impl Engine {
    /// Marks `family` stopped and hands back its thread with the stop flag raised.
    ///
    /// Returns NO_WORKER if it is not running.
    pub(crate) fn detach(&mut self, family: CpuFamily) -> CoprocResult<Option<WorkerThread>> {
        let worker = self.worker_mut(family);
        if !worker.running {
            return Err(CoprocError::NoWorker(family.label()));
        }
        worker.running = false;
        let thread = worker.thread.take();
        if let Some(thread) = &thread {
            thread.request_stop();
        }
        Ok(thread)
    }

    /// Settles `family`'s unsettled tickets once its thread has been joined.
    ///
    /// A thread that outlived its grace period is parked on the record so the
    /// next start can collect it.
    pub(crate) fn finish_stop(&mut self, family: CpuFamily, lingering: Option<WorkerThread>) {
        if lingering.is_some() {
            self.worker_mut(family).thread = lingering;
        }

        // Responses already produced still count; everything else is orphaned.
        let unsettled = self.tickets.unsettled(family);
        let mut orphaned = 0;
        for &id in &unsettled {
            if let Ok(TicketStatus::WorkerDown) = self.refresh(id) {
                orphaned += 1;
            }
        }
        info!(%family, orphaned, "worker stopped");
    }

    /// Loads `image` into `family`'s window and spawns a worker on it.
    ///
    /// The previous worker must already be stopped and joined.
    pub(crate) fn launch(
        &mut self,
        family: CpuFamily,
        image: Arc<[u8]>,
        factory: &dyn CoreFactory,
    ) -> CoprocResult<()> {
        let window = family.load_window();
        let memory = Arc::clone(&self.memory);
        memory
            .fill(window.base, window.size(), 0)
            .and_then(|()| memory.write_bytes(window.base, &image))
            .map_err(|err| load_failed(family, err))?;

        // Reset vectors live in the CPU's own 16-bit view of its bank.
        let entry = family.entry_state();
        let space = family
            .is_banked()
            .then(|| BankedAddressSpace::new(window.base));
        if let (Some(space), Some(vector)) = (space, entry.reset_vector) {
            space
                .write_u16(&memory, vector, entry.pc as u16)
                .map_err(|err| load_failed(family, err))?;
        }

        let idle = self.config.idle_backoff();
        let worker = self.worker_mut(family);
        worker
            .producer
            .reset()
            .map_err(|err| load_failed(family, err))?;
        worker.occupants = Default::default();
        worker.generation += 1;

        let consumer = worker
            .producer
            .claim_consumer()
            .map_err(|err| load_failed(family, err))?;
        let core = factory
            .create(WorkerContext {
                family,
                memory,
                consumer,
                image: Arc::clone(&image),
                entry,
                generation: worker.generation,
            })
            .map_err(|err| load_failed(family, err))?;
        let thread = WorkerThread::spawn(worker.label(), core, idle)
            .map_err(|err| load_failed(family, err))?;

        worker.thread = Some(thread);
        worker.running = true;
        info!(
            %family,
            generation = worker.generation,
            image_len = image.len(),
            pc = entry.pc,
            "worker started"
        );
        Ok(())
    }
}

impl Coprocessor {
    /// Starts `family` on an image that is already in memory.
    ///
    /// A running worker is stopped first. An image that does not fit is
    /// rejected before anything is touched.
    pub fn start_image(&self, family: CpuFamily, image: Arc<[u8]>) -> CoprocResult<()> {
        let _lifecycle = self.lifecycle.lock();
        check_fits(family, &image)?;
        if self.is_running(family) {
            self.stop_detached(family)?;
        }
        self.reap(family)?;
        self.engine
            .lock()
            .launch(family, image, self.factory.as_ref())
    }

    /// Halts `family`'s worker and fails its unsettled tickets with WORKER_DOWN.
    ///
    /// Returns NO_WORKER if it is not running. Other families stay serviceable
    /// while the worker thread is being joined.
    pub fn stop(&self, family: CpuFamily) -> CoprocResult<()> {
        let _lifecycle = self.lifecycle.lock();
        self.stop_detached(family)
    }

    /// Stops every running worker; returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let _lifecycle = self.lifecycle.lock();
        let mut stopped = 0;
        for family in CpuFamily::ALL {
            if self.is_running(family) && self.stop_detached(family).is_ok() {
                stopped += 1;
            }
        }
        stopped
    }

    fn stop_detached(&self, family: CpuFamily) -> CoprocResult<()> {
        let thread = self.engine.lock().detach(family)?;
        let grace = self.config.stop_grace();
        let lingering = thread.and_then(|mut thread| (!thread.stop(grace)).then_some(thread));
        self.engine.lock().finish_stop(family, lingering);
        Ok(())
    }

    /// Collects a previous worker that outlived its stop grace period.
    fn reap(&self, family: CpuFamily) -> CoprocResult<()> {
        let Some(mut thread) = self.engine.lock().worker_mut(family).thread.take() else {
            return Ok(());
        };
        if thread.stop(self.config.stop_grace()) {
            return Ok(());
        }
        warn!(%family, "previous worker is still running");
        self.engine.lock().worker_mut(family).thread = Some(thread);
        Err(load_failed(
            family,
            MailboxError::ConsumerBusy {
                ring: family.ring_index(),
            },
        ))
    }
}
