//! State guarded by the facade's mutex.
//!
//! The ring producers, worker records and ticket table are all mutated under
//! one lock on the host side. Workers never take it: they only touch their
//! ring's consumer half, so the lock serializes host callers without ever
//! waiting on a worker.

use std::sync::Arc;

use coproc_abi::{CpuFamily, LoadWindow, WorkerState};
use mailbox::layout::RING_CAPACITY;
use mailbox::{GuestMemory, MailboxResult, RingProducer};
use serde::Serialize;
use worker_runtime::WorkerThread;

use crate::tickets::TicketTable;
use crate::CoprocConfig;

/// One family's worker record and the host half of its ring.
pub(crate) struct WorkerSlot {
    pub family: CpuFamily,
    pub producer: RingProducer,
    pub thread: Option<WorkerThread>,
    pub running: bool,
    pub generation: u64,
    /// Ticket most recently published into each ring slot.
    pub occupants: [Option<coproc_abi::TicketId>; RING_CAPACITY as usize],
}

impl WorkerSlot {
    fn new(family: CpuFamily, memory: Arc<GuestMemory>) -> MailboxResult<Self> {
        Ok(Self {
            family,
            producer: RingProducer::attach(memory, family.ring_index())?,
            thread: None,
            running: false,
            generation: 0,
            occupants: [None; RING_CAPACITY as usize],
        })
    }

    /// Running and its thread has not died underneath us.
    pub fn is_live(&self) -> bool {
        self.running && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn label(&self) -> String {
        format!("coproc:{}", self.family.label())
    }

    pub fn info(&self) -> WorkerInfo {
        WorkerInfo {
            family: self.family,
            label: self.label(),
            running: self.running,
            window: self.family.load_window(),
            generation: self.generation,
            queued: self.producer.len(),
            progress: self.thread.as_ref().map_or(0, WorkerThread::progress),
        }
    }
}

/// Snapshot of one worker record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    pub family: CpuFamily,
    pub label: String,
    pub running: bool,
    pub window: LoadWindow,
    pub generation: u64,
    /// Requests published but not yet completed.
    pub queued: u8,
    /// Requests the worker has reported finishing.
    pub progress: u64,
}

pub(crate) struct Engine {
    pub config: CoprocConfig,
    pub memory: Arc<GuestMemory>,
    pub workers: Vec<WorkerSlot>,
    pub tickets: TicketTable,
}

impl Engine {
    pub fn new(config: CoprocConfig, memory: Arc<GuestMemory>) -> MailboxResult<Self> {
        let workers = CpuFamily::ALL
            .into_iter()
            .map(|family| WorkerSlot::new(family, Arc::clone(&memory)))
            .collect::<MailboxResult<Vec<_>>>()?;
        Ok(Self {
            config,
            memory,
            workers,
            tickets: TicketTable::new(),
        })
    }

    pub fn worker(&self, family: CpuFamily) -> &WorkerSlot {
        &self.workers[family.ring_index()]
    }

    pub fn worker_mut(&mut self, family: CpuFamily) -> &mut WorkerSlot {
        &mut self.workers[family.ring_index()]
    }

    pub fn worker_state(&self) -> WorkerState {
        self.workers
            .iter()
            .filter(|w| w.running)
            .map(|w| w.family)
            .collect()
    }
}
