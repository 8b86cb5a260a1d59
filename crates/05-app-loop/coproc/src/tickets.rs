//! Host-side ticket bookkeeping.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use coproc_abi::{CoprocError, CoprocResult, CpuFamily, TicketId, TicketStatus};
use serde::Serialize;
use smallvec::SmallVec;

/// Terminal reads after which a ticket is evicted.
pub(crate) const EVICT_AFTER_READS: u8 = 2;

#[derive(Clone, Debug)]
pub(crate) struct Ticket {
    pub id: TicketId,
    pub family: CpuFamily,
    pub slot: u8,
    /// Worker generation the request was published under.
    pub generation: u64,
    pub submitted_at: Instant,
    pub status: TicketStatus,
    pub result_code: u32,
    pub resp_len: u32,
    pub reads: u8,
}

impl Ticket {
    pub fn new(id: TicketId, family: CpuFamily, slot: u8, generation: u64, now: Instant) -> Self {
        Self {
            id,
            family,
            slot,
            generation,
            submitted_at: now,
            status: TicketStatus::Pending,
            result_code: 0,
            resp_len: 0,
            reads: 0,
        }
    }

    pub fn settle(&mut self, status: TicketStatus, result_code: u32, resp_len: u32) {
        self.status = status;
        self.result_code = result_code;
        self.resp_len = resp_len;
    }

    pub fn info(&self, now: Instant) -> TicketInfo {
        TicketInfo {
            id: self.id,
            family: self.family,
            slot: self.slot,
            status: self.status,
            result_code: self.result_code,
            resp_len: self.resp_len,
            reads: self.reads,
            age_ms: now.saturating_duration_since(self.submitted_at).as_millis() as u64,
        }
    }
}

/// Read-only view of a live ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TicketInfo {
    pub id: TicketId,
    pub family: CpuFamily,
    pub slot: u8,
    pub status: TicketStatus,
    pub result_code: u32,
    pub resp_len: u32,
    /// Terminal reads counted so far.
    pub reads: u8,
    pub age_ms: u64,
}

/// Live tickets keyed by id, plus the id allocator.
#[derive(Debug)]
pub(crate) struct TicketTable {
    entries: HashMap<TicketId, Ticket>,
    next_id: u32,
}

impl TicketTable {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Next id that is neither 0 nor held by a live ticket.
    pub fn allocate_id(&mut self) -> TicketId {
        loop {
            let candidate = TicketId(self.next_id);
            self.next_id = match self.next_id.wrapping_add(1) {
                0 => 1,
                next => next,
            };
            if !self.entries.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    pub fn insert(&mut self, ticket: Ticket) {
        self.entries.insert(ticket.id, ticket);
    }

    pub fn get(&self, id: TicketId) -> CoprocResult<&Ticket> {
        self.entries
            .get(&id)
            .ok_or(CoprocError::StaleTicket(id.raw()))
    }

    pub fn get_mut(&mut self, id: TicketId) -> CoprocResult<&mut Ticket> {
        self.entries
            .get_mut(&id)
            .ok_or(CoprocError::StaleTicket(id.raw()))
    }

    /// Counts one read of a terminal status, evicting on the second.
    pub fn record_terminal_read(&mut self, id: TicketId) -> CoprocResult<TicketStatus> {
        let ticket = self.get_mut(id)?;
        debug_assert!(ticket.status.is_terminal());
        ticket.reads = ticket.reads.saturating_add(1);
        let status = ticket.status;
        if ticket.reads >= EVICT_AFTER_READS {
            self.entries.remove(&id);
        }
        Ok(status)
    }

    /// Non-terminal tickets published against `family`.
    pub fn unsettled(&self, family: CpuFamily) -> SmallVec<[TicketId; 16]> {
        self.entries
            .values()
            .filter(|t| t.family == family && !t.status.is_terminal())
            .map(|t| t.id)
            .collect()
    }

    /// Drops tickets older than `ttl`, then the oldest ones until fewer than
    /// `cap` remain. Returns how many were dropped.
    pub fn prune(&mut self, now: Instant, ttl: Duration, cap: usize) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, t| now.saturating_duration_since(t.submitted_at) < ttl);

        if self.entries.len() >= cap {
            let mut by_age: Vec<(Instant, TicketId)> = self
                .entries
                .values()
                .map(|t| (t.submitted_at, t.id))
                .collect();
            by_age.sort_unstable();
            let excess = self.entries.len() + 1 - cap.max(1);
            for (_, id) in by_age.into_iter().take(excess) {
                self.entries.remove(&id);
            }
        }
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ticket> {
        self.entries.values()
    }
}
