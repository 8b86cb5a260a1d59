use std::time::Instant;

use coproc_abi::{CoprocError, CoprocResult, SubmitRequest, TicketId};
use mailbox::RequestDescriptor;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::tickets::Ticket;

impl Engine {
    /// Publishes `request` on its family's ring and records a PENDING ticket.
    ///
    /// Never blocks and never waits on the worker. Fails without allocating an
    /// id when the worker is not running or the ring is full.
    pub(crate) fn submit(&mut self, request: &SubmitRequest) -> CoprocResult<TicketId> {
        let family = request.family;
        let worker = self.worker(family);
        if !worker.running {
            return Err(CoprocError::NoWorker(family.label()));
        }
        if worker.producer.is_full() {
            return Err(CoprocError::QueueFull(family.label()));
        }

        let now = Instant::now();
        let pruned = self
            .tickets
            .prune(now, self.config.ticket_ttl(), self.config.max_tickets);
        if pruned > 0 {
            warn!(pruned, live = self.tickets.len(), "pruned unevicted tickets");
        }

        self.harvest(family)?;

        let id = self.tickets.allocate_id();
        let descriptor = RequestDescriptor {
            ticket: id.raw(),
            cpu_type: family.as_raw(),
            op: request.op,
            flags: 0,
            src_ptr: request.src_ptr,
            src_len: request.src_len,
            dst_ptr: request.dst_ptr,
            dst_cap: request.dst_cap,
        };

        let worker = self.worker_mut(family);
        let slot = worker
            .producer
            .try_enqueue(&descriptor)
            .ok_or(CoprocError::QueueFull(family.label()))?;
        worker.occupants[slot as usize] = Some(id);
        let generation = worker.generation;

        self.tickets
            .insert(Ticket::new(id, family, slot, generation, now));
        debug!(ticket = %id, %family, slot, op = request.op, "request submitted");
        Ok(id)
    }

    /// Captures the response of whichever ticket last used the slot the next
    /// enqueue will overwrite.
    fn harvest(&mut self, family: coproc_abi::CpuFamily) -> CoprocResult<()> {
        let worker = self.worker_mut(family);
        let head = worker.producer.head();
        let Some(previous) = worker.occupants[head as usize].take() else {
            return Ok(());
        };
        match self.refresh(previous) {
            Ok(_) | Err(CoprocError::StaleTicket(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}
