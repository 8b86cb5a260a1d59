//! Completion polling and bounded waiting.

use std::time::Instant;

use coproc_abi::{CoprocResult, TicketId, TicketStatus};
use mailbox::layout::{RESP_STATUS_ERROR, RESP_STATUS_OK};
use mailbox::wait::{poll_until, PollOutcome};
use mailbox::ResponseDescriptor;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::Coprocessor;

/// Maps a produced response onto a terminal status.
fn settle_from(id: TicketId, response: &ResponseDescriptor) -> TicketStatus {
    if response.ticket != id.raw() {
        warn!(
            ticket = %id,
            echoed = response.ticket,
            "response echoes a different ticket"
        );
        return TicketStatus::Error;
    }
    match response.status {
        RESP_STATUS_OK => TicketStatus::Ok,
        RESP_STATUS_ERROR => TicketStatus::Error,
        other => {
            warn!(ticket = %id, status = other, "worker produced an invalid status");
            TicketStatus::Error
        }
    }
}

impl Engine {
    /// Brings a ticket's cached status up to date without counting a read.
    pub(crate) fn refresh(&mut self, id: TicketId) -> CoprocResult<TicketStatus> {
        let ticket = self.tickets.get(id)?;
        if ticket.status.is_terminal() {
            return Ok(ticket.status);
        }
        let (family, slot, generation) = (ticket.family, ticket.slot, ticket.generation);
        let report_running = self.config.report_running;
        let worker = self.worker(family);

        let (status, result_code, resp_len) = if generation != worker.generation {
            (TicketStatus::WorkerDown, 0, 0)
        } else if let Some(response) = worker.producer.completed_response(slot) {
            let status = settle_from(id, &response);
            debug!(ticket = %id, %status, "response observed");
            (status, response.result_code, response.resp_len)
        } else if !worker.is_live() {
            (TicketStatus::WorkerDown, 0, 0)
        } else if report_running && worker.producer.is_at_cursor(slot) {
            (TicketStatus::Running, 0, 0)
        } else {
            (TicketStatus::Pending, 0, 0)
        };

        self.tickets
            .get_mut(id)?
            .settle(status, result_code, resp_len);
        Ok(status)
    }

    /// Non-blocking status query with two-read eviction of terminal tickets.
    pub(crate) fn status(&mut self, id: TicketId) -> CoprocResult<TicketStatus> {
        let status = self.refresh(id)?;
        if status.is_terminal() {
            return self.tickets.record_terminal_read(id);
        }
        Ok(status)
    }

    /// Marks a still-unsettled ticket as timed out.
    pub(crate) fn expire(&mut self, id: TicketId) -> CoprocResult<TicketStatus> {
        let status = self.refresh(id)?;
        if status.is_terminal() {
            return Ok(status);
        }
        self.tickets
            .get_mut(id)?
            .settle(TicketStatus::Timeout, 0, 0);
        Ok(TicketStatus::Timeout)
    }
}

impl Coprocessor {
    /// Reports a ticket's status without blocking.
    ///
    /// A terminal status is returned on two consecutive calls; the second one
    /// evicts the ticket, after which it is [`CoprocError::StaleTicket`].
    ///
    /// [`CoprocError::StaleTicket`]: coproc_abi::CoprocError::StaleTicket
    pub fn status(&self, id: TicketId) -> CoprocResult<TicketStatus> {
        self.engine.lock().status(id)
    }

    /// Blocks until the ticket settles or `timeout_ms` elapses (0 selects the
    /// configured default), then reports the status.
    ///
    /// The lock is released between probes so workers and other host callers
    /// are never stalled. A timeout marks the ticket TIMEOUT; whatever the
    /// worker later writes into the slot is ignored. Waiting does not count
    /// toward eviction.
    pub fn wait(&self, id: TicketId, timeout_ms: u32) -> CoprocResult<TicketStatus> {
        let timeout = self.config.wait_timeout(timeout_ms);
        let deadline = Instant::now() + timeout;
        let outcome = poll_until(deadline, self.config.poll_interval(), || {
            match self.engine.lock().refresh(id) {
                Ok(status) if !status.is_terminal() => None,
                settled => Some(settled),
            }
        });
        match outcome {
            PollOutcome::Ready(settled) => settled,
            PollOutcome::TimedOut => {
                let status = self.engine.lock().expire(id)?;
                if status == TicketStatus::Timeout {
                    warn!(ticket = %id, ?timeout, "wait timed out");
                }
                Ok(status)
            }
        }
    }
}
