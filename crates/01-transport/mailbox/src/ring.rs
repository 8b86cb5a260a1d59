//! Positional single-producer/single-consumer ring.
//!
//! Each ring block in the mailbox is split into two owned halves:
//!
//! * [`RingProducer`] (host) is the only writer of `head`, `entries[*]` and the
//!   pre-initialisation of `responses[slot]` for slots it is about to publish.
//! * [`RingConsumer`] (worker) is the only writer of `tail` and of
//!   `responses[*]` for slots it has dequeued.
//!
//! A record is fully written before its cursor is stored with `Release`; the
//! other side loads the cursor with `Acquire` before reading the record. The
//! response for the request published at slot `S` is always found at
//! `responses[S]`, so no separate addressing is needed.

use crate::descriptor::{RequestDescriptor, ResponseDescriptor};
use crate::layout::{RingLayout, REQ_DESC_SIZE, RESP_DESC_SIZE, RESP_STATUS_PENDING, RING_CAPACITY};
use crate::{GuestMemory, MailboxError, MailboxResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[inline]
fn advance(cursor: u8) -> u8 {
    (cursor + 1) % RING_CAPACITY
}

#[inline]
fn distance(from: u8, to: u8) -> u8 {
    (to + RING_CAPACITY - from) % RING_CAPACITY
}

fn read_request(memory: &GuestMemory, layout: &RingLayout, slot: u8) -> RequestDescriptor {
    let mut bytes = [0u8; REQ_DESC_SIZE as usize];
    memory.mailbox_read(layout.entry_addr(slot), &mut bytes);
    RequestDescriptor::decode(&bytes)
}

fn read_response(memory: &GuestMemory, layout: &RingLayout, slot: u8) -> ResponseDescriptor {
    let mut bytes = [0u8; RESP_DESC_SIZE as usize];
    memory.mailbox_read(layout.response_addr(slot), &mut bytes);
    ResponseDescriptor::decode(&bytes)
}

/// Host half of a ring.
#[derive(Debug)]
pub struct RingProducer {
    memory: Arc<GuestMemory>,
    layout: RingLayout,
    consumer_live: Arc<AtomicBool>,
}

impl RingProducer {
    /// Attaches to ring `index` of the mailbox and resets it to empty.
    pub fn attach(memory: Arc<GuestMemory>, index: usize) -> MailboxResult<Self> {
        let layout = RingLayout::new(index)?;
        let mut producer = Self {
            memory,
            layout,
            consumer_live: Arc::new(AtomicBool::new(false)),
        };
        producer.reset()?;
        Ok(producer)
    }

    pub fn layout(&self) -> RingLayout {
        self.layout
    }

    pub fn memory(&self) -> &Arc<GuestMemory> {
        &self.memory
    }

    /// Empties the ring (`head = tail = 0`) and rewrites the capacity byte.
    ///
    /// Only legal while no consumer is attached, since `tail` belongs to it.
    pub fn reset(&mut self) -> MailboxResult<()> {
        if self.has_consumer() {
            return Err(MailboxError::ConsumerBusy {
                ring: self.layout.index(),
            });
        }
        let mem = &self.memory;
        mem.mailbox_cell(self.layout.capacity_addr())
            .store(RING_CAPACITY, Ordering::Relaxed);
        mem.mailbox_cell(self.layout.tail_addr())
            .store(0, Ordering::Release);
        mem.mailbox_cell(self.layout.head_addr())
            .store(0, Ordering::Release);
        Ok(())
    }

    /// Producer cursor. Only this half writes it, so a relaxed load suffices.
    pub fn head(&self) -> u8 {
        self.memory
            .mailbox_cell(self.layout.head_addr())
            .load(Ordering::Relaxed)
    }

    /// Consumer cursor as last published by the worker.
    pub fn tail(&self) -> u8 {
        self.memory
            .mailbox_cell(self.layout.tail_addr())
            .load(Ordering::Acquire)
    }

    /// Number of published requests the worker has not completed yet.
    pub fn len(&self) -> u8 {
        distance(self.tail(), self.head())
    }

    pub fn is_empty(&self) -> bool {
        self.head() == self.tail()
    }

    pub fn is_full(&self) -> bool {
        advance(self.head()) == self.tail()
    }

    /// Publishes `request` into `entries[head]`.
    ///
    /// Returns the slot the request occupies, or `None` when the ring is full.
    /// `responses[slot]` is reset to `{ticket, PENDING, 0, 0}` before the head
    /// moves so a stale response from the slot's previous occupant is never
    /// mistaken for this request's.
    pub fn try_enqueue(&mut self, request: &RequestDescriptor) -> Option<u8> {
        let head = self.head();
        let tail = self.tail();
        let next = advance(head);
        if next == tail {
            return None;
        }

        let mem = &self.memory;
        mem.mailbox_write(self.layout.entry_addr(head), &request.encode());
        let pending = ResponseDescriptor {
            ticket: request.ticket,
            status: RESP_STATUS_PENDING,
            result_code: 0,
            resp_len: 0,
        };
        mem.mailbox_write(self.layout.response_addr(head), &pending.encode());

        mem.mailbox_cell(self.layout.head_addr())
            .store(next, Ordering::Release);
        Some(head)
    }

    /// True once the worker's tail has moved past `slot`.
    ///
    /// Only meaningful for slots this producer published since the last reset.
    pub fn is_consumed(&self, slot: u8) -> bool {
        let tail = self.tail();
        distance(tail, slot) >= distance(tail, self.head())
    }

    /// True when `slot` is the next request the worker will complete.
    pub fn is_at_cursor(&self, slot: u8) -> bool {
        let tail = self.tail();
        tail == slot && tail != self.head()
    }

    /// Reads `responses[slot]` if the worker has completed it.
    pub fn completed_response(&self, slot: u8) -> Option<ResponseDescriptor> {
        if !self.is_consumed(slot) {
            return None;
        }
        Some(read_response(&self.memory, &self.layout, slot))
    }

    pub fn has_consumer(&self) -> bool {
        self.consumer_live.load(Ordering::Acquire)
    }

    /// Hands out the worker half. At most one consumer may exist at a time.
    pub fn claim_consumer(&self) -> MailboxResult<RingConsumer> {
        self.consumer_live
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MailboxError::ConsumerBusy {
                ring: self.layout.index(),
            })?;
        Ok(RingConsumer {
            memory: Arc::clone(&self.memory),
            layout: self.layout,
            live: Arc::clone(&self.consumer_live),
        })
    }
}

/// Worker half of a ring. Dropping it releases the claim.
#[derive(Debug)]
pub struct RingConsumer {
    memory: Arc<GuestMemory>,
    layout: RingLayout,
    live: Arc<AtomicBool>,
}

impl RingConsumer {
    pub fn layout(&self) -> RingLayout {
        self.layout
    }

    pub fn memory(&self) -> &Arc<GuestMemory> {
        &self.memory
    }

    fn tail(&self) -> u8 {
        self.memory
            .mailbox_cell(self.layout.tail_addr())
            .load(Ordering::Relaxed)
    }

    fn head(&self) -> u8 {
        self.memory
            .mailbox_cell(self.layout.head_addr())
            .load(Ordering::Acquire)
    }

    /// Returns the request at the tail without consuming it.
    pub fn peek(&self) -> Option<(u8, RequestDescriptor)> {
        let tail = self.tail();
        if tail == self.head() {
            return None;
        }
        Some((tail, read_request(&self.memory, &self.layout, tail)))
    }

    /// Writes `response` into `responses[tail]` and then advances the tail.
    ///
    /// Returns the completed slot, or `None` if the ring was empty.
    pub fn complete(&mut self, response: &ResponseDescriptor) -> Option<u8> {
        let tail = self.tail();
        if tail == self.head() {
            return None;
        }
        self.memory
            .mailbox_write(self.layout.response_addr(tail), &response.encode());
        self.memory
            .mailbox_cell(self.layout.tail_addr())
            .store(advance(tail), Ordering::Release);
        Some(tail)
    }
}

impl Drop for RingConsumer {
    fn drop(&mut self) {
        self.live.store(false, Ordering::Release);
    }
}
