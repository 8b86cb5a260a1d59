//! Mailbox geometry.
//!
//! ```text
//! MAILBOX_BASE + index * RING_STRIDE:
//! +0x000  head      u8   next slot the host writes (producer)
//! +0x001  tail      u8   next slot the worker reads (consumer)
//! +0x002  capacity  u8   always RING_CAPACITY
//! +0x008  entries   [RequestDescriptor; 16]   32 B each
//! +0x208  responses [ResponseDescriptor; 16]  16 B each, ends at +0x308
//! ```
//!
//! The stride is 0x310 so a ring's response block never reaches into the
//! header of the ring that follows it.

use crate::{MailboxError, MailboxResult};

/// Default size of the guest address space.
pub const GUEST_MEMORY_SIZE: usize = 0x100_0000;

pub const MAILBOX_BASE: u32 = 0x82_0000;
pub const MAILBOX_SIZE: u32 = 0x1000;
pub const MAILBOX_END: u32 = MAILBOX_BASE + MAILBOX_SIZE - 1;

/// Number of ring blocks, one per supported worker family.
pub const RING_COUNT: usize = 5;
/// Slots per ring. One slot is always kept free to tell full from empty.
pub const RING_CAPACITY: u8 = 16;
pub const RING_STRIDE: u32 = 0x310;

pub const RING_HEAD_OFFSET: u32 = 0x00;
pub const RING_TAIL_OFFSET: u32 = 0x01;
pub const RING_CAPACITY_OFFSET: u32 = 0x02;
pub const RING_ENTRIES_OFFSET: u32 = 0x008;
pub const RING_RESPONSES_OFFSET: u32 = 0x208;

pub const REQ_DESC_SIZE: u32 = 32;
pub const REQ_TICKET_OFF: u32 = 0x00;
pub const REQ_CPU_TYPE_OFF: u32 = 0x04;
pub const REQ_OP_OFF: u32 = 0x08;
pub const REQ_FLAGS_OFF: u32 = 0x0C;
pub const REQ_SRC_PTR_OFF: u32 = 0x10;
pub const REQ_SRC_LEN_OFF: u32 = 0x14;
pub const REQ_DST_PTR_OFF: u32 = 0x18;
pub const REQ_DST_CAP_OFF: u32 = 0x1C;

pub const RESP_DESC_SIZE: u32 = 16;
pub const RESP_TICKET_OFF: u32 = 0x00;
pub const RESP_STATUS_OFF: u32 = 0x04;
pub const RESP_RESULT_CODE_OFF: u32 = 0x08;
pub const RESP_LEN_OFF: u32 = 0x0C;

/// Response status written by the host when a slot is enqueued.
pub const RESP_STATUS_PENDING: u32 = 0;
/// Response status written by a worker on success.
pub const RESP_STATUS_OK: u32 = 2;
/// Response status written by a worker on failure.
pub const RESP_STATUS_ERROR: u32 = 3;

const _: () = assert!(
    RING_RESPONSES_OFFSET + RESP_DESC_SIZE * RING_CAPACITY as u32 <= RING_STRIDE,
    "response block overlaps the next ring"
);
const _: () = assert!(
    RING_ENTRIES_OFFSET + REQ_DESC_SIZE * RING_CAPACITY as u32 <= RING_RESPONSES_OFFSET,
    "request block overlaps the response block"
);
const _: () = assert!(
    RING_STRIDE * RING_COUNT as u32 <= MAILBOX_SIZE,
    "rings exceed the mailbox"
);

/// Bus addresses of one ring block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingLayout {
    index: usize,
    base: u32,
}

impl RingLayout {
    /// Layout of ring `index` (0-based).
    pub fn new(index: usize) -> MailboxResult<Self> {
        if index >= RING_COUNT {
            return Err(MailboxError::InvalidRing { index });
        }
        Ok(Self {
            index,
            base: MAILBOX_BASE + index as u32 * RING_STRIDE,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn head_addr(&self) -> u32 {
        self.base + RING_HEAD_OFFSET
    }

    pub fn tail_addr(&self) -> u32 {
        self.base + RING_TAIL_OFFSET
    }

    pub fn capacity_addr(&self) -> u32 {
        self.base + RING_CAPACITY_OFFSET
    }

    /// Address of `entries[slot]`.
    pub fn entry_addr(&self, slot: u8) -> u32 {
        debug_assert!(slot < RING_CAPACITY);
        self.base + RING_ENTRIES_OFFSET + slot as u32 * REQ_DESC_SIZE
    }

    /// Address of `responses[slot]`.
    pub fn response_addr(&self, slot: u8) -> u32 {
        debug_assert!(slot < RING_CAPACITY);
        self.base + RING_RESPONSES_OFFSET + slot as u32 * RESP_DESC_SIZE
    }
}
