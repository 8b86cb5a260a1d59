//! Shared-memory mailbox primitives used by the coprocessor host and its workers.
//!
//! * [`GuestMemory`] – the flat bus address space every party addresses.
//! * [`layout`] – fixed mailbox geometry: one ring block per worker family.
//! * [`RingProducer`] / [`RingConsumer`] – the two halves of a positional
//!   request/response ring; each cursor has exactly one writer.
//! * [`RequestDescriptor`] / [`ResponseDescriptor`] – fixed-size slot records.
//! * [`BankedAddressSpace`] – 16-bit views used by the 8-bit worker families.
//! * [`MailboxError`] – allocation and bounds failures.

mod bank;
mod descriptor;
mod error;
pub mod layout;
mod memory;
mod region;
mod ring;
pub mod wait;

pub use bank::{BankedAddressSpace, BANK_MAILBOX_END, BANK_MAILBOX_START};
pub use descriptor::{RequestDescriptor, ResponseDescriptor};
pub use error::{MailboxError, MailboxResult};
pub use layout::RingLayout;
pub use memory::GuestMemory;
pub use region::SharedRegion;
pub use ring::{RingConsumer, RingProducer};
