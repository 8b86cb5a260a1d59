//! Coprocessor ABI shared between the host-side core, workers and front ends.
//!
//! This crate defines the protocol boundary: which CPU families exist and
//! where they live in guest memory, the ticket status codes a poll can return,
//! the error taxonomy, and the MMIO register map of the command surface.

#![allow(missing_docs)]

pub mod command;
mod error;
mod family;
mod request;
mod status;

pub use error::{CoprocError, CoprocResult, ErrorCode};
pub use family::{CpuFamily, EntryState, LoadWindow, EXEC_TYPE_IE64, EXEC_TYPE_NONE};
pub use request::{SubmitRequest, TicketId};
pub use status::{TicketStatus, WorkerState};
