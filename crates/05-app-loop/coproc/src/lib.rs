//! Host side of the coprocessor mailbox.
//!
//! [`Coprocessor`] ties the pieces together: the dispatcher publishes
//! requests on a family's ring and hands out tickets, the poller correlates
//! tickets with positional responses and applies the two-read eviction rule,
//! and the lifecycle manager loads images and runs workers. [`CommandSurface`]
//! exposes all of it through the MMIO register file.

mod config;
mod dispatcher;
mod engine;
mod lifecycle;
mod manager;
mod mmio;
mod poller;
mod tickets;

pub use config::CoprocConfig;
pub use engine::WorkerInfo;
pub use manager::{Coprocessor, CoprocessorBuilder};
pub use mmio::CommandSurface;
pub use tickets::TicketInfo;

pub use coproc_abi::{
    CoprocError, CoprocResult, CpuFamily, SubmitRequest, TicketId, TicketStatus, WorkerState,
};
