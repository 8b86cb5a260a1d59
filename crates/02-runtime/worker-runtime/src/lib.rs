//! Worker-side runtime for coprocessor families.
//!
//! The instruction-level emulation of each CPU family plugs in through
//! [`WorkerCore`]; this crate owns what surrounds it: building a core for a
//! freshly loaded image ([`CoreFactory`]), running it on its own thread with a
//! cooperative stop flag ([`WorkerThread`]), and a reference consumer of the
//! ring protocol ([`ServiceLoop`]) for services implemented natively.

mod core;
mod error;
mod service;
mod thread;

pub use crate::core::{CoreFactory, WorkerContext, WorkerCore};
pub use error::{RuntimeError, RuntimeResult};
pub use service::{ServiceHandler, ServiceLoop, ServiceReply};
pub use thread::{WorkerExit, WorkerThread};
