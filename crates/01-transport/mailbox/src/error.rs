//! Error surface for the mailbox crate.
//!
//! Ring fullness is not an error: producers get `None` back from
//! [`crate::RingProducer::try_enqueue`]. What remains are allocation, bounds and
//! ownership failures.

use std::fmt;

/// Convenience result alias for fallible mailbox operations.
pub type MailboxResult<T, E = MailboxError> = Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Errors surfaced by the mailbox primitives.
pub enum MailboxError {
    /// Allocation of the backing region failed for the given size/alignment pair.
    AllocationFailed { size: usize, alignment: usize },
    /// An access touched bytes outside the guest address space.
    OutOfBounds { addr: u32, len: usize, size: usize },
    /// The guest address space cannot hold the mailbox block.
    RegionTooSmall { size: usize, required: usize },
    /// Ring index outside the mailbox geometry.
    InvalidRing { index: usize },
    /// A consumer view for the ring is still alive.
    ConsumerBusy { ring: usize },
}

impl fmt::Display for MailboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailboxError::AllocationFailed { size, alignment } => write!(
                f,
                "failed to allocate shared region of {size} bytes aligned to {alignment}"
            ),
            MailboxError::OutOfBounds { addr, len, size } => write!(
                f,
                "access of {len} bytes at {addr:#08x} exceeds guest memory of {size} bytes"
            ),
            MailboxError::RegionTooSmall { size, required } => write!(
                f,
                "guest memory of {size} bytes cannot hold the mailbox (needs {required})"
            ),
            MailboxError::InvalidRing { index } => write!(f, "ring index {index} out of range"),
            MailboxError::ConsumerBusy { ring } => {
                write!(f, "ring {ring} already has a live consumer")
            }
        }
    }
}

impl std::error::Error for MailboxError {}
