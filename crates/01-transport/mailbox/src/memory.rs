//! Flat guest address space shared by the host and every worker.
//!
//! All bytes are accessed as `AtomicU8`, so a worker thread writing a response
//! while the host reads a neighbouring slot is never a data race. Bulk payload
//! traffic uses relaxed ordering; publication happens through the ring cursors,
//! which use acquire/release (see [`crate::ring`]).

use crate::layout::{GUEST_MEMORY_SIZE, MAILBOX_BASE, MAILBOX_SIZE};
use crate::region::SharedRegion;
use crate::{MailboxError, MailboxResult};
use std::sync::atomic::{AtomicU8, Ordering};

const MEMORY_ALIGNMENT: usize = 4096;

/// Byte-addressable bus memory backed by a [`SharedRegion`].
#[derive(Debug)]
pub struct GuestMemory {
    region: SharedRegion,
}

// SAFETY: every access goes through `AtomicU8` views of the region; no `&mut`
// aliasing of the bytes is ever created.
unsafe impl Send for GuestMemory {}
// SAFETY: as above.
unsafe impl Sync for GuestMemory {}

impl GuestMemory {
    /// Allocates `size` bytes of zeroed guest memory.
    ///
    /// The memory must be large enough to contain the mailbox block.
    pub fn new(size: usize) -> MailboxResult<Self> {
        let required = (MAILBOX_BASE + MAILBOX_SIZE) as usize;
        if size < required {
            return Err(MailboxError::RegionTooSmall { size, required });
        }
        let region = SharedRegion::new_zeroed(size, MEMORY_ALIGNMENT)?;
        Ok(Self { region })
    }

    /// Allocates the default 16 MiB bus.
    pub fn with_default_size() -> MailboxResult<Self> {
        Self::new(GUEST_MEMORY_SIZE)
    }

    /// Size of the address space in bytes.
    pub fn size(&self) -> usize {
        self.region.len()
    }

    fn cells(&self) -> &[AtomicU8] {
        // SAFETY: `AtomicU8` has the same layout as `u8`; the region is live for
        // `'self` and spans exactly `len` bytes.
        unsafe {
            std::slice::from_raw_parts(self.region.as_ptr() as *const AtomicU8, self.region.len())
        }
    }

    fn range(&self, addr: u32, len: usize) -> MailboxResult<&[AtomicU8]> {
        let start = addr as usize;
        let size = self.size();
        match start.checked_add(len) {
            Some(end) if end <= size => Ok(&self.cells()[start..end]),
            _ => Err(MailboxError::OutOfBounds { addr, len, size }),
        }
    }

    /// Returns the cell at a mailbox address.
    ///
    /// `new` guarantees the mailbox block is inside the region, so addresses
    /// derived from a [`crate::RingLayout`] never miss.
    pub(crate) fn mailbox_cell(&self, addr: u32) -> &AtomicU8 {
        debug_assert!((MAILBOX_BASE..MAILBOX_BASE + MAILBOX_SIZE).contains(&addr));
        &self.cells()[addr as usize]
    }

    pub(crate) fn mailbox_read(&self, addr: u32, buf: &mut [u8]) {
        let start = addr as usize;
        let end = start + buf.len();
        for (dst, cell) in buf.iter_mut().zip(&self.cells()[start..end]) {
            *dst = cell.load(Ordering::Relaxed);
        }
    }

    pub(crate) fn mailbox_write(&self, addr: u32, data: &[u8]) {
        let start = addr as usize;
        for (cell, byte) in self.cells()[start..start + data.len()].iter().zip(data) {
            cell.store(*byte, Ordering::Relaxed);
        }
    }

    /// Reads one byte.
    pub fn read_u8(&self, addr: u32) -> MailboxResult<u8> {
        Ok(self.range(addr, 1)?[0].load(Ordering::Relaxed))
    }

    /// Writes one byte.
    pub fn write_u8(&self, addr: u32, value: u8) -> MailboxResult<()> {
        self.range(addr, 1)?[0].store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&self, addr: u32) -> MailboxResult<u32> {
        let mut bytes = [0u8; 4];
        self.read_bytes(addr, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Writes a little-endian `u32`.
    pub fn write_u32(&self, addr: u32, value: u32) -> MailboxResult<()> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    /// Copies `buf.len()` bytes starting at `addr` into `buf`.
    pub fn read_bytes(&self, addr: u32, buf: &mut [u8]) -> MailboxResult<()> {
        let cells = self.range(addr, buf.len())?;
        for (dst, cell) in buf.iter_mut().zip(cells) {
            *dst = cell.load(Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copies `data` into guest memory starting at `addr`.
    pub fn write_bytes(&self, addr: u32, data: &[u8]) -> MailboxResult<()> {
        let cells = self.range(addr, data.len())?;
        for (cell, byte) in cells.iter().zip(data) {
            cell.store(*byte, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Sets `len` bytes starting at `addr` to `value`.
    pub fn fill(&self, addr: u32, len: usize, value: u8) -> MailboxResult<()> {
        for cell in self.range(addr, len)? {
            cell.store(value, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Reads a NUL-terminated byte string of at most `max_len` bytes.
    ///
    /// Reading stops at the terminator, at `max_len`, or at the end of memory.
    pub fn read_cstr(&self, addr: u32, max_len: usize) -> MailboxResult<Vec<u8>> {
        let start = addr as usize;
        if start >= self.size() {
            return Err(MailboxError::OutOfBounds {
                addr,
                len: 1,
                size: self.size(),
            });
        }
        let out = self.cells()[start..]
            .iter()
            .take(max_len)
            .map(|cell| cell.load(Ordering::Relaxed))
            .take_while(|byte| *byte != 0)
            .collect();
        Ok(out)
    }
}
