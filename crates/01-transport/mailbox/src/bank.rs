//! 16-bit address views for the 8-bit worker families.
//!
//! A 6502 or Z80 worker sees 64 KiB: CPU address `a` maps to `bank_base + a`,
//! except `$2000..$3FFF`, which is a window onto the shared mailbox so the
//! worker can reach its ring with plain loads and stores.

use crate::layout::MAILBOX_BASE;
use crate::{GuestMemory, MailboxResult};

/// First CPU address of the mailbox window.
pub const BANK_MAILBOX_START: u16 = 0x2000;
/// One past the last CPU address of the mailbox window.
pub const BANK_MAILBOX_END: u16 = 0x4000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BankedAddressSpace {
    bank_base: u32,
    mailbox_base: u32,
}

impl BankedAddressSpace {
    pub fn new(bank_base: u32) -> Self {
        Self {
            bank_base,
            mailbox_base: MAILBOX_BASE,
        }
    }

    /// Bus address backing CPU address `addr`.
    pub fn translate(&self, addr: u16) -> u32 {
        if (BANK_MAILBOX_START..BANK_MAILBOX_END).contains(&addr) {
            self.mailbox_base + u32::from(addr - BANK_MAILBOX_START)
        } else {
            self.bank_base + u32::from(addr)
        }
    }

    pub fn read_u8(&self, memory: &GuestMemory, addr: u16) -> MailboxResult<u8> {
        memory.read_u8(self.translate(addr))
    }

    pub fn write_u8(&self, memory: &GuestMemory, addr: u16, value: u8) -> MailboxResult<()> {
        memory.write_u8(self.translate(addr), value)
    }

    /// Little-endian 16-bit read; each byte is translated on its own.
    pub fn read_u16(&self, memory: &GuestMemory, addr: u16) -> MailboxResult<u16> {
        let lo = self.read_u8(memory, addr)?;
        let hi = self.read_u8(memory, addr.wrapping_add(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    pub fn write_u16(&self, memory: &GuestMemory, addr: u16, value: u16) -> MailboxResult<()> {
        let [lo, hi] = value.to_le_bytes();
        self.write_u8(memory, addr, lo)?;
        self.write_u8(memory, addr.wrapping_add(1), hi)
    }
}
