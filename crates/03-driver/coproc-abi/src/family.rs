use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{CoprocError, CoprocResult};

/// Executor type 0: no CPU selected.
pub const EXEC_TYPE_NONE: u32 = 0;
/// Executor type 2 (IE64) is known to the host but cannot run as a coprocessor.
pub const EXEC_TYPE_IE64: u32 = 2;

/// Instruction-set families that can run as coprocessor workers.
///
/// Discriminants are the host's executor type numbers, which is what the
/// `CPU_TYPE` register carries.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CpuFamily {
    Ie32 = 1,
    Mos6502 = 3,
    M68k = 4,
    Z80 = 5,
    X86 = 6,
}

impl CpuFamily {
    /// Every family, in mailbox ring order.
    pub const ALL: [CpuFamily; 5] = [
        CpuFamily::Ie32,
        CpuFamily::Mos6502,
        CpuFamily::M68k,
        CpuFamily::Z80,
        CpuFamily::X86,
    ];

    pub fn from_raw(raw: u32) -> CoprocResult<Self> {
        match raw {
            1 => Ok(CpuFamily::Ie32),
            3 => Ok(CpuFamily::Mos6502),
            4 => Ok(CpuFamily::M68k),
            5 => Ok(CpuFamily::Z80),
            6 => Ok(CpuFamily::X86),
            other => Err(CoprocError::InvalidCpu(other)),
        }
    }

    pub fn as_raw(self) -> u32 {
        self as u32
    }

    /// Index of this family's ring block inside the mailbox.
    pub fn ring_index(self) -> usize {
        match self {
            CpuFamily::Ie32 => 0,
            CpuFamily::Mos6502 => 1,
            CpuFamily::M68k => 2,
            CpuFamily::Z80 => 3,
            CpuFamily::X86 => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CpuFamily::Ie32 => "IE32",
            CpuFamily::Mos6502 => "6502",
            CpuFamily::M68k => "M68K",
            CpuFamily::Z80 => "Z80",
            CpuFamily::X86 => "X86",
        }
    }

    /// Reserved bus window the service image is loaded into.
    pub fn load_window(self) -> LoadWindow {
        let (base, end) = match self {
            CpuFamily::Ie32 => (0x20_0000, 0x27_FFFF),
            CpuFamily::M68k => (0x28_0000, 0x2F_FFFF),
            CpuFamily::Mos6502 => (0x30_0000, 0x30_FFFF),
            CpuFamily::Z80 => (0x31_0000, 0x31_FFFF),
            CpuFamily::X86 => (0x32_0000, 0x39_FFFF),
        };
        LoadWindow { base, end }
    }

    /// 8-bit families address a banked 64 KiB view with a mailbox window.
    pub fn is_banked(self) -> bool {
        matches!(self, CpuFamily::Mos6502 | CpuFamily::Z80)
    }

    /// Register state a freshly started worker begins executing with.
    pub fn entry_state(self) -> EntryState {
        let window = self.load_window();
        match self {
            CpuFamily::Ie32 | CpuFamily::M68k => EntryState {
                pc: window.base,
                sp: Some(window.end - 0xFF),
                reset_vector: None,
            },
            CpuFamily::X86 => EntryState {
                pc: window.base,
                sp: None,
                reset_vector: None,
            },
            CpuFamily::Z80 => EntryState {
                pc: 0x0000,
                sp: None,
                reset_vector: None,
            },
            CpuFamily::Mos6502 => EntryState {
                pc: 0x0000,
                sp: None,
                reset_vector: Some(0xFFFC),
            },
        }
    }
}

impl fmt::Display for CpuFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CpuFamily {
    type Err = CoprocError;

    /// Accepts a label (`6502`, `z80`, `ie32`, ...) or a raw executor type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(raw) = s.parse::<u32>() {
            // "6502" parses as a number too; labels win over raw types.
            if raw != 6502 {
                return CpuFamily::from_raw(raw);
            }
        }
        CpuFamily::ALL
            .into_iter()
            .find(|family| family.label().eq_ignore_ascii_case(s))
            .ok_or(CoprocError::InvalidCpu(u32::MAX))
    }
}

/// Inclusive bus address range reserved for one family's image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LoadWindow {
    pub base: u32,
    pub end: u32,
}

impl LoadWindow {
    pub fn size(&self) -> usize {
        (self.end - self.base + 1) as usize
    }

    pub fn contains(&self, addr: u32) -> bool {
        (self.base..=self.end).contains(&addr)
    }
}

/// Initial program counter, stack pointer and reset vector for a worker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EntryState {
    /// Program counter in the worker's own address space.
    pub pc: u32,
    pub sp: Option<u32>,
    /// CPU address of a reset vector that must point at `pc`.
    pub reset_vector: Option<u16>,
}
