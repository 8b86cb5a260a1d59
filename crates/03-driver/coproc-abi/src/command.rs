//! Register map of the coprocessor command surface.
//!
//! The host runtime drives the coprocessor by writing parameters into 32-bit
//! registers and then writing a command code into `CMD`. Results come back in
//! `CMD_STATUS`, `CMD_ERROR`, `TICKET` and `TICKET_STATUS`.

pub const COPROC_BASE: u32 = 0xF_2340;

pub const COPROC_CMD: u32 = COPROC_BASE + 0x00;
pub const COPROC_CPU_TYPE: u32 = COPROC_BASE + 0x04;
pub const COPROC_CMD_STATUS: u32 = COPROC_BASE + 0x08;
pub const COPROC_CMD_ERROR: u32 = COPROC_BASE + 0x0C;
pub const COPROC_TICKET: u32 = COPROC_BASE + 0x10;
pub const COPROC_TICKET_STATUS: u32 = COPROC_BASE + 0x14;
pub const COPROC_OP: u32 = COPROC_BASE + 0x18;
pub const COPROC_REQ_PTR: u32 = COPROC_BASE + 0x1C;
pub const COPROC_REQ_LEN: u32 = COPROC_BASE + 0x20;
pub const COPROC_RESP_PTR: u32 = COPROC_BASE + 0x24;
pub const COPROC_RESP_CAP: u32 = COPROC_BASE + 0x28;
pub const COPROC_TIMEOUT: u32 = COPROC_BASE + 0x2C;
pub const COPROC_NAME_PTR: u32 = COPROC_BASE + 0x30;
/// Read-only bitmask of running workers.
pub const COPROC_WORKER_STATE: u32 = COPROC_BASE + 0x34;

pub const COPROC_END: u32 = COPROC_BASE + 0x3F;

/// Longest service name read from `NAME_PTR`.
pub const MAX_NAME_LEN: usize = 255;

/// Command codes written to `CMD`.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandCode {
    Start = 1,
    Stop = 2,
    Enqueue = 3,
    Poll = 4,
    Wait = 5,
}

impl CommandCode {
    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            1 => CommandCode::Start,
            2 => CommandCode::Stop,
            3 => CommandCode::Enqueue,
            4 => CommandCode::Poll,
            5 => CommandCode::Wait,
            _ => return None,
        })
    }
}

/// Values of `CMD_STATUS`.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmdStatus {
    Ok = 0,
    Error = 1,
}

/// True when `addr` falls inside the register block.
pub fn is_register(addr: u32) -> bool {
    (COPROC_BASE..=COPROC_END).contains(&addr)
}
