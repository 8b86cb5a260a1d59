use std::fmt;

use serde::Serialize;

use crate::CpuFamily;

/// Lifecycle of a submitted request as seen by the host.
///
/// `Pending` and `Running` may still change; the rest are terminal and are
/// subject to the two-read eviction rule.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TicketStatus {
    Pending = 0,
    Running = 1,
    Ok = 2,
    Error = 3,
    Timeout = 4,
    WorkerDown = 5,
}

impl TicketStatus {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => TicketStatus::Pending,
            1 => TicketStatus::Running,
            2 => TicketStatus::Ok,
            3 => TicketStatus::Error,
            4 => TicketStatus::Timeout,
            5 => TicketStatus::WorkerDown,
            _ => return None,
        })
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, TicketStatus::Pending | TicketStatus::Running)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketStatus::Pending => "PENDING",
            TicketStatus::Running => "RUNNING",
            TicketStatus::Ok => "OK",
            TicketStatus::Error => "ERROR",
            TicketStatus::Timeout => "TIMEOUT",
            TicketStatus::WorkerDown => "WORKER_DOWN",
        };
        f.write_str(name)
    }
}

/// Bitmask of running workers; bit `n` is set for executor type `n`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WorkerState(pub u32);

impl WorkerState {
    pub fn with(mut self, family: CpuFamily) -> Self {
        self.0 |= 1 << family.as_raw();
        self
    }

    pub fn is_running(self, family: CpuFamily) -> bool {
        self.0 & (1 << family.as_raw()) != 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl FromIterator<CpuFamily> for WorkerState {
    fn from_iter<I: IntoIterator<Item = CpuFamily>>(iter: I) -> Self {
        iter.into_iter().fold(WorkerState::default(), WorkerState::with)
    }
}
