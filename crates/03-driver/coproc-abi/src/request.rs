use std::fmt;

use serde::Serialize;

use crate::CpuFamily;

/// Opaque handle correlating a submission with its eventual response.
///
/// Never zero: the command surface reports ticket 0 for failed submissions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TicketId(pub u32);

impl TicketId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Arguments of a `submit` call. Pointers are bus addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmitRequest {
    pub family: CpuFamily,
    pub op: u32,
    pub src_ptr: u32,
    pub src_len: u32,
    pub dst_ptr: u32,
    pub dst_cap: u32,
}

impl SubmitRequest {
    pub fn new(family: CpuFamily, op: u32) -> Self {
        Self {
            family,
            op,
            src_ptr: 0,
            src_len: 0,
            dst_ptr: 0,
            dst_cap: 0,
        }
    }

    pub fn source(mut self, ptr: u32, len: u32) -> Self {
        self.src_ptr = ptr;
        self.src_len = len;
        self
    }

    pub fn destination(mut self, ptr: u32, cap: u32) -> Self {
        self.dst_ptr = ptr;
        self.dst_cap = cap;
        self
    }
}
