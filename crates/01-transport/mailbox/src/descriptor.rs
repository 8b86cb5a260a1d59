//! Fixed-size request/response records stored in ring slots.

use crate::layout::{
    REQ_CPU_TYPE_OFF, REQ_DESC_SIZE, REQ_DST_CAP_OFF, REQ_DST_PTR_OFF, REQ_FLAGS_OFF, REQ_OP_OFF,
    REQ_SRC_LEN_OFF, REQ_SRC_PTR_OFF, REQ_TICKET_OFF, RESP_DESC_SIZE, RESP_LEN_OFF,
    RESP_RESULT_CODE_OFF, RESP_STATUS_OFF, RESP_TICKET_OFF,
};

const REQ_LEN: usize = REQ_DESC_SIZE as usize;
const RESP_LEN: usize = RESP_DESC_SIZE as usize;

/// Work item written by the host into `entries[slot]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub ticket: u32,
    pub cpu_type: u32,
    /// Operation code; only the low byte is significant to 8-bit workers.
    pub op: u32,
    pub flags: u32,
    pub src_ptr: u32,
    pub src_len: u32,
    pub dst_ptr: u32,
    pub dst_cap: u32,
}

impl RequestDescriptor {
    pub fn encode(&self) -> [u8; REQ_LEN] {
        let mut out = [0u8; REQ_LEN];
        put_u32(&mut out, REQ_TICKET_OFF, self.ticket);
        put_u32(&mut out, REQ_CPU_TYPE_OFF, self.cpu_type);
        put_u32(&mut out, REQ_OP_OFF, self.op);
        put_u32(&mut out, REQ_FLAGS_OFF, self.flags);
        put_u32(&mut out, REQ_SRC_PTR_OFF, self.src_ptr);
        put_u32(&mut out, REQ_SRC_LEN_OFF, self.src_len);
        put_u32(&mut out, REQ_DST_PTR_OFF, self.dst_ptr);
        put_u32(&mut out, REQ_DST_CAP_OFF, self.dst_cap);
        out
    }

    pub fn decode(bytes: &[u8; REQ_LEN]) -> Self {
        Self {
            ticket: get_u32(bytes, REQ_TICKET_OFF),
            cpu_type: get_u32(bytes, REQ_CPU_TYPE_OFF),
            op: get_u32(bytes, REQ_OP_OFF),
            flags: get_u32(bytes, REQ_FLAGS_OFF),
            src_ptr: get_u32(bytes, REQ_SRC_PTR_OFF),
            src_len: get_u32(bytes, REQ_SRC_LEN_OFF),
            dst_ptr: get_u32(bytes, REQ_DST_PTR_OFF),
            dst_cap: get_u32(bytes, REQ_DST_CAP_OFF),
        }
    }
}

/// Completion record written by a worker into `responses[slot]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResponseDescriptor {
    /// Echo of the request's ticket.
    pub ticket: u32,
    /// Wire status, see [`crate::layout::RESP_STATUS_OK`].
    pub status: u32,
    pub result_code: u32,
    /// Bytes actually written to the destination buffer.
    pub resp_len: u32,
}

impl ResponseDescriptor {
    pub fn encode(&self) -> [u8; RESP_LEN] {
        let mut out = [0u8; RESP_LEN];
        put_u32(&mut out, RESP_TICKET_OFF, self.ticket);
        put_u32(&mut out, RESP_STATUS_OFF, self.status);
        put_u32(&mut out, RESP_RESULT_CODE_OFF, self.result_code);
        put_u32(&mut out, RESP_LEN_OFF, self.resp_len);
        out
    }

    pub fn decode(bytes: &[u8; RESP_LEN]) -> Self {
        Self {
            ticket: get_u32(bytes, RESP_TICKET_OFF),
            status: get_u32(bytes, RESP_STATUS_OFF),
            result_code: get_u32(bytes, RESP_RESULT_CODE_OFF),
            resp_len: get_u32(bytes, RESP_LEN_OFF),
        }
    }
}

fn put_u32(buf: &mut [u8], offset: u32, value: u32) {
    let at = offset as usize;
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn get_u32(buf: &[u8], offset: u32) -> u32 {
    let at = offset as usize;
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}
