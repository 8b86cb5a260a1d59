//! Register-file front end to a [`Coprocessor`].
//!
//! Parameters are written into 32-bit registers and a command code into
//! `CMD`. Byte-wide accesses at any offset inside a register are supported
//! for 8-bit hosts; a command runs when byte 0 of `CMD` is written.

use std::sync::Arc;

use coproc_abi::command::{
    is_register, CmdStatus, CommandCode, COPROC_BASE, COPROC_CMD, COPROC_CMD_ERROR,
    COPROC_CMD_STATUS, COPROC_CPU_TYPE, COPROC_NAME_PTR, COPROC_OP, COPROC_REQ_LEN,
    COPROC_REQ_PTR, COPROC_RESP_CAP, COPROC_RESP_PTR, COPROC_TICKET, COPROC_TICKET_STATUS,
    COPROC_TIMEOUT, COPROC_WORKER_STATE, MAX_NAME_LEN,
};
use coproc_abi::{CoprocError, CoprocResult, CpuFamily, ErrorCode, SubmitRequest, TicketId, TicketStatus};
use tracing::{debug, trace};

use crate::Coprocessor;

#[derive(Clone, Copy, Debug, Default)]
struct Registers {
    cmd: u32,
    cpu_type: u32,
    cmd_status: u32,
    cmd_error: u32,
    ticket: u32,
    ticket_status: u32,
    op: u32,
    req_ptr: u32,
    req_len: u32,
    resp_ptr: u32,
    resp_cap: u32,
    timeout: u32,
    name_ptr: u32,
}

impl Registers {
    fn get(&self, reg: u32) -> Option<u32> {
        Some(match reg {
            COPROC_CMD => self.cmd,
            COPROC_CPU_TYPE => self.cpu_type,
            COPROC_CMD_STATUS => self.cmd_status,
            COPROC_CMD_ERROR => self.cmd_error,
            COPROC_TICKET => self.ticket,
            COPROC_TICKET_STATUS => self.ticket_status,
            COPROC_OP => self.op,
            COPROC_REQ_PTR => self.req_ptr,
            COPROC_REQ_LEN => self.req_len,
            COPROC_RESP_PTR => self.resp_ptr,
            COPROC_RESP_CAP => self.resp_cap,
            COPROC_TIMEOUT => self.timeout,
            COPROC_NAME_PTR => self.name_ptr,
            _ => return None,
        })
    }

    fn slot(&mut self, reg: u32) -> Option<&mut u32> {
        Some(match reg {
            COPROC_CMD => &mut self.cmd,
            COPROC_CPU_TYPE => &mut self.cpu_type,
            COPROC_CMD_STATUS => &mut self.cmd_status,
            COPROC_CMD_ERROR => &mut self.cmd_error,
            COPROC_TICKET => &mut self.ticket,
            COPROC_TICKET_STATUS => &mut self.ticket_status,
            COPROC_OP => &mut self.op,
            COPROC_REQ_PTR => &mut self.req_ptr,
            COPROC_REQ_LEN => &mut self.req_len,
            COPROC_RESP_PTR => &mut self.resp_ptr,
            COPROC_RESP_CAP => &mut self.resp_cap,
            COPROC_TIMEOUT => &mut self.timeout,
            COPROC_NAME_PTR => &mut self.name_ptr,
            _ => return None,
        })
    }
}

/// Host-writable registers; the rest are results or live state.
fn is_writable(reg: u32) -> bool {
    !matches!(
        reg,
        COPROC_CMD_STATUS | COPROC_CMD_ERROR | COPROC_TICKET_STATUS | COPROC_WORKER_STATE
    )
}

pub struct CommandSurface {
    coproc: Arc<Coprocessor>,
    regs: Registers,
}

impl CommandSurface {
    pub fn new(coproc: Arc<Coprocessor>) -> Self {
        Self {
            coproc,
            regs: Registers::default(),
        }
    }

    pub fn coprocessor(&self) -> &Arc<Coprocessor> {
        &self.coproc
    }

    /// Value of the aligned register `reg`; `WORKER_STATE` is read live.
    fn register(&self, reg: u32) -> u32 {
        if reg == COPROC_WORKER_STATE {
            return self.coproc.worker_state().bits();
        }
        self.regs.get(reg).unwrap_or(0)
    }

    pub fn read32(&self, addr: u32) -> u32 {
        if !is_register(addr) {
            return 0;
        }
        let reg = addr & !3;
        if addr == reg {
            self.register(reg)
        } else {
            // Unaligned: assemble from byte reads so it may straddle registers.
            u32::from_le_bytes(std::array::from_fn(|i| self.read8(addr + i as u32)))
        }
    }

    pub fn read8(&self, addr: u32) -> u8 {
        if !is_register(addr) {
            return 0;
        }
        let reg = addr & !3;
        let shift = (addr - reg) * 8;
        (self.register(reg) >> shift) as u8
    }

    pub fn write32(&mut self, addr: u32, value: u32) {
        if !is_register(addr) {
            return;
        }
        if addr & 3 != 0 {
            for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
                self.write8(addr + i as u32, byte);
            }
            return;
        }
        if !is_writable(addr) {
            return;
        }
        if let Some(slot) = self.regs.slot(addr) {
            *slot = value;
        }
        if addr == COPROC_CMD {
            self.dispatch();
        }
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        if !is_register(addr) {
            return;
        }
        let reg = addr & !3;
        if !is_writable(reg) {
            return;
        }
        let shift = (addr - reg) * 8;
        if let Some(slot) = self.regs.slot(reg) {
            *slot = (*slot & !(0xFF << shift)) | (u32::from(value) << shift);
        }
        if addr == COPROC_CMD {
            self.dispatch();
        }
    }

    fn dispatch(&mut self) {
        let code = self.regs.cmd;
        trace!(code, "coprocessor command");
        let result = match CommandCode::from_u32(code) {
            Some(CommandCode::Start) => self.cmd_start(),
            Some(CommandCode::Stop) => self.cmd_stop(),
            Some(CommandCode::Enqueue) => self.cmd_enqueue(),
            Some(CommandCode::Poll) => self.cmd_poll(),
            Some(CommandCode::Wait) => self.cmd_wait(),
            None => {
                debug!(code, "unknown coprocessor command");
                self.regs.cmd_status = CmdStatus::Error as u32;
                self.regs.cmd_error = ErrorCode::None.as_u32();
                return;
            }
        };
        match result {
            Ok(()) => {
                self.regs.cmd_status = CmdStatus::Ok as u32;
                self.regs.cmd_error = ErrorCode::None.as_u32();
            }
            Err(err) => {
                debug!(code, %err, "coprocessor command failed");
                self.regs.cmd_status = CmdStatus::Error as u32;
                self.regs.cmd_error = err.code().as_u32();
            }
        }
    }

    fn family(&self) -> CoprocResult<CpuFamily> {
        CpuFamily::from_raw(self.regs.cpu_type)
    }

    fn service_name(&self) -> CoprocResult<String> {
        let ptr = self.regs.name_ptr;
        let bytes = self
            .coproc
            .memory()
            .read_cstr(ptr, MAX_NAME_LEN)
            .map_err(|_| CoprocError::PathInvalid(format!("name at {ptr:#x}")))?;
        String::from_utf8(bytes).map_err(|_| CoprocError::PathInvalid(format!("name at {ptr:#x}")))
    }

    fn cmd_start(&mut self) -> CoprocResult<()> {
        let family = self.family()?;
        let name = self.service_name()?;
        self.coproc.start(family, &name)
    }

    fn cmd_stop(&mut self) -> CoprocResult<()> {
        self.coproc.stop(self.family()?)
    }

    fn cmd_enqueue(&mut self) -> CoprocResult<()> {
        self.regs.ticket = 0;
        let request = SubmitRequest::new(self.family()?, self.regs.op)
            .source(self.regs.req_ptr, self.regs.req_len)
            .destination(self.regs.resp_ptr, self.regs.resp_cap);
        self.regs.ticket = self.coproc.submit(request)?.raw();
        Ok(())
    }

    fn cmd_poll(&mut self) -> CoprocResult<()> {
        let outcome = self.coproc.status(TicketId(self.regs.ticket));
        self.publish_status(outcome)
    }

    fn cmd_wait(&mut self) -> CoprocResult<()> {
        let outcome = self.coproc.wait(TicketId(self.regs.ticket), self.regs.timeout);
        self.publish_status(outcome)
    }

    fn publish_status(&mut self, outcome: CoprocResult<TicketStatus>) -> CoprocResult<()> {
        match outcome {
            Ok(status) => {
                self.regs.ticket_status = status.code();
                Ok(())
            }
            Err(err) => {
                self.regs.ticket_status = TicketStatus::Error.code();
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for CommandSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSurface")
            .field("base", &format_args!("{COPROC_BASE:#x}"))
            .field("regs", &self.regs)
            .finish()
    }
}
