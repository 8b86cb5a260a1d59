//! Natively implemented worker services.
//!
//! These stand in for service binaries running on an emulated CPU: they
//! consume the family's ring exactly as a guest service loop would and are
//! what the scenario tests and the CLI talk to.

use std::sync::Arc;

use coproc_abi::CpuFamily;
use log::{debug, trace};
use mailbox::{GuestMemory, MailboxResult, RequestDescriptor};
use worker_runtime::{
    CoreFactory, RuntimeResult, ServiceHandler, ServiceLoop, ServiceReply, WorkerContext,
    WorkerCore,
};

pub const OP_ADD: u32 = 1;
pub const OP_COPY: u32 = 2;
pub const OP_CHECKSUM: u32 = 3;

/// Source too short or destination too small.
pub const RESULT_BAD_ARGS: u32 = 1;
/// A buffer pointer falls outside guest memory.
pub const RESULT_BAD_POINTER: u32 = 2;
pub const RESULT_UNKNOWN_OP: u32 = 0xFFFF_FFFF;

/// Op table shared by every reference worker.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceServices;

impl ReferenceServices {
    fn add(request: &RequestDescriptor, memory: &GuestMemory) -> MailboxResult<ServiceReply> {
        if request.src_len < 8 || request.dst_cap < 4 {
            return Ok(ServiceReply::error(RESULT_BAD_ARGS));
        }
        let a = memory.read_u32(request.src_ptr)?;
        let b = memory.read_u32(request.src_ptr.wrapping_add(4))?;
        memory.write_u32(request.dst_ptr, a.wrapping_add(b))?;
        Ok(ServiceReply::ok(4))
    }

    fn copy(request: &RequestDescriptor, memory: &GuestMemory) -> MailboxResult<ServiceReply> {
        let len = request.src_len.min(request.dst_cap);
        if len as usize > memory.size() {
            return Ok(ServiceReply::error(RESULT_BAD_POINTER));
        }
        let mut buf = vec![0u8; len as usize];
        memory.read_bytes(request.src_ptr, &mut buf)?;
        memory.write_bytes(request.dst_ptr, &buf)?;
        Ok(ServiceReply::ok(len))
    }

    fn checksum(request: &RequestDescriptor, memory: &GuestMemory) -> MailboxResult<ServiceReply> {
        if request.dst_cap < 4 {
            return Ok(ServiceReply::error(RESULT_BAD_ARGS));
        }
        if request.src_len as usize > memory.size() {
            return Ok(ServiceReply::error(RESULT_BAD_POINTER));
        }
        let mut buf = vec![0u8; request.src_len as usize];
        memory.read_bytes(request.src_ptr, &mut buf)?;
        let sum = buf
            .iter()
            .fold(0u32, |acc, &byte| acc.wrapping_add(u32::from(byte)));
        memory.write_u32(request.dst_ptr, sum)?;
        Ok(ServiceReply::ok(4))
    }
}

impl ServiceHandler for ReferenceServices {
    fn handle(&mut self, request: &RequestDescriptor, memory: &GuestMemory) -> ServiceReply {
        let outcome = match request.op {
            OP_ADD => Self::add(request, memory),
            OP_COPY => Self::copy(request, memory),
            OP_CHECKSUM => Self::checksum(request, memory),
            other => {
                debug!("ticket {} requested unknown op {other}", request.ticket);
                return ServiceReply::error(RESULT_UNKNOWN_OP);
            }
        };
        outcome.unwrap_or_else(|err| {
            debug!("ticket {} op {}: {err}", request.ticket, request.op);
            ServiceReply::error(RESULT_BAD_POINTER)
        })
    }
}

/// Builds a [`ServiceLoop`] over [`ReferenceServices`] for any family.
#[derive(Clone, Debug, Default)]
pub struct ReferenceFactory {
    families: Option<Arc<[CpuFamily]>>,
}

impl ReferenceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the factory to `families`; other families fail to start.
    pub fn only(families: impl Into<Arc<[CpuFamily]>>) -> Self {
        Self {
            families: Some(families.into()),
        }
    }

    fn supports(&self, family: CpuFamily) -> bool {
        self.families
            .as_deref()
            .map_or(true, |allowed| allowed.contains(&family))
    }
}

impl CoreFactory for ReferenceFactory {
    fn create(&self, ctx: WorkerContext) -> RuntimeResult<Box<dyn WorkerCore>> {
        if !self.supports(ctx.family) {
            return Err(worker_runtime::RuntimeError::core(format!(
                "no reference core for {}",
                ctx.family
            )));
        }
        trace!(
            "reference core for {} (image {} bytes, pc {:#x}, generation {})",
            ctx.family,
            ctx.image.len(),
            ctx.entry.pc,
            ctx.generation
        );
        Ok(Box::new(ServiceLoop::new(
            ctx.family.label(),
            ctx.consumer,
            ReferenceServices,
        )))
    }
}
