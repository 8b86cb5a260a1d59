//! Driving the core through the MMIO register file, as a guest program would.

use std::sync::Arc;
use std::time::{Duration, Instant};

use coproc::{CommandSurface, CpuFamily, TicketStatus};
use coproc_abi::command::*;
use coproc_abi::ErrorCode;

use crate::support::{Rig, DST, SRC};

const NAME: u32 = 0x0F_0000;

fn surface() -> (Rig, CommandSurface) {
    let rig = Rig::new();
    let surface = CommandSurface::new(Arc::clone(&rig.coproc));
    (rig, surface)
}

fn command(s: &mut CommandSurface, code: CommandCode) -> (u32, u32) {
    s.write32(COPROC_CMD, code as u32);
    (s.read32(COPROC_CMD_STATUS), s.read32(COPROC_CMD_ERROR))
}

fn start(rig: &Rig, s: &mut CommandSurface, cpu: u32, name: &str) -> (u32, u32) {
    rig.memory().write_bytes(NAME, name.as_bytes()).unwrap();
    rig.memory().write_u8(NAME + name.len() as u32, 0).unwrap();
    s.write32(COPROC_CPU_TYPE, cpu);
    s.write32(COPROC_NAME_PTR, NAME);
    command(s, CommandCode::Start)
}

/// Start, enqueue, wait and poll with 32-bit register accesses.
#[test]
fn add_round_trip() {
    let (rig, mut s) = surface();
    assert_eq!(start(&rig, &mut s, 3, "svc_add"), (CmdStatus::Ok as u32, 0));
    assert_eq!(s.read32(COPROC_WORKER_STATE), 1 << 3);

    rig.memory().write_u32(SRC, 10).unwrap();
    rig.memory().write_u32(SRC + 4, 20).unwrap();
    s.write32(COPROC_OP, 1);
    s.write32(COPROC_REQ_PTR, SRC);
    s.write32(COPROC_REQ_LEN, 8);
    s.write32(COPROC_RESP_PTR, DST);
    s.write32(COPROC_RESP_CAP, 16);
    assert_eq!(command(&mut s, CommandCode::Enqueue), (0, 0));
    let ticket = s.read32(COPROC_TICKET);
    assert_ne!(ticket, 0);

    s.write32(COPROC_TIMEOUT, 5000);
    assert_eq!(command(&mut s, CommandCode::Wait), (0, 0));
    assert_eq!(s.read32(COPROC_TICKET_STATUS), TicketStatus::Ok.code());
    assert_eq!(rig.memory().read_u32(DST).unwrap(), 30);

    assert_eq!(command(&mut s, CommandCode::Poll), (0, 0));
    assert_eq!(command(&mut s, CommandCode::Poll), (0, 0));
    assert_eq!(s.read32(COPROC_TICKET_STATUS), TicketStatus::Ok.code());

    // Third poll: evicted.
    assert_eq!(
        command(&mut s, CommandCode::Poll),
        (CmdStatus::Error as u32, ErrorCode::StaleTicket.as_u32())
    );
    assert_eq!(s.read32(COPROC_TICKET_STATUS), TicketStatus::Error.code());
}

/// An 8-bit host builds registers a byte at a time; only byte 0 of CMD fires.
#[test]
fn byte_wide_access() {
    let (rig, mut s) = surface();
    rig.memory().write_bytes(NAME, b"svc_add\0").unwrap();
    for (i, byte) in NAME.to_le_bytes().into_iter().enumerate() {
        s.write8(COPROC_NAME_PTR + i as u32, byte);
    }
    assert_eq!(s.read32(COPROC_NAME_PTR), NAME);
    assert_eq!(s.read8(COPROC_NAME_PTR + 2), 0x0F);

    s.write8(COPROC_CPU_TYPE, 5);
    s.write8(COPROC_CMD + 1, 0);
    assert!(!rig.coproc.is_running(CpuFamily::Z80));
    s.write8(COPROC_CMD, CommandCode::Start as u8);
    assert_eq!(s.read8(COPROC_CMD_STATUS), 0);
    assert!(rig.coproc.is_running(CpuFamily::Z80));
    assert_eq!(s.read8(COPROC_WORKER_STATE), 1 << 5);
    assert_eq!(s.read8(COPROC_WORKER_STATE + 1), 0);
    // Unaligned reads of the live register shift like every other register.
    assert_eq!(s.read32(COPROC_WORKER_STATE + 1), 0);
    assert_eq!(s.read32(COPROC_WORKER_STATE - 3), 0x2000_0F00);
}

#[test]
fn invalid_cpu_and_missing_worker() {
    let (rig, mut s) = surface();
    s.write32(COPROC_TICKET, 77);
    s.write32(COPROC_CPU_TYPE, 2);
    assert_eq!(
        command(&mut s, CommandCode::Enqueue),
        (CmdStatus::Error as u32, ErrorCode::InvalidCpu.as_u32())
    );
    assert_eq!(s.read32(COPROC_TICKET), 0);

    s.write32(COPROC_CPU_TYPE, 5);
    assert_eq!(
        command(&mut s, CommandCode::Enqueue),
        (CmdStatus::Error as u32, ErrorCode::NoWorker.as_u32())
    );
    assert_eq!(
        start(&rig, &mut s, 0, "svc_add"),
        (CmdStatus::Error as u32, ErrorCode::InvalidCpu.as_u32())
    );
}

#[test]
fn start_errors() {
    let (rig, mut s) = surface();
    assert_eq!(
        start(&rig, &mut s, 1, "nothing-here"),
        (CmdStatus::Error as u32, ErrorCode::NotFound.as_u32())
    );
    assert_eq!(
        start(&rig, &mut s, 1, "/abs/svc"),
        (CmdStatus::Error as u32, ErrorCode::PathInvalid.as_u32())
    );
    assert_eq!(
        start(&rig, &mut s, 3, "huge.bin"),
        (CmdStatus::Error as u32, ErrorCode::LoadFailed.as_u32())
    );
    s.write32(COPROC_CPU_TYPE, 1);
    assert_eq!(
        command(&mut s, CommandCode::Stop),
        (CmdStatus::Error as u32, ErrorCode::NoWorker.as_u32())
    );
}

#[test]
fn unknown_command_and_read_only_registers() {
    let (_h, mut s) = surface();
    s.write32(COPROC_CMD, 99);
    assert_eq!(s.read32(COPROC_CMD_STATUS), CmdStatus::Error as u32);
    assert_eq!(s.read32(COPROC_CMD_ERROR), ErrorCode::None.as_u32());

    s.write32(COPROC_CMD_STATUS, 0);
    s.write32(COPROC_WORKER_STATE, 0xFFFF);
    assert_eq!(s.read32(COPROC_CMD_STATUS), CmdStatus::Error as u32);
    assert_eq!(s.read32(COPROC_WORKER_STATE), 0);
    assert_eq!(s.read32(COPROC_END + 1), 0);
}

#[test]
fn stop_then_poll_reports_worker_down() {
    let (rig, mut s) = surface();
    start(&rig, &mut s, 4, "svc_add");
    rig.pause();
    s.write32(COPROC_OP, 1);
    command(&mut s, CommandCode::Enqueue);
    let ticket = s.read32(COPROC_TICKET);

    assert_eq!(command(&mut s, CommandCode::Stop), (0, 0));
    s.write32(COPROC_TICKET, ticket);
    assert_eq!(command(&mut s, CommandCode::Poll), (0, 0));
    assert_eq!(s.read32(COPROC_TICKET_STATUS), TicketStatus::WorkerDown.code());
    assert_eq!(s.read32(COPROC_WORKER_STATE), 0);
}

/// TIMEOUT of zero selects the configured one-second default.
#[test]
fn wait_with_default_timeout() {
    let (rig, mut s) = surface();
    start(&rig, &mut s, 6, "svc_add");
    rig.pause();
    s.write32(COPROC_OP, 1);
    command(&mut s, CommandCode::Enqueue);
    s.write32(COPROC_TIMEOUT, 0);
    let started = Instant::now();
    assert_eq!(command(&mut s, CommandCode::Wait), (0, 0));
    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(s.read32(COPROC_TICKET_STATUS), TicketStatus::Timeout.code());
}

/// A guest restarting a service mid-stream through the register file.
#[test]
fn restart_through_registers() {
    let (rig, mut s) = surface();
    assert_eq!(start(&rig, &mut s, 4, "svc_copy"), (0, 0));

    rig.memory().write_bytes(SRC, b"mailbox").unwrap();
    s.write32(COPROC_OP, services_reference::OP_COPY);
    s.write32(COPROC_REQ_PTR, SRC);
    s.write32(COPROC_REQ_LEN, 7);
    s.write32(COPROC_RESP_PTR, DST);
    s.write32(COPROC_RESP_CAP, 7);
    assert_eq!(command(&mut s, CommandCode::Enqueue), (0, 0));
    s.write32(COPROC_TIMEOUT, 5000);
    assert_eq!(command(&mut s, CommandCode::Wait), (0, 0));
    assert_eq!(s.read32(COPROC_TICKET_STATUS), TicketStatus::Ok.code());
    let mut out = [0u8; 7];
    rig.memory().read_bytes(DST, &mut out).unwrap();
    assert_eq!(&out, b"mailbox");

    assert_eq!(command(&mut s, CommandCode::Start), (0, 0));
    let workers = s.coprocessor().workers();
    assert_eq!(workers[CpuFamily::M68k.ring_index()].generation, 2);
}
