//! Behaviour of the host-side core against native reference workers.

use std::time::{Duration, Instant};

use coproc::{CoprocConfig, CoprocError, Coprocessor, CpuFamily, TicketStatus};
use mailbox::layout::RESP_STATUS_OK;
use mailbox::{ResponseDescriptor, RingConsumer};
use services_loader::MemoryLoader;
use worker_runtime::{RuntimeResult, WorkerContext, WorkerCore};

use crate::support::{add, Rig, DST, SRC};

/// Two words summed by the 6502 service land in the destination buffer.
#[test]
fn add_scenario_on_6502() {
    let rig = Rig::new();
    rig.coproc.start(CpuFamily::Mos6502, "svc_add").unwrap();
    rig.memory().write_u32(SRC, 10).unwrap();
    rig.memory().write_u32(SRC + 4, 20).unwrap();

    let ticket = rig.coproc.submit(add(CpuFamily::Mos6502)).unwrap();
    assert_eq!(rig.coproc.wait(ticket, 5000), Ok(TicketStatus::Ok));
    assert_eq!(rig.coproc.status(ticket), Ok(TicketStatus::Ok));
    assert_eq!(rig.memory().read_u32(DST).unwrap(), 30);
    let info = rig.coproc.inspect(ticket).unwrap();
    assert_eq!((info.resp_len, info.reads), (4, 1));
}

/// Loading writes the 6502 reset vector over the top of the image window.
#[test]
fn start_prepares_entry_state() {
    let rig = Rig::new();
    rig.coproc.start(CpuFamily::Mos6502, "full.bin").unwrap();
    let base = CpuFamily::Mos6502.load_window().base;
    assert_eq!(rig.memory().read_u8(base).unwrap(), 0xEA);
    assert_eq!(rig.memory().read_u8(base + 0xFFFB).unwrap(), 0xEA);
    assert_eq!(rig.memory().read_u8(base + 0xFFFE).unwrap(), 0xEA);
    assert_eq!(rig.memory().read_u8(base + 0xFFFC).unwrap(), 0x00);
    assert_eq!(rig.memory().read_u8(base + 0xFFFD).unwrap(), 0x00);
    assert!(rig.coproc.worker_state().is_running(CpuFamily::Mos6502));
    assert_eq!(rig.coproc.worker_state().bits(), 1 << 3);
}

#[test]
fn validation_errors() {
    let rig = Rig::new();
    assert_eq!(CpuFamily::from_raw(2), Err(CoprocError::InvalidCpu(2)));
    assert_eq!(
        rig.coproc.submit(add(CpuFamily::Z80)),
        Err(CoprocError::NoWorker("Z80"))
    );
    assert_eq!(rig.coproc.stop(CpuFamily::X86), Err(CoprocError::NoWorker("X86")));
    assert!(rig.coproc.tickets().is_empty());
}

#[test]
fn loader_errors_pass_through() {
    let rig = Rig::new();
    assert!(matches!(
        rig.coproc.start(CpuFamily::Z80, "missing"),
        Err(CoprocError::NotFound(_))
    ));
    assert!(matches!(
        rig.coproc.start(CpuFamily::Z80, "../svc_add"),
        Err(CoprocError::PathInvalid(_))
    ));
    assert!(matches!(
        rig.coproc.start(CpuFamily::Z80, "huge.bin"),
        Err(CoprocError::LoadFailed(_))
    ));
    assert!(!rig.coproc.is_running(CpuFamily::Z80));
}

/// A failing restart leaves the running worker alone.
#[test]
fn failed_restart_keeps_worker() {
    let rig = Rig::new();
    rig.coproc.start(CpuFamily::Z80, "svc_add").unwrap();
    assert!(rig.coproc.start(CpuFamily::Z80, "huge.bin").is_err());
    assert!(rig.coproc.start(CpuFamily::Z80, "nope").is_err());
    assert!(rig.coproc.is_running(CpuFamily::Z80));
    let ticket = rig.coproc.submit(add(CpuFamily::Z80)).unwrap();
    assert_eq!(rig.coproc.wait(ticket, 5000), Ok(TicketStatus::Ok));
}

#[test]
fn wait_times_out_no_earlier_than_requested() {
    let rig = Rig::new();
    rig.coproc.start(CpuFamily::X86, "svc_add").unwrap();
    rig.pause();
    let ticket = rig.coproc.submit(add(CpuFamily::X86)).unwrap();
    assert_eq!(rig.coproc.status(ticket), Ok(TicketStatus::Pending));

    let started = Instant::now();
    assert_eq!(rig.coproc.wait(ticket, 50), Ok(TicketStatus::Timeout));
    assert!(started.elapsed() >= Duration::from_millis(50));

    // A late completion is ignored.
    rig.resume();
    rig.drain(CpuFamily::X86);
    assert_eq!(rig.coproc.status(ticket), Ok(TicketStatus::Timeout));
    assert_eq!(rig.coproc.status(ticket), Ok(TicketStatus::Timeout));
    assert!(rig.coproc.status(ticket).is_err());
}

#[test]
fn stop_fails_unsettled_tickets() {
    let rig = Rig::new();
    rig.coproc.start(CpuFamily::Z80, "svc_add").unwrap();
    rig.pause();
    let first = rig.coproc.submit(add(CpuFamily::Z80)).unwrap();
    let second = rig.coproc.submit(add(CpuFamily::Z80)).unwrap();
    rig.coproc.stop(CpuFamily::Z80).unwrap();

    assert_eq!(rig.coproc.status(first), Ok(TicketStatus::WorkerDown));
    assert_eq!(rig.coproc.wait(second, 10), Ok(TicketStatus::WorkerDown));
    assert!(!rig.coproc.worker_state().is_running(CpuFamily::Z80));
    assert_eq!(
        rig.coproc.submit(add(CpuFamily::Z80)),
        Err(CoprocError::NoWorker("Z80"))
    );
}

#[test]
fn restart_resets_ring_and_orphans_old_tickets() {
    let rig = Rig::new();
    rig.coproc.start(CpuFamily::Ie32, "svc_add").unwrap();
    rig.pause();
    let old = rig.coproc.submit(add(CpuFamily::Ie32)).unwrap();

    rig.coproc.start(CpuFamily::Ie32, "svc/checksum.bin").unwrap();
    let info = &rig.coproc.workers()[CpuFamily::Ie32.ring_index()];
    assert_eq!((info.generation, info.queued), (2, 0));
    assert_eq!(rig.coproc.status(old), Ok(TicketStatus::WorkerDown));

    rig.resume();
    let fresh = rig.coproc.submit(add(CpuFamily::Ie32)).unwrap();
    assert_eq!(rig.coproc.wait(fresh, 5000), Ok(TicketStatus::Ok));
}

/// Responses are not lost when their slot is reused before anyone polled.
#[test]
fn slot_reuse_harvests_unpolled_responses() {
    let rig = Rig::new();
    rig.coproc.start(CpuFamily::Mos6502, "svc_add").unwrap();
    let mut tickets = Vec::new();
    for i in 0..40u32 {
        rig.memory().write_u32(SRC, i).unwrap();
        rig.memory().write_u32(SRC + 4, 1).unwrap();
        tickets.push(rig.coproc.submit(add(CpuFamily::Mos6502)).unwrap());
        rig.drain(CpuFamily::Mos6502);
    }
    for ticket in tickets {
        assert_eq!(rig.coproc.status(ticket), Ok(TicketStatus::Ok), "{ticket}");
    }
    assert_eq!(rig.memory().read_u32(DST).unwrap(), 40);
}

#[test]
fn running_is_reported_for_the_cursor_slot() {
    let rig = Rig::with_config(CoprocConfig {
        report_running: true,
        ..CoprocConfig::default()
    });
    rig.coproc.start(CpuFamily::M68k, "svc_add").unwrap();
    rig.pause();
    let first = rig.coproc.submit(add(CpuFamily::M68k)).unwrap();
    let second = rig.coproc.submit(add(CpuFamily::M68k)).unwrap();
    assert_eq!(rig.coproc.status(first), Ok(TicketStatus::Running));
    assert_eq!(rig.coproc.status(second), Ok(TicketStatus::Pending));
}

#[test]
fn oldest_tickets_pruned_at_cap() {
    let rig = Rig::with_config(CoprocConfig {
        max_tickets: 4,
        ..CoprocConfig::default()
    });
    rig.coproc.start(CpuFamily::Ie32, "svc_add").unwrap();
    let mut tickets = Vec::new();
    for _ in 0..6 {
        tickets.push(rig.coproc.submit(add(CpuFamily::Ie32)).unwrap());
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(rig.coproc.tickets().len(), 4);
    assert!(matches!(
        rig.coproc.status(tickets[0]),
        Err(CoprocError::StaleTicket(_))
    ));
    assert_eq!(rig.coproc.wait(tickets[5], 5000), Ok(TicketStatus::Ok));
}

struct Panicking;

impl WorkerCore for Panicking {
    fn step(&mut self) -> usize {
        panic!("emulation fault");
    }

    fn name(&self) -> &'static str {
        "panicking"
    }
}

/// A crashed worker is only noticed when one of its tickets is polled.
#[test]
fn crashed_worker_reports_worker_down() {
    let coproc = Coprocessor::builder()
        .loader(MemoryLoader::new().with_image("svc", vec![0u8; 4]).unwrap())
        .factory(|_ctx: WorkerContext| -> RuntimeResult<Box<dyn WorkerCore>> {
            Ok(Box::new(Panicking))
        })
        .build()
        .unwrap();
    coproc.start(CpuFamily::X86, "svc").unwrap();
    let ticket = coproc.submit(add(CpuFamily::X86)).unwrap();
    assert_eq!(coproc.wait(ticket, 2000), Ok(TicketStatus::WorkerDown));
    assert!(coproc.is_running(CpuFamily::X86));
}

/// Completes every request with a response that echoes the wrong ticket.
struct Misecho(RingConsumer);

impl WorkerCore for Misecho {
    fn step(&mut self) -> usize {
        let Some((_, request)) = self.0.peek() else {
            return 0;
        };
        self.0.complete(&ResponseDescriptor {
            ticket: request.ticket.wrapping_add(1),
            status: RESP_STATUS_OK,
            result_code: 0,
            resp_len: 0,
        });
        1
    }

    fn name(&self) -> &'static str {
        "misecho"
    }
}

#[test]
fn mismatched_echo_is_an_error() {
    let coproc = Coprocessor::builder()
        .loader(MemoryLoader::new().with_image("svc", vec![0u8; 4]).unwrap())
        .factory(|ctx: WorkerContext| -> RuntimeResult<Box<dyn WorkerCore>> {
            Ok(Box::new(Misecho(ctx.consumer)))
        })
        .build()
        .unwrap();
    coproc.start(CpuFamily::Z80, "svc").unwrap();
    let ticket = coproc.submit(add(CpuFamily::Z80)).unwrap();
    assert_eq!(coproc.wait(ticket, 5000), Ok(TicketStatus::Error));
}

#[test]
fn stop_all_stops_every_worker() {
    let rig = Rig::new();
    for family in CpuFamily::ALL {
        rig.coproc.start(family, "svc_add").unwrap();
    }
    assert_eq!(rig.coproc.worker_state().bits(), 0b111_1010);
    assert_eq!(rig.coproc.stop_all(), 5);
    assert_eq!(rig.coproc.worker_state().bits(), 0);
    assert_eq!(rig.coproc.stop_all(), 0);
}
