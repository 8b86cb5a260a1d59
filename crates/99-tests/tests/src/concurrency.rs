//! Several host threads sharing one coprocessor.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use coproc::{CoprocError, Coprocessor, CpuFamily, SubmitRequest, TicketStatus};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use worker_runtime::{RuntimeResult, ServiceLoop, WorkerContext, WorkerCore};

use crate::support::{add, images, Rig};

const PER_THREAD: u32 = 300;

/// Each thread owns one family and its own scratch buffers; the core
/// serializes them internally and every request completes.
#[test]
fn host_threads_on_separate_rings() {
    let rig = Arc::new(Rig::new());
    let families = [CpuFamily::Ie32, CpuFamily::Mos6502, CpuFamily::Z80, CpuFamily::X86];
    for family in families {
        rig.coproc.start(family, "svc_add").unwrap();
    }

    let handles: Vec<_> = families
        .into_iter()
        .enumerate()
        .map(|(i, family)| {
            let rig = Arc::clone(&rig);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(i as u64);
                let src = 0x10_0000 + (i as u32) * 0x100;
                let dst = src + 0x80;
                let memory = rig.memory();
                let mut done = 0;
                while done < PER_THREAD {
                    let (a, b) = (rng.gen::<u16>() as u32, rng.gen::<u16>() as u32);
                    memory.write_u32(src, a).unwrap();
                    memory.write_u32(src + 4, b).unwrap();
                    let request = SubmitRequest::new(family, 1)
                        .source(src, 8)
                        .destination(dst, 4);
                    let ticket = match rig.coproc.submit(request) {
                        Ok(ticket) => ticket,
                        Err(CoprocError::QueueFull(_)) => {
                            thread::yield_now();
                            continue;
                        }
                        Err(err) => panic!("{family}: {err}"),
                    };
                    assert_eq!(rig.coproc.wait(ticket, 5000), Ok(TicketStatus::Ok));
                    assert_eq!(rig.coproc.status(ticket), Ok(TicketStatus::Ok));
                    assert_eq!(rig.coproc.status(ticket), Ok(TicketStatus::Ok));
                    assert_eq!(memory.read_u32(dst).unwrap(), a + b);
                    done += 1;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("host thread");
    }
    assert!(rig.coproc.tickets().is_empty());
    assert_eq!(rig.served().len(), (PER_THREAD as usize) * families.len());
}

/// A stop racing with a waiter on another thread ends the wait with WORKER_DOWN.
#[test]
fn stop_while_waiting() {
    let rig = Arc::new(Rig::new());
    rig.coproc.start(CpuFamily::M68k, "svc_add").unwrap();
    rig.pause();
    let ticket = rig
        .coproc
        .submit(SubmitRequest::new(CpuFamily::M68k, 1))
        .unwrap();

    let waiter = {
        let rig = Arc::clone(&rig);
        thread::spawn(move || rig.coproc.wait(ticket, 10_000))
    };
    thread::sleep(Duration::from_millis(20));
    rig.coproc.stop(CpuFamily::M68k).unwrap();
    assert_eq!(waiter.join().unwrap(), Ok(TicketStatus::WorkerDown));
}

const SLOW_STEP: Duration = Duration::from_millis(1000);

/// Serves reference requests, except that the Z80 core spends a long
/// quantum in every step and so is slow to notice a stop.
struct Sluggish {
    inner: ServiceLoop<services_reference::ReferenceServices>,
    slow: bool,
}

impl WorkerCore for Sluggish {
    fn step(&mut self) -> usize {
        if self.slow {
            thread::sleep(SLOW_STEP);
        }
        self.inner.step()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// Joining a slow worker does not hold up host calls for other families.
#[test]
fn slow_stop_does_not_stall_other_families() {
    let coproc = Arc::new(
        Coprocessor::builder()
            .loader(images())
            .factory(|ctx: WorkerContext| -> RuntimeResult<Box<dyn WorkerCore>> {
                Ok(Box::new(Sluggish {
                    slow: ctx.family == CpuFamily::Z80,
                    inner: ServiceLoop::new(
                        ctx.family.label(),
                        ctx.consumer,
                        services_reference::ReferenceServices,
                    ),
                }))
            })
            .build()
            .unwrap(),
    );
    coproc.start(CpuFamily::Z80, "svc_add").unwrap();
    coproc.start(CpuFamily::X86, "svc_add").unwrap();
    let ticket = coproc.submit(add(CpuFamily::X86)).unwrap();
    assert_eq!(coproc.wait(ticket, 5000), Ok(TicketStatus::Ok));

    let stopper = {
        let coproc = Arc::clone(&coproc);
        thread::spawn(move || coproc.stop(CpuFamily::Z80))
    };
    // Let the stopper detach the Z80 worker and start joining it.
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    assert_eq!(coproc.status(ticket), Ok(TicketStatus::Ok));
    let next = coproc.submit(add(CpuFamily::X86)).unwrap();
    assert!(
        started.elapsed() < SLOW_STEP / 5,
        "host calls waited {:?} on the join",
        started.elapsed()
    );
    assert_eq!(coproc.wait(next, 5000), Ok(TicketStatus::Ok));

    assert_eq!(stopper.join().unwrap(), Ok(()));
    assert!(!coproc.is_running(CpuFamily::Z80));
}
