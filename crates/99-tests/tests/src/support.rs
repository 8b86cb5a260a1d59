use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use coproc::{CoprocConfig, Coprocessor, CpuFamily, SubmitRequest};
use mailbox::{GuestMemory, RequestDescriptor};
use parking_lot::Mutex;
use services_loader::MemoryLoader;
use services_reference::ReferenceServices;
use worker_runtime::{
    RuntimeResult, ServiceHandler, ServiceLoop, ServiceReply, WorkerContext, WorkerCore,
};

pub const SRC: u32 = 0x10_0000;
pub const DST: u32 = 0x10_4000;

/// Reference services that log the order tickets were served in.
struct Recording {
    inner: ReferenceServices,
    served: Arc<Mutex<Vec<u32>>>,
}

impl ServiceHandler for Recording {
    fn handle(&mut self, request: &RequestDescriptor, memory: &GuestMemory) -> ServiceReply {
        self.served.lock().push(request.ticket);
        self.inner.handle(request, memory)
    }
}

/// Only makes progress while the gate is open.
struct Gated {
    inner: ServiceLoop<Recording>,
    gate: Arc<AtomicBool>,
}

impl WorkerCore for Gated {
    fn step(&mut self) -> usize {
        if self.gate.load(Ordering::Acquire) {
            self.inner.step()
        } else {
            0
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// In-memory service images every test can start.
pub fn images() -> MemoryLoader {
    let loader = MemoryLoader::new();
    for name in ["svc_add", "svc_copy", "svc/checksum.bin"] {
        loader.insert(name, vec![0xEAu8; 32]).expect("image");
    }
    loader.insert("full.bin", vec![0xEAu8; 0x1_0000]).expect("image");
    loader.insert("huge.bin", vec![0u8; 0x1_0001]).expect("image");
    loader
}

/// A coprocessor whose workers can be paused, with a log of served tickets.
pub struct Rig {
    pub coproc: Arc<Coprocessor>,
    gate: Arc<AtomicBool>,
    served: Arc<Mutex<Vec<u32>>>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(CoprocConfig::default())
    }

    pub fn with_config(config: CoprocConfig) -> Self {
        let gate = Arc::new(AtomicBool::new(true));
        let served = Arc::new(Mutex::new(Vec::new()));
        let (factory_gate, factory_served) = (Arc::clone(&gate), Arc::clone(&served));
        let coproc = Coprocessor::builder()
            .config(config)
            .loader(images())
            .factory(move |ctx: WorkerContext| -> RuntimeResult<Box<dyn WorkerCore>> {
                let handler = Recording {
                    inner: ReferenceServices,
                    served: Arc::clone(&factory_served),
                };
                Ok(Box::new(Gated {
                    inner: ServiceLoop::new(ctx.family.label(), ctx.consumer, handler),
                    gate: Arc::clone(&factory_gate),
                }))
            })
            .build()
            .expect("coprocessor");
        Self {
            coproc: Arc::new(coproc),
            gate,
            served,
        }
    }

    pub fn memory(&self) -> &GuestMemory {
        self.coproc.memory()
    }

    pub fn pause(&self) {
        self.gate.store(false, Ordering::Release);
    }

    pub fn resume(&self) {
        self.gate.store(true, Ordering::Release);
    }

    pub fn served(&self) -> Vec<u32> {
        self.served.lock().clone()
    }

    /// Spins until `family`'s ring has been fully consumed.
    pub fn drain(&self, family: CpuFamily) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.coproc.workers()[family.ring_index()].queued > 0 {
            assert!(Instant::now() < deadline, "{family} ring never drained");
            std::thread::sleep(Duration::from_micros(200));
        }
    }
}

pub fn add(family: CpuFamily) -> SubmitRequest {
    SubmitRequest::new(family, services_reference::OP_ADD)
        .source(SRC, 8)
        .destination(DST, 16)
}
