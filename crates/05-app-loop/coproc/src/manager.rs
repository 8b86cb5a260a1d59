use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use coproc_abi::{CoprocResult, CpuFamily, SubmitRequest, TicketId, WorkerState};
use mailbox::GuestMemory;
use parking_lot::Mutex;
use services_loader::ImageLoader;
use tracing::{debug, info};
use worker_runtime::CoreFactory;

use crate::engine::{Engine, WorkerInfo};
use crate::tickets::TicketInfo;
use crate::CoprocConfig;

/// Host-side coprocessor manager.
///
/// Owns the mailbox producers, the worker records and the ticket table. All
/// host calls serialize on one internal mutex, which is never held while a
/// worker thread is joined; workers run on their own threads and only ever
/// touch their ring's consumer half.
pub struct Coprocessor {
    pub(crate) config: CoprocConfig,
    pub(crate) engine: Mutex<Engine>,
    /// Serializes start and stop; held while worker threads are joined.
    pub(crate) lifecycle: Mutex<()>,
    memory: Arc<GuestMemory>,
    loader: Arc<dyn ImageLoader>,
    pub(crate) factory: Arc<dyn CoreFactory>,
}

impl Coprocessor {
    pub fn builder() -> CoprocessorBuilder {
        CoprocessorBuilder::new()
    }

    pub fn config(&self) -> &CoprocConfig {
        &self.config
    }

    /// Guest memory shared with the workers.
    pub fn memory(&self) -> &Arc<GuestMemory> {
        &self.memory
    }

    /// Resolves `name` through the loader and starts `family` on it.
    ///
    /// Loader errors are reported before any running worker is touched.
    pub fn start(&self, family: CpuFamily, name: &str) -> CoprocResult<()> {
        let image = self.loader.load(name)?;
        debug!(%family, name, "service image resolved");
        self.start_image(family, image)
    }

    /// Enqueues a request and returns its ticket. Never blocks.
    pub fn submit(&self, request: SubmitRequest) -> CoprocResult<TicketId> {
        self.engine.lock().submit(&request)
    }

    /// Bitmask of running workers, bit `n` for executor type `n`.
    pub fn worker_state(&self) -> WorkerState {
        self.engine.lock().worker_state()
    }

    pub fn is_running(&self, family: CpuFamily) -> bool {
        self.engine.lock().worker(family).running
    }

    /// Snapshot of every worker record, in ring order.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.engine.lock().workers.iter().map(|w| w.info()).collect()
    }

    /// Current view of a live ticket. Does not refresh or count as a read.
    pub fn inspect(&self, id: TicketId) -> CoprocResult<TicketInfo> {
        let engine = self.engine.lock();
        Ok(engine.tickets.get(id)?.info(Instant::now()))
    }

    /// Every live ticket, oldest first.
    pub fn tickets(&self) -> Vec<TicketInfo> {
        let now = Instant::now();
        let engine = self.engine.lock();
        let mut out: Vec<_> = engine.tickets.iter().map(|t| t.info(now)).collect();
        out.sort_by(|a, b| b.age_ms.cmp(&a.age_ms).then(a.id.cmp(&b.id)));
        out
    }
}

impl Drop for Coprocessor {
    fn drop(&mut self) {
        let stopped = self.stop_all();
        if stopped > 0 {
            info!(stopped, "coprocessor shut down");
        }
    }
}

/// Builder for a [`Coprocessor`].
pub struct CoprocessorBuilder {
    config: CoprocConfig,
    memory: Option<Arc<GuestMemory>>,
    loader: Option<Arc<dyn ImageLoader>>,
    factory: Option<Arc<dyn CoreFactory>>,
}

impl CoprocessorBuilder {
    pub fn new() -> Self {
        Self {
            config: CoprocConfig::default(),
            memory: None,
            loader: None,
            factory: None,
        }
    }

    pub fn config(mut self, config: CoprocConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares existing guest memory instead of allocating a fresh 16 MiB.
    pub fn memory(mut self, memory: Arc<GuestMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn loader(mut self, loader: impl ImageLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn factory(mut self, factory: impl CoreFactory + 'static) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn build(self) -> Result<Coprocessor> {
        let memory = match self.memory {
            Some(memory) => memory,
            None => Arc::new(GuestMemory::with_default_size().context("allocating guest memory")?),
        };
        let engine = Engine::new(self.config.clone(), Arc::clone(&memory))
            .context("attaching mailbox rings")?;
        Ok(Coprocessor {
            config: self.config,
            engine: Mutex::new(engine),
            lifecycle: Mutex::new(()),
            memory,
            loader: self.loader.ok_or_else(|| anyhow!("missing image loader"))?,
            factory: self.factory.ok_or_else(|| anyhow!("missing core factory"))?,
        })
    }
}

impl Default for CoprocessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
