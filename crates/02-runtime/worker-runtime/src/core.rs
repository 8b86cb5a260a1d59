use std::sync::Arc;

use coproc_abi::{CpuFamily, EntryState};
use mailbox::{GuestMemory, RingConsumer};

use crate::RuntimeResult;

/// Execution engine for one worker.
///
/// A core owns the consumer side of its family's ring. `step` runs one
/// bounded quantum of work and returns how much it did; zero tells the
/// hosting thread the core is idle and may back off.
pub trait WorkerCore: Send {
    /// Runs one quantum. Returns the number of requests retired (or any other
    /// non-zero progress measure); `0` means idle.
    fn step(&mut self) -> usize;

    /// Short name used in logs and thread names.
    fn name(&self) -> &'static str;
}

/// Everything a factory needs to bring up a worker for a loaded image.
pub struct WorkerContext {
    /// Family the worker executes.
    pub family: CpuFamily,
    /// Shared guest memory, with the image already copied into the family's window.
    pub memory: Arc<GuestMemory>,
    /// Exclusive consumer endpoint of the family's ring.
    pub consumer: RingConsumer,
    /// The raw image bytes as loaded.
    pub image: Arc<[u8]>,
    /// Registers the worker starts executing with.
    pub entry: EntryState,
    /// Lifetime counter of the family's worker record.
    pub generation: u64,
}

impl std::fmt::Debug for WorkerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerContext")
            .field("family", &self.family)
            .field("image_len", &self.image.len())
            .field("entry", &self.entry)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Builds worker cores. Instruction-level emulators and native service
/// tables both plug in here.
pub trait CoreFactory: Send + Sync {
    /// Creates a core for `ctx`. Errors surface to the host as a load failure.
    fn create(&self, ctx: WorkerContext) -> RuntimeResult<Box<dyn WorkerCore>>;
}

impl<F> CoreFactory for F
where
    F: Fn(WorkerContext) -> RuntimeResult<Box<dyn WorkerCore>> + Send + Sync,
{
    fn create(&self, ctx: WorkerContext) -> RuntimeResult<Box<dyn WorkerCore>> {
        self(ctx)
    }
}
