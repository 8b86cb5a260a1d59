use mailbox::MailboxError;
use thiserror::Error;

/// Result alias for worker runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failures while bringing a worker up.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The OS refused to spawn the worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The ring or guest memory could not be prepared for the worker.
    #[error("mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    /// The factory rejected the image.
    #[error("cannot build worker core: {0}")]
    Core(String),
}

impl RuntimeError {
    /// Convenience constructor for factory rejections.
    pub fn core(msg: impl Into<String>) -> Self {
        RuntimeError::Core(msg.into())
    }
}
