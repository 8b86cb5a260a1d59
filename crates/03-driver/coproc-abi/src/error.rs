use thiserror::Error;

pub type CoprocResult<T> = Result<T, CoprocError>;

/// Failures surfaced by coprocessor commands.
///
/// TIMEOUT and WORKER_DOWN are not here: they are terminal ticket statuses
/// reported by a successful poll, not call-level errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoprocError {
    #[error("cpu type {0} is not a supported coprocessor family")]
    InvalidCpu(u32),

    #[error("service image not found: {0}")]
    NotFound(String),

    #[error("service path rejected: {0}")]
    PathInvalid(String),

    #[error("failed to load service image: {0}")]
    LoadFailed(String),

    #[error("request ring for {0} is full")]
    QueueFull(&'static str),

    #[error("no worker running for {0}")]
    NoWorker(&'static str),

    #[error("ticket {0} is unknown or already evicted")]
    StaleTicket(u32),
}

impl CoprocError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoprocError::InvalidCpu(_) => ErrorCode::InvalidCpu,
            CoprocError::NotFound(_) => ErrorCode::NotFound,
            CoprocError::PathInvalid(_) => ErrorCode::PathInvalid,
            CoprocError::LoadFailed(_) => ErrorCode::LoadFailed,
            CoprocError::QueueFull(_) => ErrorCode::QueueFull,
            CoprocError::NoWorker(_) => ErrorCode::NoWorker,
            CoprocError::StaleTicket(_) => ErrorCode::StaleTicket,
        }
    }

    pub fn load_failed(msg: impl Into<String>) -> Self {
        CoprocError::LoadFailed(msg.into())
    }
}

/// Numeric error codes exposed through the `CMD_ERROR` register.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorCode {
    None = 0,
    InvalidCpu = 1,
    NotFound = 2,
    PathInvalid = 3,
    LoadFailed = 4,
    QueueFull = 5,
    NoWorker = 6,
    StaleTicket = 7,
}

impl ErrorCode {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        Some(match value {
            0 => ErrorCode::None,
            1 => ErrorCode::InvalidCpu,
            2 => ErrorCode::NotFound,
            3 => ErrorCode::PathInvalid,
            4 => ErrorCode::LoadFailed,
            5 => ErrorCode::QueueFull,
            6 => ErrorCode::NoWorker,
            7 => ErrorCode::StaleTicket,
            _ => return None,
        })
    }
}

impl From<&CoprocError> for ErrorCode {
    fn from(err: &CoprocError) -> Self {
        err.code()
    }
}
