use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables of the host-side core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoprocConfig {
    /// Timeout applied by `wait` when the caller passes 0.
    pub default_wait_timeout_ms: u32,
    /// Interval between status probes while waiting.
    pub poll_interval_us: u64,
    /// How long `stop` waits for a worker thread to exit.
    pub stop_grace_ms: u64,
    /// Ticket table size above which the oldest entries are evicted.
    pub max_tickets: usize,
    /// Age after which an unevicted ticket is pruned.
    pub ticket_ttl_secs: u64,
    /// Report RUNNING for the request the worker is currently on.
    pub report_running: bool,
    /// Longest sleep of an idle worker between ring peeks.
    pub idle_backoff_us: u64,
}

impl Default for CoprocConfig {
    fn default() -> Self {
        Self {
            default_wait_timeout_ms: 1000,
            poll_interval_us: 100,
            stop_grace_ms: 2000,
            max_tickets: 256,
            ticket_ttl_secs: 60,
            report_running: false,
            idle_backoff_us: 50,
        }
    }
}

impl CoprocConfig {
    /// Resolves a caller-supplied wait timeout, 0 meaning the default.
    pub fn wait_timeout(&self, timeout_ms: u32) -> Duration {
        let ms = if timeout_ms == 0 {
            self.default_wait_timeout_ms
        } else {
            timeout_ms
        };
        Duration::from_millis(u64::from(ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us.max(1))
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn ticket_ttl(&self) -> Duration {
        Duration::from_secs(self.ticket_ttl_secs)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_micros(self.idle_backoff_us)
    }
}
