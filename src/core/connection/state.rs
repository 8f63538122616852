use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle state of the serial endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Closed,
    Open,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "Closed"),
            ConnectionState::Open => write!(f, "Open"),
        }
    }
}

/// Transfer counters for the current connection
#[derive(Debug, Default)]
pub struct LinkStats {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    receive_failures: AtomicU64,
}

/// Point-in-time copy of [`LinkStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub receive_failures: u64,
}

impl LinkStats {
    pub fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_receive_failure(&self) {
        self.receive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            receive_failures: self.receive_failures.load(Ordering::Relaxed),
        }
    }
}
