use std::time::Duration;

use crate::{DEFAULT_MAX_BACKOFF, DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_TIMEOUT};

/// Tuning of the monitor engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause between two iterations of a polling loop
    pub poll_interval: Duration,

    /// Upper bound for a single probe
    pub probe_timeout: Duration,

    /// Longest pause after repeated ledger read failures
    pub max_backoff: Duration,

    /// Bound on the local vote records, unbounded if `None`
    pub vote_cache_capacity: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_backoff: DEFAULT_MAX_BACKOFF,
            vote_cache_capacity: None,
        }
    }
}

impl EngineConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_vote_cache_capacity(mut self, capacity: usize) -> Self {
        self.vote_cache_capacity = Some(capacity);
        self
    }
}
