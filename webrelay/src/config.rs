use std::time::Duration;

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_PENDING: usize = 1000;

pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000/api/browser-control-real";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_EVAL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shortest period accepted for the sweeper and the polling executor.
pub const MIN_TICK: Duration = Duration::from_millis(1);

/// Settings for the in-memory operation queue.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Pending operations and results older than this are pruned.
    pub max_age: Duration,
    /// Period of the background sweeper.
    pub cleanup_interval: Duration,
    /// Upper bound on queued operations; enqueue fails beyond it.
    pub max_pending: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

/// Settings for the polling executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Relay endpoint, e.g. `http://host:port/api/browser-control-real`.
    pub relay_url: String,
    pub poll_interval: Duration,
    /// Upper bound for evaluating one script in the browser.
    pub eval_timeout: Duration,
    /// Upper bound for one HTTP round trip to the relay.
    pub request_timeout: Duration,
    /// How long executed ids are remembered to avoid running them twice.
    pub executed_memory: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            eval_timeout: DEFAULT_EVAL_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            executed_memory: DEFAULT_MAX_AGE,
        }
    }
}
