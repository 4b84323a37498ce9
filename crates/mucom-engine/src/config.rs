use std::time::Duration;

use mucom_transport::DEFAULT_READ_TIMEOUT;

use crate::error::{EngineError, Result};

/// Default number of threads running execute callbacks.
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Default number of execute callbacks that may wait for a worker.
pub const DEFAULT_WORKER_QUEUE_DEPTH: usize = 64;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long [`Engine::read`](crate::Engine::read) waits for a response.
    /// Applied to the transport. Default: 100 ms.
    pub read_timeout: Duration,
    /// Per-write timeout applied to the transport. Default: none.
    pub write_timeout: Option<Duration>,
    /// Threads running execute callbacks. Default: 2.
    pub worker_threads: usize,
    /// Execute callbacks queued beyond the busy workers before new ones are
    /// dropped. Default: 64.
    pub worker_queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: None,
            worker_threads: DEFAULT_WORKER_THREADS,
            worker_queue_depth: DEFAULT_WORKER_QUEUE_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.read_timeout.is_zero() {
            return Err(EngineError::Configuration(
                "read timeout must be greater than zero".to_string(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(EngineError::Configuration(
                "at least one worker thread is required".to_string(),
            ));
        }
        Ok(())
    }
}
