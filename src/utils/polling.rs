/// Polling utilities for waiting on provider state with timeout
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Configuration for polling operations
pub struct PollingConfig {
    pub timeout: Duration,
    pub interval: Duration,
    pub description: String,
}

impl PollingConfig {
    pub fn new(timeout_secs: u64, interval_secs: u64, description: impl Into<String>) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            interval: Duration::from_secs(interval_secs),
            description: description.into(),
        }
    }

    /// Poll until condition is met or timeout
    ///
    /// The condition function should return:
    /// - Ok(Some(T)) when condition is met (returns T)
    /// - Ok(None) when condition is not yet met (continues polling)
    /// - Err(e) when an error occurs (stops polling and returns error)
    pub async fn poll<F, Fut, T>(&self, condition: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        info!("{}...", self.description);

        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if let Some(value) = condition().await? {
                info!("✓ {}", self.description);
                return Ok(value);
            }

            if start.elapsed() > self.timeout {
                return Err(Error::Timeout {
                    description: self.description.clone(),
                    secs: self.timeout.as_secs(),
                });
            }

            debug!("{}: attempt {} not ready yet", self.description, attempts);
            tokio::time::sleep(self.interval).await;
        }
    }
}
