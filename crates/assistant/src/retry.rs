use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::RetrySettings;

/// Exponential backoff around the upstream generation call.
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds or the retry budget is spent,
    /// doubling the backoff between attempts up to the cap.
    pub async fn run<F, Fut, T, E>(&self, name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut backoff = self.initial_backoff;

        for attempt in 0..=self.max_retries {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation = name, attempts = attempt + 1, "succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(err) if attempt == self.max_retries => {
                    warn!(operation = name, attempts = attempt + 1, error = %err, "retry budget exhausted");
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        operation = name,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis(),
                        error = %err,
                        "attempt failed, backing off"
                    );
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
            }
        }
        unreachable!("loop always returns on the final attempt")
    }
}
