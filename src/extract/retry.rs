use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::config::ExtractionSettings;
use crate::ExtractionError;

/// Spacing between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// Doubles after every failed attempt, capped at the policy's `max_delay`
    Exponential,
}

/// Bounded retry of a stage. Only [`ExtractionError::Browser`] failures are retried;
/// everything else is returned on first occurrence.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    max_delay: Duration,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration, max_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            delay,
            max_delay: max_delay.max(delay),
            backoff,
        }
    }

    pub fn from_settings(settings: &ExtractionSettings) -> Self {
        let backoff = if settings.exponential_backoff {
            Backoff::Exponential
        } else {
            Backoff::Fixed
        };
        Self::new(
            settings.max_retries,
            Duration::from_millis(settings.retry_delay_ms),
            Duration::from_millis(settings.max_retry_delay_ms),
            backoff,
        )
    }

    /// Same spacing with a different retry bound
    pub fn with_max_retries(&self, max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                self.delay.saturating_mul(factor).min(self.max_delay)
            }
        }
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out.
    /// Exhaustion returns the last error.
    pub async fn run<T, F, Fut>(&self, stage: &str, mut op: F) -> Result<T, ExtractionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExtractionError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let wait = self.delay_for(attempt);
                    tracing::debug!(
                        "{} attempt {}/{} failed: {}; retrying in {:?}",
                        stage,
                        attempt,
                        self.max_attempts,
                        err,
                        wait
                    );
                    sleep(wait).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_retryable() {
                        tracing::debug!("{} gave up after {} attempt(s): {}", stage, attempt, err);
                    }
                    return Err(err);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&ExtractionSettings::default())
    }
}

/// Abandon `fut` once `ceiling` has passed, independent of any stage budgets
pub async fn with_ceiling<T, Fut>(ceiling: Duration, fut: Fut) -> Result<T, ExtractionError>
where
    Fut: Future<Output = Result<T, ExtractionError>>,
{
    match timeout(ceiling, fut).await {
        Ok(result) => result,
        Err(_) => Err(ExtractionError::Browser(format!(
            "timed out: extraction exceeded {:?}",
            ceiling
        ))),
    }
}
