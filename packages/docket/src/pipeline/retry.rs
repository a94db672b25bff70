//! Bounded retries with exponential backoff for fetches.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::{FetchError, PipelineError, Result};
use crate::types::document::SourceIdentifier;

/// How much randomness to add to each backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// Exact exponential delays
    None,
    /// Uniform in `[0, delay]`
    Full,
    /// Uniform in `[delay / 2, delay]`
    Equal,
}

/// Retry policy for transient fetch failures.
///
/// Permanent failures are never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    pub base_delay: Duration,

    pub max_delay: Duration,

    pub multiplier: f64,

    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: Jitter::Full,
        }
    }
}

impl RetryPolicy {
    /// No delays between attempts. Used by tests and dry runs.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: Jitter::None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_delays(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Un-jittered delay after the given (1-based) failed attempt.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped > 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            Duration::ZERO
        }
    }

    /// Delay after `attempt` given a uniform sample in `[0, 1)`.
    pub fn delay_for_attempt(&self, attempt: u32, sample: f64) -> Duration {
        let delay = self.backoff(attempt);
        let sample = sample.clamp(0.0, 1.0);
        match self.jitter {
            Jitter::None => delay,
            Jitter::Full => delay.mul_f64(sample),
            Jitter::Equal => {
                let half = delay / 2;
                half + half.mul_f64(sample)
            }
        }
    }

    /// Jittered delay after `attempt`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let sample: f64 = rand::thread_rng().gen();
        self.delay_for_attempt(attempt, sample)
    }

    /// Whether another attempt is allowed after `attempt` failed with `error`.
    pub fn should_retry(&self, attempt: u32, error: &FetchError) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of attempts.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, source: &SourceIdentifier, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if self.should_retry(attempt, &error) => {
                    let delay = self.next_delay(attempt);
                    warn!(
                        source_identifier = %source,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient fetch failure, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(error) => {
                    return Err(PipelineError::Fetch {
                        attempts: attempt,
                        source: error,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn id() -> SourceIdentifier {
        SourceIdentifier::new("doc-1").unwrap()
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default().with_jitter(Jitter::None);
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_secs(1));
        assert_eq!(policy.backoff(3), Duration::from_secs(2));
        assert_eq!(policy.backoff(20), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_bounds() {
        let full = RetryPolicy::default().with_jitter(Jitter::Full);
        assert_eq!(full.delay_for_attempt(2, 0.0), Duration::ZERO);
        assert_eq!(full.delay_for_attempt(2, 0.5), Duration::from_millis(500));

        let equal = RetryPolicy::default().with_jitter(Jitter::Equal);
        assert_eq!(equal.delay_for_attempt(2, 0.0), Duration::from_millis(500));
        assert_eq!(equal.delay_for_attempt(2, 1.0), Duration::from_secs(1));

        for attempt in 1..6 {
            assert!(full.next_delay(attempt) <= full.backoff(attempt));
        }
    }

    #[test]
    fn test_permanent_errors_never_retry() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(1, &FetchError::permanent("doc-1", "404")));
        assert!(policy.should_retry(1, &FetchError::transient("doc-1", "timeout")));
        assert!(!policy.should_retry(3, &FetchError::transient("doc-1", "timeout")));
    }

    #[tokio::test]
    async fn test_run_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let value = policy
            .run(&id(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(FetchError::transient("doc-1", "timeout"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_gives_up_after_max_attempts() {
        let policy = RetryPolicy::immediate(2);
        let err = policy
            .run(&id(), |_| async {
                Err::<(), _>(FetchError::transient("doc-1", "timeout"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.attempts(), 2);
        assert_eq!(err.kind(), crate::types::outcome::FailureKind::TransientFetch);
    }

    #[tokio::test]
    async fn test_run_stops_on_permanent() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(5);
        let err = policy
            .run(&id(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(FetchError::permanent("doc-1", "gone")) }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_out_backoff() {
        let policy = RetryPolicy::default()
            .with_delays(Duration::from_secs(60), Duration::from_secs(60))
            .with_jitter(Jitter::None);
        let started = tokio::time::Instant::now();

        let value = policy
            .run(&id(), |attempt| async move {
                if attempt == 1 {
                    Err(FetchError::transient("doc-1", "timeout"))
                } else {
                    Ok(attempt)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert!(started.elapsed() >= Duration::from_secs(60));
    }
}
