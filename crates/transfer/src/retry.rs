use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Reusable retry policy: attempt bound, backoff curve, and (via the
/// predicate passed to [`run`](Self::run)) which errors are worth retrying.
///
/// Shared by the chunk transport (exponential backoff between send
/// attempts) and the job poller (backoff factor 1.0 gives a fixed
/// interval).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (1 = no retries).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
    /// Multiplier applied for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A constant-interval policy (used for polling).
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: interval,
            max_delay: interval,
            backoff_factor: 1.0,
        }
    }

    /// Calculates the delay after a given attempt number (1-based),
    /// with ±25% jitter to avoid thundering herd.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        let jitter = capped * 0.25;
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0; // [-1.0, 1.0)
        let with_jitter = (capped + jitter * offset).max(0.01);
        Duration::from_secs_f64(with_jitter)
    }

    /// Runs `op` until it succeeds, fails non-retryably, or exhausts the
    /// attempt budget. The closure receives the 1-based attempt number.
    ///
    /// Non-retryable errors return immediately without consuming further
    /// budget; the final error is returned as-is either way.
    pub async fn run<T, E, F, Fut>(
        &self,
        is_retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts && is_retryable(&e) => {
                    let delay = self.delay_for_attempt(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_policy() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.initial_delay, Duration::from_millis(500));
        assert!((p.backoff_factor - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn delay_backoff_within_jitter_bounds() {
        let p = RetryPolicy::default();
        // Base delays: 0.5s, 1s, 2s, 4s, 8s, 10s (capped), 10s...
        let expected_base = [0.5, 1.0, 2.0, 4.0, 8.0, 10.0, 10.0];
        for (i, &base) in expected_base.iter().enumerate() {
            let secs = p.delay_for_attempt((i + 1) as u32).as_secs_f64();
            assert!(
                secs >= base * 0.74 && secs <= base * 1.26,
                "attempt {}: {secs} outside ±25% of {base}",
                i + 1
            );
        }
    }

    #[test]
    fn fixed_policy_is_flat() {
        let p = RetryPolicy::fixed(Duration::from_secs(2), 10);
        for attempt in 1..10 {
            let secs = p.delay_for_attempt(attempt).as_secs_f64();
            assert!(secs >= 1.4 && secs <= 2.6, "attempt {attempt}: {secs}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_transient_then_succeeds() {
        let p = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = p
            .run(
                |_| true,
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 3 {
                            Err("transient".to_string())
                        } else {
                            Ok(attempt)
                        }
                    }
                },
            )
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_exhausts_budget() {
        let p = RetryPolicy {
            initial_delay: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = p
            .run(
                |_| true,
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("still down".to_string()) }
                },
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_fatal_error_stops_immediately() {
        let p = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = p
            .run(
                |e: &String| e == "transient",
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("fatal".to_string()) }
                },
            )
            .await;
        assert_eq!(result.unwrap_err(), "fatal");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
