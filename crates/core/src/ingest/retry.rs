use std::future::Future;
use std::time::Duration;

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_DELAY_MS: u64 = 1000;
const DEFAULT_THROTTLE_MS: u64 = 1000;

/// Bounded retry with a fixed delay, shared by every fetcher.
///
/// `throttle` is slept before every call, including the first, to stay under provider
/// rate limits. `delay` is slept after a failed attempt that will be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub throttle: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            throttle: Duration::from_millis(DEFAULT_THROTTLE_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        let attempts = std::env::var("DATA_PROVIDER_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_ATTEMPTS);
        let delay_ms = std::env::var("DATA_PROVIDER_RETRY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_DELAY_MS);
        let throttle_ms = std::env::var("DATA_PROVIDER_REQ_DELAY_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_THROTTLE_MS);

        Self {
            attempts: attempts.max(1),
            delay: Duration::from_millis(delay_ms),
            throttle: Duration::from_millis(throttle_ms),
        }
    }

    /// No sleeping at all; for offline runs against canned sources.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
            delay: Duration::ZERO,
            throttle: Duration::ZERO,
        }
    }

    /// Runs `op` until it succeeds or the attempt budget is spent. Exhaustion yields
    /// `None`; the error of each failed attempt is only logged.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let max_attempts = self.attempts.max(1);
        for attempt in 1..=max_attempts {
            if !self.throttle.is_zero() {
                tokio::time::sleep(self.throttle).await;
            }

            match op(attempt).await {
                Ok(value) => return Some(value),
                Err(err) => {
                    tracing::warn!(
                        what,
                        attempt,
                        max_attempts,
                        error = %format!("{err:#}"),
                        "provider call failed"
                    );
                    if attempt < max_attempts && !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        tracing::warn!(what, max_attempts, "retries exhausted; treating as no data");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let out = policy
            .run("flaky", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        anyhow::bail!("transient {attempt}");
                    }
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(out, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_attempt_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(2);

        let out: Option<()> = policy
            .run("broken", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { anyhow::bail!("always fails") }
            })
            .await;

        assert_eq!(out, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn throttles_every_call_and_waits_between_attempts() {
        let policy = RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(500),
            throttle: Duration::from_millis(200),
        };

        let start = tokio::time::Instant::now();
        let mut called_at = Vec::new();
        let out: Option<()> = policy
            .run("down", |_| {
                called_at.push(start.elapsed());
                async { anyhow::bail!("unreachable") }
            })
            .await;

        assert_eq!(out, None);
        let ms = Duration::from_millis;
        assert_eq!(called_at, vec![ms(200), ms(900), ms(1600)]);
        // attempts * throttle + (attempts - 1) * delay
        assert_eq!(start.elapsed(), ms(3 * 200 + 2 * 500));

        let start = tokio::time::Instant::now();
        let out = policy.run("up", |_| async { Ok(1) }).await;
        assert_eq!(out, Some(1));
        assert_eq!(start.elapsed(), ms(200));
    }

    #[tokio::test]
    async fn zero_attempts_still_calls_once() {
        let policy = RetryPolicy {
            attempts: 0,
            ..RetryPolicy::immediate(1)
        };
        let out = policy.run("once", |_| async { Ok(7) }).await;
        assert_eq!(out, Some(7));
    }
}
