/// Retry and pacing policies shared by the embedding client and the bulk loader
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Bounded retry policy
///
/// `multiplier == 1.0` gives a fixed delay (embedding rate limits), anything
/// larger an exponential one capped at `max_delay` (bulk transport failures).
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Total attempts, first try included
    pub max_attempts: u32,
}

impl BackoffPolicy {
    /// Fixed delay between attempts
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            max_attempts,
        }
    }

    /// Doubling delay capped at `max_delay`
    pub fn exponential(initial_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            initial_delay,
            multiplier: 2.0,
            max_delay,
            max_attempts,
        }
    }

    /// Delay before retry number `retry` (0 = first retry)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(63) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The last error is returned on exhaustion.
    pub async fn retry<T, E, F, Fut, R>(&self, mut is_retryable: R, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(&E) -> bool,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= attempts || !is_retryable(&e) {
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt - 1);
                    debug!("Attempt {}/{} failed, retrying in {:?}", attempt, attempts, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5), 3)
    }
}

/// Enforces a minimum pause between consecutive operations
///
/// The pause is measured from the end of one operation to the start of the
/// next, so a slow operation never eats into it. Callers are serialized on
/// the lock.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    finished: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            finished: Mutex::new(None),
        }
    }

    /// Run `op` once `interval` has passed since the previous operation ended
    pub async fn run<F: Future>(&self, op: F) -> F::Output {
        let mut finished = self.finished.lock().await;
        if let Some(previous) = *finished {
            let ready_at = previous + self.interval;
            if Instant::now() < ready_at {
                debug!("Pacing for {:?}", ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }
        let output = op.await;
        *finished = Some(Instant::now());
        output
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
