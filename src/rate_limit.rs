use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Global pacing gate shared by every worker of a crawl.
///
/// The lock is held across the wait, so concurrent callers queue up and each
/// one observes the timestamp written by its predecessor.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    last_acquired: Mutex<Option<Instant>>,
    stop: CancellationToken,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_acquired: Mutex::new(None),
            stop: CancellationToken::new(),
        }
    }

    /// Ties admission to `stop`: once it fires, waiting and future callers are
    /// turned away.
    pub fn with_stop_signal(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }

    /// Waits until at least `delay` has passed since the previous successful
    /// `acquire`. Returns `false` without waiting out the delay when the stop
    /// signal has fired; the caller must not start a request in that case.
    #[must_use]
    pub async fn acquire(&self) -> bool {
        let mut last = tokio::select! {
            biased;
            _ = self.stop.cancelled() => return false,
            guard = self.last_acquired.lock() => guard,
        };

        if let Some(previous) = *last {
            let ready_at = previous + self.delay;
            let now = Instant::now();
            if ready_at > now {
                let wait = ready_at - now;
                tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limiting");
                tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => return false,
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }
        if self.stop.is_cancelled() {
            return false;
        }
        *last = Some(Instant::now());
        true
    }

    /// Sleeps for `wait` outside the pacing gate. Returns `false` as soon as
    /// the stop signal fires.
    #[must_use]
    pub async fn pause(&self, wait: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.stop.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }
}
