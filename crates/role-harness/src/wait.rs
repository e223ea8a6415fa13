//! Condition polling with a bounded deadline
//!
//! Every wait in the harness is a probe re-run on a backoff schedule until it
//! yields a value or the deadline passes. There are no fixed-duration sleeps
//! outside this module.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::trace;

use crate::error::Result;

/// Polling cadence: first delay, doubled after every miss, capped at `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl PollPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    pub fn backoff(&self) -> Backoff {
        Backoff {
            next: self.initial,
            max: self.max,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(1))
    }
}

/// Delay sequence produced by a [`PollPolicy`]
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
}

impl Backoff {
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }
}

/// Re-run `probe` until it returns `Some`, or give up after `limit`
///
/// The probe runs once before any delay, so a condition that already holds
/// returns without sleeping. Returns `Ok(None)` when the deadline passes and
/// propagates the first probe error.
pub async fn poll_until<T, F, Fut>(limit: Duration, policy: PollPolicy, mut probe: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let outcome = timeout(limit, async {
        let mut backoff = policy.backoff();
        loop {
            if let Some(value) = probe().await? {
                return Ok(value);
            }
            let delay = backoff.next_delay();
            trace!("Condition not met, polling again in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    })
    .await;

    match outcome {
        Ok(Ok(value)) => Ok(Some(value)),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_until_cap() {
        let policy = PollPolicy::new(Duration::from_millis(100), Duration::from_millis(500));
        let mut backoff = policy.backoff();

        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn test_policy_max_never_below_initial() {
        let policy = PollPolicy::new(Duration::from_millis(300), Duration::from_millis(100));
        assert_eq!(policy.max, Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_returns_immediately_when_condition_holds() {
        let start = tokio::time::Instant::now();
        let value = poll_until(Duration::from_secs(5), PollPolicy::default(), || async {
            Ok(Some(7))
        })
        .await
        .unwrap();

        assert_eq!(value, Some(7));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_retries_until_success() {
        let calls = AtomicU32::new(0);
        let value = poll_until(Duration::from_secs(5), PollPolicy::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok((n >= 3).then_some(n)) }
        })
        .await
        .unwrap();

        assert_eq!(value, Some(3));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out() {
        let start = tokio::time::Instant::now();
        let value: Option<()> = poll_until(Duration::from_secs(2), PollPolicy::default(), || async {
            Ok(None)
        })
        .await
        .unwrap();

        assert!(value.is_none());
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_propagates_errors() {
        let result: Result<Option<()>> =
            poll_until(Duration::from_secs(2), PollPolicy::default(), || async {
                Err(HarnessError::Driver("target closed".to_string()))
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            HarnessError::Driver("target closed".to_string())
        );
    }
}
