//! Retry with exponential backoff and jitter.

use crate::error::{TransportError, TransportErrorKind};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

/// Sends a single HTTP request.
///
/// Implemented for [`reqwest::Client`]; tests and callers with special needs
/// can plug in their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: reqwest::Request)
        -> Result<reqwest::Response, TransportError>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn execute(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, TransportError> {
        reqwest::Client::execute(self, request)
            .await
            .map_err(TransportError::from)
    }
}

/// Which transport failures are worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOn {
    /// Retry requests that timed out.
    pub timeouts: bool,
    /// Retry requests that failed to connect.
    pub connect_errors: bool,
}

impl Default for RetryOn {
    fn default() -> Self {
        Self {
            timeouts: true,
            connect_errors: false,
        }
    }
}

impl RetryOn {
    /// Whether a failure of `kind` is retried.
    pub fn should_retry(&self, kind: TransportErrorKind) -> bool {
        match kind {
            TransportErrorKind::Timeout => self.timeouts,
            TransportErrorKind::Connect => self.connect_errors,
            TransportErrorKind::Other => false,
        }
    }
}

/// Retry configuration for a request.
///
/// `max_attempts` counts every attempt, the first one included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    retry_on: RetryOn,
}

impl RetryPolicy {
    /// Delay before the first retry when none is configured.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

    /// Build a policy, normalizing out-of-range values.
    ///
    /// Zero attempts becomes one, a zero base delay becomes one second and
    /// a zero max delay becomes sixteen times the base delay.
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        let base_delay = if base_delay.is_zero() {
            Self::DEFAULT_BASE_DELAY
        } else {
            base_delay
        };
        let max_delay = if max_delay.is_zero() {
            base_delay.saturating_mul(16)
        } else {
            max_delay
        };

        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            retry_on: RetryOn::default(),
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Replace the retryable failure kinds.
    pub fn with_retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Total attempts, the first included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on the backoff.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Failure kinds that are retried.
    pub fn retry_on(&self) -> RetryOn {
        self.retry_on
    }

    /// Un-jittered delay before the `retry`-th retry (1-based):
    /// `min(base * 2^(retry-1), max)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff scaled by a uniform factor in `[0.5, 1.5)`. Delays too large
    /// to scale are returned unjittered.
    pub fn jittered_backoff(&self, retry: u32) -> Duration {
        let backoff = self.backoff(retry);
        let factor = rand::thread_rng().gen_range(0.5..1.5);
        Duration::try_from_secs_f64(backoff.as_secs_f64() * factor).unwrap_or(backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Execute `request`, retrying retryable transport failures per `policy`.
///
/// Any HTTP response, whatever its status, ends the loop.
pub(crate) async fn execute(
    transport: &dyn Transport,
    request: reqwest::Request,
    policy: &RetryPolicy,
) -> Result<reqwest::Response, TransportError> {
    let method = request.method().clone();
    let url = request.url().clone();

    let mut request = request;
    let mut attempt = 1;
    loop {
        let next = if attempt < policy.max_attempts {
            request.try_clone()
        } else {
            None
        };

        debug!(%method, %url, attempt, "sending request");
        let err = match transport.execute(request).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        let next = match next {
            Some(next) if policy.retry_on.should_retry(err.kind()) => next,
            _ => return Err(err),
        };

        let delay = policy.jittered_backoff(attempt);
        warn!(
            %method,
            %url,
            attempt,
            max_attempts = policy.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "request failed, retrying"
        );
        tokio::time::sleep(delay).await;

        request = next;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, Url};
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct FailingTransport {
        kind: TransportErrorKind,
        calls: Mutex<Vec<Instant>>,
    }

    impl FailingTransport {
        fn new(kind: TransportErrorKind) -> Self {
            Self {
                kind,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FailingTransport {
        async fn execute(
            &self,
            _request: reqwest::Request,
        ) -> Result<reqwest::Response, TransportError> {
            self.calls.lock().unwrap().push(Instant::now());
            Err(TransportError::new(self.kind, "simulated failure"))
        }
    }

    fn request() -> reqwest::Request {
        reqwest::Request::new(Method::GET, Url::parse("http://example.test/ping").unwrap())
    }

    #[test]
    fn test_policy_normalization() {
        let policy = RetryPolicy::new(0, Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.base_delay(), Duration::from_secs(1));
        assert_eq!(policy.max_delay(), Duration::from_secs(16));

        let policy = RetryPolicy::new(3, Duration::from_millis(200), Duration::ZERO);
        assert_eq!(policy.max_delay(), Duration::from_millis(3200));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(4));
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(4));
        assert_eq!(policy.backoff(64), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_secs(1));
        for retry in 1..=5 {
            let base = policy.backoff(retry);
            for _ in 0..50 {
                let delay = policy.jittered_backoff(retry);
                assert!(delay >= base / 2, "{delay:?} below half of {base:?}");
                assert!(delay < base.mul_f64(1.5), "{delay:?} above 1.5x {base:?}");
            }
        }
    }

    #[test]
    fn test_jitter_near_duration_max() {
        let policy = RetryPolicy::new(3, Duration::MAX / 2, Duration::ZERO);
        assert_eq!(policy.max_delay(), Duration::MAX);
        for retry in 1..=3 {
            for _ in 0..50 {
                assert!(policy.jittered_backoff(retry) > Duration::from_secs(u64::MAX / 8));
            }
        }
    }

    #[test]
    fn test_retry_on_default_is_timeouts_only() {
        let retry_on = RetryOn::default();
        assert!(retry_on.should_retry(TransportErrorKind::Timeout));
        assert!(!retry_on.should_retry(TransportErrorKind::Connect));
        assert!(!retry_on.should_retry(TransportErrorKind::Other));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_use_every_attempt_with_backoff() {
        let transport = FailingTransport::new(TransportErrorKind::Timeout);
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4));

        let err = execute(&transport, request(), &policy).await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Timeout);

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        for (i, pair) in calls.windows(2).enumerate() {
            let gap = pair[1] - pair[0];
            let base = policy.backoff(i as u32 + 1);
            assert!(gap >= base / 2, "gap {gap:?} too short for {base:?}");
            assert!(gap < base.mul_f64(1.5), "gap {gap:?} too long for {base:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_timeout_fails_immediately() {
        let transport = FailingTransport::new(TransportErrorKind::Connect);
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4));
        let started = Instant::now();

        let err = execute(&transport, request(), &policy).await.unwrap_err();
        assert_eq!(err.kind(), TransportErrorKind::Connect);
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_errors_retried_when_enabled() {
        let transport = FailingTransport::new(TransportErrorKind::Connect);
        let policy = RetryPolicy::new(2, Duration::from_millis(10), Duration::ZERO).with_retry_on(
            RetryOn {
                timeouts: true,
                connect_errors: true,
            },
        );

        let _ = execute(&transport, request(), &policy).await;
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_without_policy() {
        let transport = FailingTransport::new(TransportErrorKind::Timeout);

        let _ = execute(&transport, request(), &RetryPolicy::none()).await;
        assert_eq!(transport.calls().len(), 1);
    }
}
