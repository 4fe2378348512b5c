use crate::config::MySqlAuthConfig;
use crate::error::SessionError;
use backon::{ConstantBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Fixed-delay, bounded retry for store queries.
///
/// Every failure is retried the same way. Once all attempts fail the last
/// error is returned wrapped in [`SessionError::RetriesExhausted`], so an
/// empty result always means "no rows".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRetrier {
    delay: Duration,
    max_attempts: usize,
}

impl QueryRetrier {
    /// `max_attempts` counts the first try; zero is treated as one.
    pub fn new(delay: Duration, max_attempts: usize) -> Self {
        Self {
            delay,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(cfg: &MySqlAuthConfig) -> Self {
        Self::new(cfg.retry_delay(), cfg.max_retries)
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn policy(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_attempts - 1)
    }

    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, SessionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SessionError>>,
    {
        let mut attempts = 0usize;
        let result = (|| {
            attempts += 1;
            op()
        })
        .retry(self.policy())
        .notify(|err: &SessionError, dur: Duration| {
            warn!(error = %err, delay = ?dur, "query failed, retrying");
        })
        .await;

        result.map_err(|e| SessionError::RetriesExhausted {
            attempts,
            source: Box::new(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn failure() -> SessionError {
        SessionError::Config("connection refused".to_string())
    }

    #[tokio::test]
    async fn exhaustion_is_a_typed_failure_after_max_attempts() {
        let retrier = QueryRetrier::new(Duration::from_millis(20), 4);
        let calls = AtomicUsize::new(0);

        let started = Instant::now();
        let result: Result<Vec<u8>, _> = retrier
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(failure())
            })
            .await;
        let elapsed = started.elapsed();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(SessionError::RetriesExhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(*source, SessionError::Config(_)));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        // Three sleeps between four attempts.
        assert!(elapsed >= Duration::from_millis(60), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let retrier = QueryRetrier::new(Duration::from_millis(1), 5);
        let calls = AtomicUsize::new(0);

        let value = retrier
            .run(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(failure())
                } else {
                    Ok(7)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let retrier = QueryRetrier::new(Duration::from_millis(1), 0);
        assert_eq!(retrier.max_attempts(), 1);
        let calls = AtomicUsize::new(0);
        let result: Result<(), _> = retrier
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(failure())
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.unwrap_err().is_exhausted());
    }

    #[test]
    fn reads_policy_from_config() {
        let mut cfg = MySqlAuthConfig::new("main");
        cfg.retry_request_delay_ms = 50;
        cfg.max_retries = 3;
        let retrier = QueryRetrier::from_config(&cfg);
        assert_eq!(retrier.delay(), Duration::from_millis(50));
        assert_eq!(retrier.max_attempts(), 3);
    }
}
