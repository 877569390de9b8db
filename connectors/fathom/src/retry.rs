use regex::Regex;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::Result;

/// Upper bound on a server-provided retry-after hint.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(120);

/// Fixed-delay retry for a single API call. Only transient errors are
/// retried; everything else is returned on the first failure.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let wait = e
                        .retry_after()
                        .map(|d| d.min(MAX_RETRY_AFTER))
                        .unwrap_or(self.delay);

                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label, attempt, self.max_attempts, wait, e
                    );

                    sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Parses a `Retry-After` header value given in seconds.
pub fn parse_retry_after_header(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Extracts the window length from rate-limit bodies such as
/// "... a maximum of 60 calls to the API in a 60 second window."
pub fn parse_retry_after_body(body: &str) -> Option<Duration> {
    static WINDOW: OnceLock<Option<Regex>> = OnceLock::new();
    let re = WINDOW
        .get_or_init(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)[\s-]*seconds?\b").ok())
        .as_ref()?;

    let secs: f64 = re.captures(body)?.get(1)?.as_str().parse().ok()?;
    Some(Duration::from_secs_f64(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FathomError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let attempts = Arc::new(AtomicU32::new(0));

        let result = policy
            .run("list page", || {
                let attempts = Arc::clone(&attempts);
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(FathomError::transient("HTTP 503"))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let attempts = Arc::new(AtomicU32::new(0));

        let result = policy
            .run("transcript", || {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(FathomError::transient("timeout"))
                }
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_transient_errors_are_not_retried() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let attempts = Arc::new(AtomicU32::new(0));

        let result = policy
            .run("transcript", || {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(FathomError::NotFound("m1".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(FathomError::NotFound(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_still_runs_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[test]
    fn test_parse_retry_after_body_plain_english() {
        let body = "Currently, you are able to make a maximum of 60 calls to the API in a 60 second window.";
        assert_eq!(parse_retry_after_body(body), Some(Duration::from_secs(60)));
        assert_eq!(
            parse_retry_after_body("Please wait 1.5 seconds"),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_parse_retry_after_body_without_seconds_phrase() {
        assert_eq!(parse_retry_after_body("no guidance in this body"), None);
    }

    #[test]
    fn test_parse_retry_after_header() {
        assert_eq!(parse_retry_after_header(" 30 "), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after_header("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
