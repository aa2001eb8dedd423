//! Bounded retry loops around cloud calls

use std::future::Future;
use std::time::{Duration, Instant};

use super::error::{is_expected, ApiError, RETRYABLE_CODES};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Outcome of one attempt inside [`retry`]
#[derive(Debug)]
pub enum RetryError {
    Retryable(ApiError),
    NonRetryable(ApiError),
}

impl RetryError {
    pub fn into_inner(self) -> ApiError {
        match self {
            RetryError::Retryable(e) | RetryError::NonRetryable(e) => e,
        }
    }
}

/// Classifies an error. Transport failures, the common retryable codes and
/// `extra` codes are retried; everything else stops the loop.
pub fn retry_error(err: ApiError, extra: &[&str]) -> RetryError {
    if err.is_transport() || is_expected(&err, RETRYABLE_CODES) || is_expected(&err, extra) {
        tracing::debug!(error = %err, "retryable error");
        RetryError::Retryable(err)
    } else {
        RetryError::NonRetryable(err)
    }
}

/// Re-runs `op` while it reports [`RetryError::Retryable`], backing off
/// exponentially, until `timeout` elapses
pub async fn retry<T, F, Fut>(timeout: Duration, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let deadline = Instant::now() + timeout;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(e)) => return Err(e),
            Err(RetryError::Retryable(e)) => {
                let now = Instant::now();
                if now + backoff > deadline {
                    tracing::warn!(
                        timeout_secs = timeout.as_secs(),
                        error = %e,
                        "giving up after retry timeout"
                    );
                    return Err(e);
                }
                tokio::time::sleep(backoff).await;
                backoff = std::cmp::min(backoff * 2, MAX_BACKOFF);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cloud(code: &str) -> ApiError {
        ApiError::Cloud {
            code: code.to_string(),
            message: "m".to_string(),
            request_id: "r".to_string(),
        }
    }

    #[test]
    fn classification() {
        assert!(matches!(
            retry_error(cloud("InternalError"), &[]),
            RetryError::Retryable(_)
        ));
        assert!(matches!(
            retry_error(cloud("ResourceInUse.Vpc"), &[]),
            RetryError::Retryable(_)
        ));
        assert!(matches!(
            retry_error(cloud("UnsupportedOperation.MutexOperationTaskRunning"), &[]),
            RetryError::NonRetryable(_)
        ));
        assert!(matches!(
            retry_error(
                cloud("UnsupportedOperation.MutexOperationTaskRunning"),
                &["UnsupportedOperation.MutexOperationTaskRunning"]
            ),
            RetryError::Retryable(_)
        ));
        assert!(matches!(
            retry_error(ApiError::ServiceUnavailable, &[]),
            RetryError::Retryable(_)
        ));
        assert!(matches!(
            retry_error(cloud("InvalidParameter"), &[]),
            RetryError::NonRetryable(_)
        ));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result = retry(Duration::from_secs(5), move || async move {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RetryError::Retryable(cloud("ResourceBusy")))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(tokio_test::assert_ok!(result), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let result: Result<(), _> = retry(Duration::from_secs(5), move || async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(RetryError::NonRetryable(cloud("InvalidParameter")))
        })
        .await;

        let err = tokio_test::assert_err!(result);
        assert_eq!(err.code(), Some("InvalidParameter"));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_with_last_error_after_timeout() {
        let start = Instant::now();
        let result: Result<(), _> = retry(Duration::from_millis(350), || async {
            Err(RetryError::Retryable(cloud("ResourceInUse")))
        })
        .await;

        assert_eq!(result.unwrap_err().code(), Some("ResourceInUse"));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
