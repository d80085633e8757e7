use std::future::Future;

use tokio::time::sleep;

use crate::{backoff::BackoffPolicy, error::LLMError};

/// Result of a retry loop together with how many times the operation ran.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T, LLMError>,
    pub attempts: u32,
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the policy's
/// attempt budget is spent. Sleeps `policy.delay_for_attempt(n)` between attempts.
///
/// `label` only appears in log lines.
pub async fn retry_with_policy<F, Fut, T>(
    policy: &BackoffPolicy,
    label: &str,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LLMError>>,
{
    let mut attempt = 1u32;
    loop {
        match op().await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(err) if !err.is_retryable() => {
                log::debug!("{label}: attempt {attempt} failed permanently: {err}");
                return RetryOutcome {
                    result: Err(err),
                    attempts: attempt,
                };
            }
            Err(err) if !policy.should_retry(attempt) => {
                log::debug!("{label}: attempt {attempt} failed, retry budget spent: {err}");
                return RetryOutcome {
                    result: Err(err),
                    attempts: attempt,
                };
            }
            Err(err) => {
                let delay = policy.delay_for_attempt(attempt);
                log::debug!(
                    "{label}: attempt {attempt}/{} failed ({err}), retrying in {delay:?}",
                    policy.max_attempts()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::{retry_with_policy, RetryOutcome};
    use crate::{backoff::BackoffPolicy, error::LLMError};

    fn policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy::new(
            max_attempts,
            Duration::from_millis(100),
            Duration::from_secs(1),
            2.0,
            false,
        )
        .expect("policy")
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_errors_until_success() {
        let calls = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let outcome = retry_with_policy(&policy(3), "test", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LLMError::ProviderError("503".into()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(outcome.result.expect("success"), "done");
        assert_eq!(outcome.attempts, 3);
        assert_eq!(started.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_budget() {
        let calls = &AtomicU32::new(0);
        let outcome: RetryOutcome<()> =
            retry_with_policy(&policy(2), "test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LLMError::Timeout("slow".into()))
            })
            .await;

        assert!(outcome.result.expect_err("exhausted").is_timeout());
        assert_eq!(outcome.attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_auth_errors() {
        let calls = &AtomicU32::new(0);
        let outcome: RetryOutcome<()> =
            retry_with_policy(&policy(5), "test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LLMError::AuthError("bad key".into()))
            })
            .await;

        assert!(outcome.result.expect_err("auth").is_auth_error());
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
