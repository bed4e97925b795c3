use std::future::Future;

use crate::error::SunwellError;

/// Centralizes the ad-hoc retry loops spec.md §9 flags: one policy per
/// error kind, looked up from the error itself rather than re-decided at
/// each call site.
pub async fn with_retry<T, F, Fut>(mut operation: F) -> Result<T, SunwellError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SunwellError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let policy = err.retry_policy();
                if attempt >= policy.max_attempts {
                    return Err(err);
                }
                tokio::time::sleep(policy.backoff_for_attempt(attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_up_to_policy_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, SunwellError> = with_retry(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SunwellError::ModelError("transient".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, SunwellError> = with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(SunwellError::ToolExecutionError("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
