//! Generic retry-with-backoff helper (SPEC_FULL §C.1), grounded in
//! `sync_utils.py::execute_with_retry`: retries a fallible async operation
//! up to `max_attempts` times with exponential backoff, logging each retry.

use std::time::Duration;

pub async fn execute_with_retry<F, Fut, T, E>(
    mut op: F,
    max_attempts: u32,
    base_delay: Duration,
    op_name: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(e);
                }
                let delay = base_delay * 2u32.pow(attempt - 1);
                tracing::warn!(op_name, attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying after failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &'static str> = execute_with_retry(
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("not yet")
                } else {
                    Ok(42)
                }
            },
            5,
            Duration::from_millis(1),
            "test-op",
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &'static str> = execute_with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("always fails")
            },
            3,
            Duration::from_millis(1),
            "test-op",
        )
        .await;
        assert_eq!(result, Err("always fails"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
