//! Exponential backoff helper shared by every feed plugin's fetch path.

use std::time::Duration;
use tokio::time::sleep;

/// Retries `f` up to `attempts` times with exponential backoff starting at
/// `initial_delay_ms` and capped at `max_delay_ms`. Feed plugins call this
/// with `(3, 1_000, 10_000, ...)` per spec §4.A.
pub async fn retry_with_backoff<F, Fut, T, E>(
    attempts: u8,
    initial_delay_ms: u64,
    max_delay_ms: u64,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut last_error = None;

    for attempt in 0..attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                last_error = Some(e);

                if attempt < attempts - 1 {
                    let delay_ms = (initial_delay_ms * 2_u64.pow(attempt as u32)).min(max_delay_ms);
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    Err(last_error.unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_third_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = retry_with_backoff(5, 1, 10, || {
            let c = counter_clone.clone();
            async move {
                let count = c.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err("failed")
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let result: Result<(), &str> = retry_with_backoff(3, 1, 10, || async { Err("always fails") }).await;
        assert_eq!(result.unwrap_err(), "always fails");
    }

    #[tokio::test]
    async fn delay_is_capped_at_max() {
        // attempts=4, initial=1000ms, max=10ms: every retry should clamp to
        // 10ms, so this completes fast instead of taking seconds.
        let start = std::time::Instant::now();
        let result: Result<(), &str> = retry_with_backoff(4, 1000, 10, || async { Err("fail") }).await;
        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
