use std::time::Duration;

#[derive(Clone)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Tuned for the recoverable collaborators (chat, code execution).
    /// Scoring is never retried automatically; the user retries the whole
    /// submission.
    pub fn collaborator() -> Self {
        Self::default()
    }
}

/// Runs `op` until it succeeds or the attempt budget is spent, backing off
/// exponentially with a little jitter between attempts.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut remaining = policy.attempts.max(1);
    let mut delay = policy.base_delay;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                remaining -= 1;
                if remaining == 0 {
                    return Err(e);
                }

                let jitter_ms = policy.jitter.as_millis() as u64;
                let extra = if jitter_ms == 0 {
                    0
                } else {
                    rand::random::<u64>() % (jitter_ms + 1)
                };
                tokio::time::sleep(delay + Duration::from_millis(extra)).await;
                delay = std::cmp::min(delay * 2, policy.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn fast_policy(attempts: usize) -> RetryPolicy {
        RetryPolicy {
            attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn succeeds_once_the_operation_recovers() {
        let tries = AtomicUsize::new(0);
        let result: Result<usize, &'static str> = with_retry(&fast_policy(3), || async {
            let n = tries.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("transient")
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(tries.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_budget() {
        let tries = AtomicUsize::new(0);
        let result: Result<(), &'static str> = with_retry(&fast_policy(2), || async {
            tries.fetch_add(1, Ordering::SeqCst);
            Err("permanent")
        })
        .await;

        assert!(result.is_err());
        assert_eq!(tries.load(Ordering::SeqCst), 2);
    }
}
