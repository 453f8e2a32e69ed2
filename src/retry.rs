use std::time::Duration;

use backoff::{future::retry, ExponentialBackoff};

/// The exponential backoff policy shared by broker reconnects and the
/// database Insert path: 500ms initial interval, capped at 60s, with no
/// elapsed-time ceiling (retries forever until the operation succeeds or the
/// process is asked to shut down).
pub fn policy() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(500),
        max_interval: Duration::from_secs(60),
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    }
}

/// Runs `op` under [`policy`], treating every error it returns as transient
/// and worth retrying. `op` itself decides, via its own return type, whether
/// a particular failure should instead be escalated (by wrapping it in
/// `backoff::Error::Permanent`).
pub async fn with_backoff<T, E, F, Fut>(op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, backoff::Error<E>>>,
{
    retry(policy(), op).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_has_no_elapsed_time_ceiling() {
        let policy = policy();
        assert!(policy.max_elapsed_time.is_none());
        assert_eq!(policy.initial_interval, Duration::from_millis(500));
        assert_eq!(policy.max_interval, Duration::from_secs(60));
    }
}
