//! Fixed-window rate limiter on the coordination store.
//!
//! One counter per (identity, action) pair. The increment that moves the
//! counter from zero sets the window expiry, so the window starts at the
//! first action. Bursts across a window boundary are possible; that
//! tradeoff is accepted over a sliding window.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::CoordResult;
use crate::store::CoordStore;

/// What `allow_or` answers when the store itself fails.
///
/// Fail closed for actions with external cost (an SMS per OTP request);
/// fail open for in-process messaging so availability survives a store
/// outage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    Open,
    Closed,
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CoordStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CoordStore>) -> Self {
        Self { store }
    }

    /// Count one action and report whether it fits the window.
    pub async fn allow(
        &self,
        identity: &str,
        action: &str,
        limit: u64,
        window: Duration,
    ) -> CoordResult<bool> {
        let key = format!("rate:{identity}:{action}");
        let count = self.store.incr(&key).await?;

        if count == 1 {
            self.store.expire(&key, window).await?;
        }

        let allowed = count <= limit;
        if !allowed {
            warn!(identity = %identity, action = %action, count, limit, "Rate limit exceeded");
        }
        Ok(allowed)
    }

    /// `allow`, with store failures resolved by the given policy.
    pub async fn allow_or(
        &self,
        identity: &str,
        action: &str,
        limit: u64,
        window: Duration,
        policy: FailurePolicy,
    ) -> bool {
        match self.allow(identity, action, limit, window).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(
                    identity = %identity,
                    action = %action,
                    error = %e,
                    policy = ?policy,
                    "Rate limiter store failure"
                );
                policy == FailurePolicy::Open
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCoord;

    fn limiter() -> (RateLimiter, MemoryCoord) {
        let store = MemoryCoord::new();
        (RateLimiter::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_exactly_n_actions_pass() {
        let (limiter, _) = limiter();

        for _ in 0..5 {
            assert!(limiter
                .allow("user-1", "send", 5, Duration::from_secs(60))
                .await
                .unwrap());
        }
        assert!(!limiter
            .allow("user-1", "send", 5, Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_window_resets_counter() {
        let (limiter, _) = limiter();
        let window = Duration::from_millis(40);

        assert!(limiter.allow("u", "a", 1, window).await.unwrap());
        assert!(!limiter.allow("u", "a", 1, window).await.unwrap());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(limiter.allow("u", "a", 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_identities_and_actions_isolated() {
        let (limiter, _) = limiter();
        let window = Duration::from_secs(60);

        assert!(limiter.allow("u1", "send", 1, window).await.unwrap());
        assert!(!limiter.allow("u1", "send", 1, window).await.unwrap());

        // Different identity, same action.
        assert!(limiter.allow("u2", "send", 1, window).await.unwrap());
        // Same identity, different action.
        assert!(limiter.allow("u1", "join", 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn test_fail_open_allows_on_store_failure() {
        let (limiter, store) = limiter();
        store.set_unavailable(true);

        assert!(
            limiter
                .allow_or("u", "send", 1, Duration::from_secs(60), FailurePolicy::Open)
                .await
        );
    }

    #[tokio::test]
    async fn test_fail_closed_denies_on_store_failure() {
        let (limiter, store) = limiter();
        store.set_unavailable(true);

        assert!(
            !limiter
                .allow_or("u", "otp", 3, Duration::from_secs(3600), FailurePolicy::Closed)
                .await
        );
    }
}
