//! Per-client admission control
//!
//! Fixed-window request counting keyed by `client:endpoint`. A window
//! admits up to `max_requests`; the first request past the limit is denied
//! until the window resets. The boundary-burst trade-off of a fixed window
//! is accepted for simplicity.
//!
//! State is process-wide and volatile: a cold start resets all counters.
//! That is a documented limitation of this admission layer, not a bug.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// Per-endpoint admission policy
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

/// Configured endpoint policies. AI analysis is the most expensive and
/// abuse-prone call, so it carries the tightest limit.
pub const PRODUCT_LOOKUP: RateLimitConfig = RateLimitConfig {
    max_requests: 30,
    window: Duration::from_secs(60),
};
pub const NAME_SEARCH: RateLimitConfig = RateLimitConfig {
    max_requests: 20,
    window: Duration::from_secs(60),
};
pub const CERTIFICATION_CHECK: RateLimitConfig = RateLimitConfig {
    max_requests: 15,
    window: Duration::from_secs(60),
};
pub const AI_ANALYSIS: RateLimitConfig = RateLimitConfig {
    max_requests: 10,
    window: Duration::from_secs(60),
};

/// Admission decision for one request
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Injected admission-control service
///
/// One instance per process, shared across handlers via `AppState`.
pub struct RateLimiter {
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Check and count one request for `client_key` against `endpoint`
    pub async fn check(
        &self,
        client_key: &str,
        endpoint: &str,
        config: &RateLimitConfig,
    ) -> RateLimitDecision {
        let key = format!("{}:{}", client_key, endpoint);
        let now = Utc::now();
        let window = ChronoDuration::from_std(config.window)
            .unwrap_or_else(|_| ChronoDuration::seconds(60));

        let mut entries = self.entries.lock().await;

        let entry = entries.entry(key).or_insert(WindowEntry {
            count: 0,
            reset_at: now + window,
        });

        // An expired window behaves like a missing entry
        if entry.reset_at <= now {
            entry.count = 0;
            entry.reset_at = now + window;
        }

        if entry.count >= config.max_requests {
            tracing::debug!(
                client = %client_key,
                endpoint = %endpoint,
                reset_at = %entry.reset_at,
                "Rate limit exceeded"
            );
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: entry.reset_at,
            };
        }

        entry.count += 1;
        RateLimitDecision {
            allowed: true,
            remaining: config.max_requests - entry.count,
            reset_at: entry.reset_at,
        }
    }

    /// Remove expired windows
    ///
    /// Garbage collection only; correctness does not depend on it since
    /// `check` treats an expired entry the same as a missing one.
    pub async fn sweep_expired(&self) {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.reset_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, "Swept expired rate-limit windows");
        }
    }

    #[cfg(test)]
    async fn active_entries(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(max_requests: u32, window_ms: u64) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            window: Duration::from_millis(window_ms),
        }
    }

    #[tokio::test]
    async fn test_allows_up_to_limit_then_denies() {
        let limiter = RateLimiter::new();
        let config = test_config(3, 60_000);

        for i in 0..3 {
            let decision = limiter.check("1.2.3.4", "lookup", &config).await;
            assert!(decision.allowed, "request {} should be allowed", i + 1);
            assert_eq!(decision.remaining, 2 - i);
        }

        let denied = limiter.check("1.2.3.4", "lookup", &config).await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.reset_at > Utc::now());
    }

    #[tokio::test]
    async fn test_window_expiry_resets_count() {
        let limiter = RateLimiter::new();
        let config = test_config(1, 50);

        assert!(limiter.check("1.2.3.4", "lookup", &config).await.allowed);
        assert!(!limiter.check("1.2.3.4", "lookup", &config).await.allowed);

        tokio::time::sleep(Duration::from_millis(80)).await;

        let after = limiter.check("1.2.3.4", "lookup", &config).await;
        assert!(after.allowed, "request after window expiry should reset the count");
        assert_eq!(after.remaining, 0);
    }

    #[tokio::test]
    async fn test_clients_and_endpoints_are_independent() {
        let limiter = RateLimiter::new();
        let config = test_config(1, 60_000);

        assert!(limiter.check("1.2.3.4", "lookup", &config).await.allowed);
        assert!(!limiter.check("1.2.3.4", "lookup", &config).await.allowed);

        // Different endpoint, same client
        assert!(limiter.check("1.2.3.4", "search", &config).await.allowed);
        // Different client, same endpoint
        assert!(limiter.check("5.6.7.8", "lookup", &config).await.allowed);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let limiter = RateLimiter::new();
        let short = test_config(5, 20);
        let long = test_config(5, 60_000);

        limiter.check("1.2.3.4", "lookup", &short).await;
        limiter.check("1.2.3.4", "search", &long).await;
        assert_eq!(limiter.active_entries().await, 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        limiter.sweep_expired().await;
        assert_eq!(limiter.active_entries().await, 1);
    }
}
