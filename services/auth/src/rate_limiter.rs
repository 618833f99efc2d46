//! Login throttling against password guessing
//!
//! Failed attempts are counted per key (the normalized email). Reaching
//! `max_failures` inside `window_seconds` bans the key for
//! `ban_duration_seconds`. A successful login clears the entry; lapsed
//! windows and expired bans are swept on the next recorded failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Failed attempts tolerated inside one window
    pub max_failures: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Ban duration in seconds
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window_seconds: 300,
            ban_duration_seconds: 900,
        }
    }
}

#[derive(Debug)]
struct Entry {
    failures: u32,
    window_started: Instant,
    banned_until: Option<Instant>,
}

/// Rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether the key may attempt a login right now
    pub async fn is_allowed(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let Some(banned_until) = entries.get(key).map(|entry| entry.banned_until) else {
            return true;
        };

        match banned_until {
            Some(until) if now < until => false,
            Some(_) => {
                entries.remove(key);
                true
            }
            None => true,
        }
    }

    /// Count a failed attempt, banning the key once the limit is reached
    pub async fn record_failure(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);

        entries.retain(|_, entry| match entry.banned_until {
            Some(until) => now < until,
            None => now.duration_since(entry.window_started) < window,
        });

        let entry = entries.entry(key.to_string()).or_insert(Entry {
            failures: 0,
            window_started: now,
            banned_until: None,
        });

        if now.duration_since(entry.window_started) >= window {
            entry.failures = 0;
            entry.window_started = now;
        }

        entry.failures += 1;

        if entry.failures >= self.config.max_failures {
            entry.banned_until =
                Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                "Banned login key {} for {} seconds",
                key, self.config.ban_duration_seconds
            );
        }
    }

    /// Forget the key after a successful login
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_failures: u32, ban_duration_seconds: u64) -> RateLimiter {
        RateLimiter::new(RateLimiterConfig {
            max_failures,
            window_seconds: 300,
            ban_duration_seconds,
        })
    }

    #[tokio::test]
    async fn test_bans_after_max_failures() {
        let limiter = limiter(3, 60);

        for _ in 0..2 {
            limiter.record_failure("ada@example.org").await;
            assert!(limiter.is_allowed("ada@example.org").await);
        }

        limiter.record_failure("ada@example.org").await;
        assert!(!limiter.is_allowed("ada@example.org").await);
        assert!(limiter.is_allowed("grace@example.org").await);
    }

    #[tokio::test]
    async fn test_reset_clears_failures() {
        let limiter = limiter(2, 60);

        limiter.record_failure("ada@example.org").await;
        limiter.reset("ada@example.org").await;
        limiter.record_failure("ada@example.org").await;

        assert!(limiter.is_allowed("ada@example.org").await);
    }

    #[tokio::test]
    async fn test_ban_expires() {
        let limiter = limiter(1, 0);

        limiter.record_failure("ada@example.org").await;
        assert!(limiter.is_allowed("ada@example.org").await);
    }

    #[tokio::test]
    async fn test_lapsed_entries_are_swept() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            max_failures: 5,
            window_seconds: 0,
            ban_duration_seconds: 60,
        });

        for i in 0..100 {
            limiter.record_failure(&format!("user{}@example.org", i)).await;
        }

        assert_eq!(limiter.entries.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_active_bans_survive_sweep() {
        let limiter = limiter(1, 60);

        limiter.record_failure("ada@example.org").await;
        limiter.record_failure("grace@example.org").await;

        assert!(!limiter.is_allowed("ada@example.org").await);
        assert_eq!(limiter.entries.lock().await.len(), 2);
    }
}
