//! Login attempt limiter
//!
//! In-memory guard against credential stuffing on the login route, keyed by
//! the submitted identifier. Attempts decay with their window; exhausting
//! the budget earns the key a short ban.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Limiter tuning knobs
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Attempts allowed within one window
    pub max_attempts: u32,
    /// Length of the attempt window
    pub window: Duration,
    /// How long a key stays banned after exhausting its budget
    pub ban: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(60),
            ban: Duration::from_secs(300),
        }
    }
}

#[derive(Debug)]
struct AttemptRecord {
    attempts: u32,
    window_started: Instant,
    banned_until: Option<Instant>,
}

/// Per-identifier login attempt limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    records: Arc<Mutex<HashMap<String, AttemptRecord>>>,
}

impl RateLimiter {
    /// Create a new limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt for `key`
    ///
    /// Returns `false` when the key is banned or has exhausted its window
    /// budget; the caller must refuse the login without contacting the
    /// backend.
    pub async fn check(&self, key: &str) -> bool {
        let mut records = self.records.lock().await;
        let now = Instant::now();

        let record = records.entry(key.to_string()).or_insert(AttemptRecord {
            attempts: 0,
            window_started: now,
            banned_until: None,
        });

        if let Some(until) = record.banned_until {
            if now < until {
                return false;
            }
            record.banned_until = None;
            record.attempts = 0;
            record.window_started = now;
        }

        if now.duration_since(record.window_started) >= self.config.window {
            record.attempts = 0;
            record.window_started = now;
        }

        if record.attempts >= self.config.max_attempts {
            record.banned_until = Some(now + self.config.ban);
            warn!("Login attempts exhausted for {}", key);
            return false;
        }

        record.attempts += 1;
        true
    }

    /// Forget a key after a successful login.
    pub async fn reset(&self, key: &str) {
        let mut records = self.records.lock().await;
        records.remove(key);
    }
}
