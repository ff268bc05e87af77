//! Per-caller admission gate — fixed-window request counting.
//!
//! Sits in front of the provider layer. Each caller identity (usually the
//! source address) gets a window of `period` during which at most `limit`
//! calls are admitted. The first call after the window closes opens a new one.
//!
//! Check-and-increment happens under a single lock, so concurrent callers
//! sharing a key can never over-admit.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::schema::RateLimitConfig;
use crate::error::ProviderError;

/// Outcome of a single admission check.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// When the caller's current window closes.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Response headers an HTTP layer should attach.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_at.timestamp().to_string()),
        ]
    }

    /// Convert a rejection into an error; admitted decisions pass through.
    pub fn into_result(self) -> Result<Self, ProviderError> {
        if self.allowed {
            Ok(self)
        } else {
            Err(ProviderError::RateLimited {
                limit: self.limit,
                reset_at: self.reset_at,
            })
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Default)]
struct Windows {
    by_key: HashMap<String, Window>,
    last_sweep: Option<Instant>,
}

impl Windows {
    /// Remove every window that closed before `now`.
    fn sweep(&mut self, now: Instant, period: Duration) -> usize {
        let before = self.by_key.len();
        self.by_key
            .retain(|_, w| now.saturating_duration_since(w.started) < period);
        self.last_sweep = Some(now);
        before - self.by_key.len()
    }

    /// Whether a full period has passed since the last sweep.
    fn sweep_due(&self, now: Instant, period: Duration) -> bool {
        match self.last_sweep {
            Some(last) => now.saturating_duration_since(last) >= period,
            None => true,
        }
    }
}

/// Fixed-window rate limiter keyed by caller identity.
///
/// Closed windows are swept during `check_at` at most once per period, so
/// memory tracks the callers active in the last period rather than every
/// caller ever seen.
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    limit: u32,
    period: Duration,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(limit: u32, period: Duration) -> Self {
        Self {
            enabled: true,
            limit,
            period,
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(config.limit, Duration::from_secs(config.period_secs))
        }
    }

    /// Check and count a call from `key` at the current instant.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Check and count a call from `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        if !self.enabled {
            return RateLimitDecision {
                allowed: true,
                limit: self.limit,
                remaining: self.limit,
                reset_at: wall_clock(now, now + self.period),
            };
        }

        let mut windows = self.lock();
        if windows.sweep_due(now, self.period) {
            let removed = windows.sweep(now, self.period);
            if removed > 0 {
                debug!(removed, tracked = windows.by_key.len(), "swept closed rate limit windows");
            }
        }

        let window = windows.by_key.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(window.started) >= self.period {
            debug!(key, "rate limit window rolled over");
            window.started = now;
            window.count = 0;
        }

        let reset_at = wall_clock(now, window.started + self.period);

        if window.count >= self.limit {
            warn!(key, limit = self.limit, reset = %reset_at, "rate limit exceeded");
            return RateLimitDecision {
                allowed: false,
                limit: self.limit,
                remaining: 0,
                reset_at,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - window.count,
            reset_at,
        }
    }

    /// Drop windows that closed before `now`. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        self.lock().sweep(now, self.period)
    }

    /// Number of callers currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.lock().by_key.len()
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        // Counters stay consistent even if a holder panicked mid-check.
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Map a monotonic deadline onto wall-clock time.
fn wall_clock(now: Instant, deadline: Instant) -> DateTime<Utc> {
    let ahead = deadline.saturating_duration_since(now);
    Utc::now() + chrono::Duration::from_std(ahead).unwrap_or_else(|_| chrono::Duration::zero())
}
