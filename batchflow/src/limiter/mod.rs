//! Sliding-window rate limiting for external resource calls.
//!
//! The limiter bounds how many calls may *start* within any trailing
//! window. It keeps a log of start timestamps behind an async mutex;
//! [`RateLimiter::acquire`] holds the mutex across its wait so that
//! queued callers are admitted strictly in arrival order, and when
//! several slots expire at once, exactly enough waiters are released
//! to fill the window again.

use crate::errors::SpecError;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Configuration for a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LimiterConfig {
    /// Maximum number of call starts within any trailing window.
    pub max_requests: usize,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_ms: 60_000,
        }
    }
}

impl LimiterConfig {
    /// Creates a new limiter config.
    #[must_use]
    pub const fn new(max_requests: usize, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }

    /// Validates the config.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.max_requests == 0 {
            return Err(SpecError::new("limiter max_requests must be at least 1"));
        }
        if self.window_ms == 0 {
            return Err(SpecError::new("limiter window_ms must be at least 1"));
        }
        Ok(())
    }
}

/// A sliding-window rate limiter shared by every task attempt in a run.
#[derive(Debug)]
pub struct RateLimiter {
    config: LimiterConfig,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter from a config.
    #[must_use]
    pub fn new(config: LimiterConfig) -> Self {
        Self {
            window: Duration::from_millis(config.window_ms),
            starts: Mutex::new(VecDeque::with_capacity(config.max_requests)),
            config,
        }
    }

    /// The config this limiter was built from.
    #[must_use]
    pub const fn config(&self) -> &LimiterConfig {
        &self.config
    }

    /// Waits until a call may start, then records its start timestamp.
    ///
    /// The wait is indefinite. Holding the internal mutex across the
    /// sleep keeps admission first-come-first-served: tokio's mutex
    /// queues contending waiters in arrival order.
    pub async fn acquire(&self) {
        // Validated configs keep capacity >= 1; the clamp keeps acquire
        // terminating even for a hand-built zero config.
        let capacity = self.config.max_requests.max(1);
        let mut starts = self.starts.lock().await;
        loop {
            let now = Instant::now();
            while starts
                .front()
                .is_some_and(|&t| now.duration_since(t) >= self.window)
            {
                starts.pop_front();
            }
            if starts.len() < capacity {
                starts.push_back(now);
                return;
            }
            if let Some(&oldest) = starts.front() {
                let ready_at = oldest + self.window;
                tracing::trace!(
                    wait_ms = (ready_at - now).as_secs_f64() * 1000.0,
                    "rate limiter at capacity"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
    }

    /// Number of call starts still inside the trailing window.
    pub async fn in_window(&self) -> usize {
        let mut starts = self.starts.lock().await;
        let now = Instant::now();
        while starts
            .front()
            .is_some_and(|&t| now.duration_since(t) >= self.window)
        {
            starts.pop_front();
        }
        starts.len()
    }
}
