// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Rate Limiter Domain Service
//!
//! Generic fixed-window limiter keyed by arbitrary strings. The route layer
//! consults it before expensive operations (bulk transfers, recursive
//! deletes). Windows start at the first request for a key; expired entries
//! are logically absent and physically swept once the map grows past a
//! threshold, so long-running processes stay bounded without a background
//! timer.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Tracked-key count above which a sweep of expired windows runs.
const SWEEP_THRESHOLD: usize = 1_000;

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u64,
    reset_at: Instant,
}

/// Fixed-window request counter.
///
/// The request that opens a window is always admitted and counted as call
/// one, so `max = 0` still lets exactly one request through per window. This
/// matches the behavior callers and tests depend on; do not "fix" it.
#[derive(Default)]
pub struct RateLimiter {
    windows: DashMap<String, WindowEntry>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one request against `key`. Returns `true` when the request is
    /// over the limit and should be rejected.
    pub fn check_rate_limit(&self, key: &str, max: u64, window: Duration) -> bool {
        self.sweep_if_needed();

        let now = Instant::now();
        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert(WindowEntry {
                count: 0,
                reset_at: now,
            });

        // Fresh key (sentinel count 0) or expired window: start a new window
        // and admit the opening request.
        if entry.count == 0 || now > entry.reset_at {
            entry.count = 1;
            entry.reset_at = now + window;
            return false;
        }

        if entry.count >= max {
            tracing::debug!(key = %key, count = entry.count, max, "Rate limit hit");
            return true;
        }

        entry.count += 1;
        false
    }

    /// Seconds until the window for `key` resets. Zero when the key is
    /// unknown or its window has already expired.
    pub fn reset_seconds(&self, key: &str) -> u64 {
        match self.windows.get(key) {
            Some(entry) => {
                let now = Instant::now();
                if now > entry.reset_at {
                    0
                } else {
                    entry.reset_at.duration_since(now).as_secs_f64().ceil() as u64
                }
            }
            None => 0,
        }
    }

    fn sweep_if_needed(&self) {
        if self.windows.len() <= SWEEP_THRESHOLD {
            return;
        }
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, entry| now <= entry.reset_at);
        tracing::debug!(
            removed = before - self.windows.len(),
            remaining = self.windows.len(),
            "Swept expired rate limit windows"
        );
    }
}
