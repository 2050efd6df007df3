// src/monitor/window.rs
//! Look-back window for each poll tick.
//!
//! There is no server-side cursor, so every tick re-requests a span that
//! covers the previous tick's window plus anything that arrived late
//! (network delay, server clock skew, scheduling jitter). Events delayed by
//! more than `interval * overlap_multiplier` can still be missed.

use std::time::Duration;

/// Default safety factor applied to the poll interval.
pub const DEFAULT_OVERLAP_MULTIPLIER: f64 = 5.0;

/// Start of the window `[from, now)` to request on this tick.
pub fn next_window(interval: Duration, overlap_multiplier: f64, now: f64) -> f64 {
    now - interval.as_secs_f64() * overlap_multiplier
}

/// Wall clock in unix seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}
