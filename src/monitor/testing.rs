// src/monitor/testing.rs
// --- Test helpers (also used by integration tests) ---
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::types::{Event, EventSource};
use super::window::Clock;
use crate::error::FetchError;

/// Event source that replays a fixed script of fetch results and records the
/// `from_time` of every call. Once the script runs out it returns empty batches.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<Event>, FetchError>>>,
    calls: Arc<Mutex<Vec<f64>>>,
}

impl ScriptedSource {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<Vec<Event>, FetchError>>,
    {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared log of requested window starts.
    pub fn calls(&self) -> Arc<Mutex<Vec<f64>>> {
        self.calls.clone()
    }
}

#[async_trait::async_trait]
impl EventSource for ScriptedSource {
    async fn fetch(&self, from_time: f64) -> Result<Vec<Event>, FetchError> {
        self.calls.lock().push(from_time);
        self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(now: f64) -> Self {
        Self {
            bits: AtomicU64::new(now.to_bits()),
        }
    }

    pub fn set(&self, now: f64) {
        self.bits.store(now.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
