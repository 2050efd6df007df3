// src/monitor/driver.rs
//! Poll loop: window -> fetch -> dedup -> deliver -> sleep.
//!
//! States: `Idle -> Ticking -> (Idle | Stopped | Failed)`, plus `Cancelled`
//! when the cancellation token fires. The token is checked at the top of
//! every tick and while sleeping between ticks. One session never issues
//! concurrent fetches, so outcomes are produced strictly in tick order.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::config::MonitorConfig;
use super::dedup::SeenHistory;
use super::types::{Event, EventSource};
use super::window::{next_window, Clock, SystemClock};
use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Ticking,
    /// Delivered with `stop_on_success` set.
    Stopped,
    /// Fetch failed with `stop_on_failure` set.
    Failed,
    Cancelled,
}

impl MonitorState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MonitorState::Stopped | MonitorState::Failed | MonitorState::Cancelled
        )
    }
}

/// Full fetched set of one tick, with the new subset marked.
///
/// The whole batch is handed over (not only the new events) so consumers can
/// reconcile their own state against everything in the window.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub tick: u64,
    /// Start of the requested window, unix seconds.
    pub window_start: f64,
    events: Vec<Event>,
    // Indices into `events`; both are fixed once the batch is built.
    fresh: Vec<usize>,
}

impl Batch {
    /// Everything fetched on this tick, in server order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events not seen in the remembered rounds, in fetch order.
    pub fn fresh(&self) -> impl Iterator<Item = &Event> + '_ {
        self.fresh.iter().filter_map(|&i| self.events.get(i))
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    pub fn fresh_count(&self) -> usize {
        self.fresh.len()
    }

    pub fn into_fresh(self) -> Vec<Event> {
        let mut events: Vec<Option<Event>> = self.events.into_iter().map(Some).collect();
        self.fresh
            .iter()
            .filter_map(|&i| events.get_mut(i).and_then(Option::take))
            .collect()
    }
}

/// What happened on one tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// At least one new event; carries the full batch.
    Delivered(Batch),
    /// Fetch succeeded but everything was already seen.
    Quiet { tick: u64, fetched: usize },
    Failed { tick: u64, error: FetchError },
}

impl TickOutcome {
    pub fn tick(&self) -> u64 {
        match self {
            TickOutcome::Delivered(b) => b.tick,
            TickOutcome::Quiet { tick, .. } | TickOutcome::Failed { tick, .. } => *tick,
        }
    }
}

/// How a callback-driven run ended.
#[derive(Debug)]
pub enum MonitorExit {
    /// First delivery with `stop_on_success`.
    Delivered(Batch),
    /// First failure with `stop_on_failure`.
    Failed(FetchError),
    Cancelled,
}

/// One polling session over one event source.
pub struct Monitor<S> {
    source: S,
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    history: SeenHistory,
    state: MonitorState,
    ticks: u64,
}

impl<S: EventSource> Monitor<S> {
    pub fn new(source: S, config: MonitorConfig) -> Self {
        super::ensure_metrics_described();
        Self {
            source,
            history: SeenHistory::new(config.dedup_horizon()),
            config,
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
            state: MonitorState::Idle,
            ticks: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share an external token, e.g. one child token per chatroom.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Ticks started so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run a single tick without sleeping first.
    /// Returns `None` once the monitor is terminal or cancelled.
    pub async fn tick(&mut self) -> Option<TickOutcome> {
        if self.state.is_terminal() {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.state = MonitorState::Cancelled;
            tracing::debug!(target: "monitor", source = self.source.name(), "cancelled before tick");
            return None;
        }

        self.state = MonitorState::Ticking;
        self.ticks += 1;
        let tick = self.ticks;

        let now = self.clock.now();
        let from = next_window(self.config.interval(), self.config.overlap_multiplier(), now);

        let t0 = Instant::now();
        let fetched = self.source.fetch(from).await;
        histogram!("monitor_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("monitor_ticks_total").increment(1);
        gauge!("monitor_last_tick_ts").set(now);

        match fetched {
            Err(error) => {
                counter!("monitor_fetch_errors_total").increment(1);
                tracing::warn!(
                    target: "monitor",
                    source = self.source.name(),
                    tick,
                    error = %error,
                    "fetch failed"
                );
                self.state = if self.config.stop_on_failure() {
                    MonitorState::Failed
                } else {
                    MonitorState::Idle
                };
                Some(TickOutcome::Failed { tick, error })
            }
            Ok(events) => {
                let fresh = self.history.observe(&events);
                let suppressed = events.len() - fresh.len();
                counter!("monitor_events_fetched_total").increment(events.len() as u64);
                counter!("monitor_events_new_total").increment(fresh.len() as u64);
                counter!("monitor_events_suppressed_total").increment(suppressed as u64);
                tracing::debug!(
                    target: "monitor",
                    source = self.source.name(),
                    tick,
                    window_start = from,
                    fetched = events.len(),
                    fresh = fresh.len(),
                    suppressed,
                    "tick"
                );

                if fresh.is_empty() {
                    self.state = MonitorState::Idle;
                    return Some(TickOutcome::Quiet {
                        tick,
                        fetched: events.len(),
                    });
                }

                self.state = if self.config.stop_on_success() {
                    MonitorState::Stopped
                } else {
                    MonitorState::Idle
                };
                Some(TickOutcome::Delivered(Batch {
                    tick,
                    window_start: from,
                    events,
                    fresh,
                }))
            }
        }
    }

    /// Next tick outcome, suspending for the interval between ticks.
    /// The first call ticks immediately.
    pub async fn next_outcome(&mut self) -> Option<TickOutcome> {
        if self.ticks > 0 && !self.state.is_terminal() && !self.sleep().await {
            return None;
        }
        self.tick().await
    }

    /// Returns false when cancelled while sleeping.
    async fn sleep(&mut self) -> bool {
        self.sleep_unless(std::future::pending()).await
    }

    /// Like [`Self::sleep`], but `abandoned` resolving also cancels the loop.
    async fn sleep_unless(&mut self, abandoned: impl Future<Output = ()>) -> bool {
        let woke = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Wake::Cancelled,
            _ = abandoned => Wake::Abandoned,
            _ = tokio::time::sleep(self.config.interval()) => Wake::Elapsed,
        };
        match woke {
            Wake::Elapsed => return true,
            Wake::Cancelled => {
                tracing::debug!(target: "monitor", source = self.source.name(), "cancelled while idle");
            }
            Wake::Abandoned => {
                tracing::debug!(target: "monitor", source = self.source.name(), "receiver dropped");
                self.cancel.cancel();
            }
        }
        self.state = MonitorState::Cancelled;
        false
    }

    /// Drive the loop to a terminal state, reporting through callbacks.
    ///
    /// `on_success` gets every delivered batch and `on_failure` every fetch
    /// error; a tick invokes at most one of them. Quiet ticks invoke neither.
    pub async fn run<F, G>(mut self, mut on_success: F, mut on_failure: G) -> MonitorExit
    where
        F: FnMut(&Batch),
        G: FnMut(&FetchError),
    {
        while let Some(outcome) = self.next_outcome().await {
            match outcome {
                TickOutcome::Delivered(batch) => {
                    on_success(&batch);
                    if self.state == MonitorState::Stopped {
                        return MonitorExit::Delivered(batch);
                    }
                }
                TickOutcome::Failed { error, .. } => {
                    on_failure(&error);
                    if self.state == MonitorState::Failed {
                        return MonitorExit::Failed(error);
                    }
                }
                TickOutcome::Quiet { .. } => {}
            }
        }
        MonitorExit::Cancelled
    }
}

enum Wake {
    Elapsed,
    Cancelled,
    Abandoned,
}

impl<S: EventSource + 'static> Monitor<S> {
    /// Run the loop on its own task and stream outcomes through a bounded
    /// channel. Dropping the receiver cancels the loop.
    ///
    /// The task runs on a child of the monitor's token: cancelling the parent
    /// stops it, while the handle's `cancel` only stops this session.
    pub fn spawn(mut self, capacity: usize) -> MonitorHandle {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.cancel = self.cancel.child_token();
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                if self.ticks > 0
                    && !self.state.is_terminal()
                    && !self.sleep_unless(tx.closed()).await
                {
                    break;
                }
                let Some(outcome) = self.tick().await else {
                    break;
                };
                if tx.send(outcome).await.is_err() {
                    tracing::debug!(target: "monitor", source = self.source.name(), "receiver dropped");
                    self.cancel.cancel();
                    self.state = MonitorState::Cancelled;
                    break;
                }
            }
            self.state
        });
        MonitorHandle {
            outcomes: rx,
            cancel,
            task,
        }
    }
}

/// Handle to a spawned monitor.
pub struct MonitorHandle {
    outcomes: mpsc::Receiver<TickOutcome>,
    cancel: CancellationToken,
    task: JoinHandle<MonitorState>,
}

impl MonitorHandle {
    /// Next outcome; `None` once the loop has ended.
    pub async fn recv(&mut self) -> Option<TickOutcome> {
        self.outcomes.recv().await
    }

    /// Stop this session only; tokens it was derived from are untouched.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the loop to end on its own; returns the final state.
    pub async fn join(self) -> Result<MonitorState, JoinError> {
        let MonitorHandle {
            mut outcomes, task, ..
        } = self;
        // Keep draining so a full channel cannot block the loop.
        while outcomes.recv().await.is_some() {}
        task.await
    }

    /// Cancel and wait for the loop to exit.
    pub async fn shutdown(self) -> Result<MonitorState, JoinError> {
        self.cancel.cancel();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{ManualClock, ScriptedSource};
    use std::time::Duration;

    fn ev(id: &str) -> Event {
        Event::text(id, 0.0, id)
    }

    #[tokio::test]
    async fn quiet_tick_when_everything_was_seen() {
        let source = ScriptedSource::new([
            Ok(vec![ev("A"), ev("B")]),
            Ok(vec![ev("A"), ev("B")]),
        ]);
        let mut m = Monitor::new(source, MonitorConfig::default());

        match m.tick().await {
            Some(TickOutcome::Delivered(b)) => assert_eq!(b.fresh_count(), 2),
            other => panic!("expected delivery, got {other:?}"),
        }
        match m.tick().await {
            Some(TickOutcome::Quiet { fetched, .. }) => assert_eq!(fetched, 2),
            other => panic!("expected quiet tick, got {other:?}"),
        }
        assert_eq!(m.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn delivery_carries_full_batch() {
        let source = ScriptedSource::new([Ok(vec![ev("A")]), Ok(vec![ev("A"), ev("B")])]);
        let mut m = Monitor::new(source, MonitorConfig::default());
        m.tick().await;
        let Some(TickOutcome::Delivered(batch)) = m.tick().await else {
            panic!("expected delivery");
        };
        assert_eq!(batch.events().len(), 2);
        let fresh: Vec<_> = batch.fresh().map(|e| e.id.to_string()).collect();
        assert_eq!(fresh, vec!["B"]);
        assert_eq!(batch.into_fresh(), vec![ev("B")]);
    }

    #[tokio::test]
    async fn window_tracks_the_clock() {
        let clock = Arc::new(ManualClock::new(1_000.0));
        let source = ScriptedSource::new([Ok(vec![]), Ok(vec![])]);
        let calls = source.calls();
        let cfg = MonitorConfig::new(Duration::from_secs(2)).unwrap();
        let mut m = Monitor::new(source, cfg).with_clock(clock.clone());

        m.tick().await;
        clock.advance(2.0);
        m.tick().await;

        let from = calls.lock().clone();
        assert_eq!(from.len(), 2);
        assert!((from[0] - 990.0).abs() < 1e-9);
        assert!((from[1] - 992.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn stop_on_failure_is_terminal() {
        let source = ScriptedSource::new([Err(FetchError::Unauthorized("expired".into()))]);
        let cfg = MonitorConfig::default().with_stop_on_failure(true);
        let mut m = Monitor::new(source, cfg);
        assert!(matches!(m.tick().await, Some(TickOutcome::Failed { tick: 1, .. })));
        assert_eq!(m.state(), MonitorState::Failed);
        assert!(m.tick().await.is_none());
        assert_eq!(m.ticks(), 1);
    }

    #[tokio::test]
    async fn widest_horizon_builds_and_ticks() {
        let source = ScriptedSource::new([Ok(vec![ev("A")]), Ok(vec![ev("A")])]);
        let cfg = MonitorConfig::default()
            .with_dedup_horizon(crate::monitor::config::MAX_DEDUP_HORIZON)
            .unwrap();
        let mut m = Monitor::new(source, cfg);
        assert!(matches!(m.tick().await, Some(TickOutcome::Delivered(_))));
        assert!(matches!(m.tick().await, Some(TickOutcome::Quiet { .. })));
    }

    #[test]
    fn batch_views_agree() {
        let batch = Batch {
            tick: 1,
            window_start: 0.0,
            events: vec![ev("A"), ev("B")],
            fresh: vec![1],
        };
        let cloned = batch.clone();
        assert_eq!(cloned.events().len(), 2);
        assert_eq!(cloned.fresh().collect::<Vec<_>>(), vec![&ev("B")]);
        assert_eq!(batch.into_events().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_token_prevents_tick() {
        let source = ScriptedSource::new([Ok(vec![ev("A")])]);
        let calls = source.calls();
        let mut m = Monitor::new(source, MonitorConfig::default());
        m.cancellation_token().cancel();
        assert!(m.tick().await.is_none());
        assert_eq!(m.state(), MonitorState::Cancelled);
        assert!(calls.lock().is_empty());
    }
}
