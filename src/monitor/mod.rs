// src/monitor/mod.rs
//! Incremental synchronization of a remote message stream by polling.
//!
//! Each tick requests an overlapping look-back window (see [`window`]),
//! drops events whose ids were seen in the remembered rounds (see [`dedup`])
//! and hands the batch to the consumer (see [`driver`]).

pub mod config;
pub mod dedup;
pub mod driver;
pub mod testing;
pub mod types;
pub mod window;

pub use config::MonitorConfig;
pub use dedup::{filter_round, SeenHistory};
pub use driver::{Batch, Monitor, MonitorExit, MonitorHandle, MonitorState, TickOutcome};
pub use types::{Event, EventId, EventSource, Payload};
pub use window::{next_window, Clock, SystemClock};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_ticks_total", "Poll ticks executed.");
        describe_counter!(
            "monitor_fetch_errors_total",
            "Ticks whose fetch failed (transport/auth/parse)."
        );
        describe_counter!(
            "monitor_events_fetched_total",
            "Events returned by the source, including re-fetched ones."
        );
        describe_counter!(
            "monitor_events_new_total",
            "Events classified as new after deduplication."
        );
        describe_counter!(
            "monitor_events_suppressed_total",
            "Events suppressed because their id was already seen."
        );
        describe_histogram!("monitor_fetch_ms", "Fetch duration in milliseconds.");
        describe_gauge!("monitor_last_tick_ts", "Unix ts when a monitor last ticked.");
    });
}
