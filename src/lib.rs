// src/lib.rs
// Public library surface for integration tests and the watcher binary.

pub mod client;
pub mod config;
pub mod error;
pub mod monitor;

// ---- Re-exports for stable public API ----
pub use crate::client::{ChatClient, ChatroomSource, Credentials, Session};
pub use crate::config::{ClientConfig, Settings};
pub use crate::error::{ApiError, ConfigError, FetchError};
pub use crate::monitor::{
    Batch, Event, EventId, EventSource, Monitor, MonitorConfig, MonitorExit, MonitorHandle,
    MonitorState, Payload, TickOutcome,
};
