// src/monitor/config.rs
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::ConfigError;
use crate::monitor::window::DEFAULT_OVERLAP_MULTIPLIER;

/// Upper bound for the number of remembered dedup rounds.
pub const MAX_DEDUP_HORIZON: usize = 1024;

/// Immutable per-session monitor settings.
///
/// Built once before the loop starts; the `with_*` methods return a new value
/// instead of mutating the one a running monitor holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorConfig {
    interval: Duration,
    overlap_multiplier: f64,
    dedup_horizon: NonZeroUsize,
    stop_on_success: bool,
    stop_on_failure: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            overlap_multiplier: DEFAULT_OVERLAP_MULTIPLIER,
            dedup_horizon: NonZeroUsize::MIN,
            stop_on_success: false,
            stop_on_failure: false,
        }
    }
}

impl MonitorConfig {
    /// Default settings with the given poll interval.
    pub fn new(interval: Duration) -> Result<Self, ConfigError> {
        Self::default().with_interval(interval)
    }

    /// Poll interval given in (possibly fractional) seconds.
    pub fn from_secs(secs: f64) -> Result<Self, ConfigError> {
        Self::new(interval_from_secs(secs)?)
    }

    pub fn with_interval(self, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidInterval(
                "interval must be greater than zero".into(),
            ));
        }
        Ok(Self { interval, ..self })
    }

    /// Factor >= 1 applied to the interval to size the look-back window.
    pub fn with_overlap_multiplier(self, multiplier: f64) -> Result<Self, ConfigError> {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(format!(
                "{multiplier} (must be a finite number >= 1)"
            )));
        }
        Ok(Self {
            overlap_multiplier: multiplier,
            ..self
        })
    }

    /// Number of past rounds whose ids suppress re-delivery,
    /// `1..=MAX_DEDUP_HORIZON`.
    pub fn with_dedup_horizon(self, rounds: usize) -> Result<Self, ConfigError> {
        if rounds > MAX_DEDUP_HORIZON {
            return Err(ConfigError::InvalidHorizon);
        }
        let dedup_horizon = NonZeroUsize::new(rounds).ok_or(ConfigError::InvalidHorizon)?;
        Ok(Self {
            dedup_horizon,
            ..self
        })
    }

    /// Remember enough rounds to span the whole look-back window, capped at
    /// [`MAX_DEDUP_HORIZON`].
    pub fn with_horizon_covering_overlap(self) -> Self {
        let rounds = self
            .overlap_multiplier
            .ceil()
            .clamp(1.0, MAX_DEDUP_HORIZON as f64) as usize;
        Self {
            dedup_horizon: NonZeroUsize::new(rounds).unwrap_or(NonZeroUsize::MIN),
            ..self
        }
    }

    pub fn with_stop_on_success(self, stop: bool) -> Self {
        Self {
            stop_on_success: stop,
            ..self
        }
    }

    pub fn with_stop_on_failure(self, stop: bool) -> Self {
        Self {
            stop_on_failure: stop,
            ..self
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn overlap_multiplier(&self) -> f64 {
        self.overlap_multiplier
    }

    pub fn dedup_horizon(&self) -> NonZeroUsize {
        self.dedup_horizon
    }

    pub fn stop_on_success(&self) -> bool {
        self.stop_on_success
    }

    pub fn stop_on_failure(&self) -> bool {
        self.stop_on_failure
    }

    /// Span re-requested on every tick.
    pub fn look_back(&self) -> Duration {
        self.interval.mul_f64(self.overlap_multiplier)
    }
}

/// Validate an interval given in seconds.
pub fn interval_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::InvalidInterval(format!(
            "{secs} (must be a positive number of seconds)"
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidInterval(e.to_string()))
}

/// Parse an interval from text (env vars, CLI args). Non-numeric input is rejected.
pub fn parse_interval_secs(raw: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = raw.trim().parse().map_err(|_| {
        ConfigError::InvalidInterval(format!("{raw:?} is not a number of seconds"))
    })?;
    interval_from_secs(secs)
}
