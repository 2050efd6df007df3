// src/config/mod.rs
//! Client + monitor settings loaded from TOML/JSON files and env vars.
//!
//! Lookup order for [`load_settings_default`]:
//! 1) `$TEAHAZ_CONFIG_PATH`
//! 2) `config/teahaz.toml`
//! 3) `config/teahaz.json`
//! 4) env vars only
//!
//! Env overrides (`TEAHAZ_SERVER`, `TEAHAZ_POLL_INTERVAL_SECS`,
//! `TEAHAZ_OVERLAP_MULTIPLIER`, `TEAHAZ_DEDUP_HORIZON`) win over file values.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::monitor::config::{interval_from_secs, parse_interval_secs, MonitorConfig};

pub const ENV_CONFIG_PATH: &str = "TEAHAZ_CONFIG_PATH";
pub const ENV_SERVER: &str = "TEAHAZ_SERVER";
pub const ENV_POLL_INTERVAL: &str = "TEAHAZ_POLL_INTERVAL_SECS";
pub const ENV_OVERLAP_MULTIPLIER: &str = "TEAHAZ_OVERLAP_MULTIPLIER";
pub const ENV_DEDUP_HORIZON: &str = "TEAHAZ_DEDUP_HORIZON";

pub const DEFAULT_USER_AGENT: &str = concat!("teahaz-client/", env!("CARGO_PKG_VERSION"));

/// Route all traffic through an HTTP proxy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Connection settings for one chat server.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    server: String,
    proxy: Option<ProxyConfig>,
    request_timeout: Option<Duration>,
    user_agent: String,
}

impl ClientConfig {
    /// `server` must include the scheme, e.g. `https://teahaz.example`.
    pub fn new(server: impl Into<String>) -> Result<Self, ConfigError> {
        let server = server.into().trim().trim_end_matches('/').to_string();
        if !(server.starts_with("http://") || server.starts_with("https://")) {
            return Err(ConfigError::InvalidServer(server));
        }
        Ok(Self {
            server,
            proxy: None,
            request_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    pub fn with_proxy(self, proxy: ProxyConfig) -> Self {
        Self {
            proxy: Some(proxy),
            ..self
        }
    }

    pub fn with_request_timeout(self, timeout: Duration) -> Self {
        Self {
            request_timeout: Some(timeout),
            ..self
        }
    }

    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..self
        }
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn proxy(&self) -> Option<&ProxyConfig> {
        self.proxy.as_ref()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub client: ClientConfig,
    pub monitor: MonitorConfig,
}

// Numbers must be numbers; text is kept only to produce a precise error.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Num(f64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    server: Option<String>,
    request_timeout_secs: Option<RawNumber>,
    user_agent: Option<String>,
    proxy: Option<ProxyConfig>,
    #[serde(default)]
    monitor: RawMonitor,
}

#[derive(Debug, Default, Deserialize)]
struct RawMonitor {
    interval_secs: Option<RawNumber>,
    overlap_multiplier: Option<RawNumber>,
    dedup_horizon: Option<usize>,
    #[serde(default)]
    stop_on_success: bool,
    #[serde(default)]
    stop_on_failure: bool,
}

impl RawSettings {
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(server) = std::env::var(ENV_SERVER) {
            self.server = Some(server);
        }
        if let Ok(raw) = std::env::var(ENV_POLL_INTERVAL) {
            let secs = parse_interval_secs(&raw)?.as_secs_f64();
            self.monitor.interval_secs = Some(RawNumber::Num(secs));
        }
        if let Ok(raw) = std::env::var(ENV_OVERLAP_MULTIPLIER) {
            let m: f64 = raw.trim().parse().map_err(|_| {
                ConfigError::InvalidMultiplier(format!("{raw:?} is not a number"))
            })?;
            self.monitor.overlap_multiplier = Some(RawNumber::Num(m));
        }
        if let Ok(raw) = std::env::var(ENV_DEDUP_HORIZON) {
            let n: usize = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidHorizon)?;
            self.monitor.dedup_horizon = Some(n);
        }
        Ok(())
    }

    fn into_settings(self) -> Result<Settings, ConfigError> {
        let server = self.server.ok_or(ConfigError::Missing("server"))?;
        let mut client = ClientConfig::new(server)?;
        if let Some(proxy) = self.proxy {
            client = client.with_proxy(proxy);
        }
        if let Some(ua) = self.user_agent {
            client = client.with_user_agent(ua);
        }
        match self.request_timeout_secs {
            None => {}
            Some(RawNumber::Num(secs)) => {
                let timeout = interval_from_secs(secs).map_err(|_| {
                    ConfigError::Load(format!("request_timeout_secs: {secs} is not positive"))
                })?;
                client = client.with_request_timeout(timeout);
            }
            Some(RawNumber::Text(s)) => {
                return Err(ConfigError::Load(format!(
                    "request_timeout_secs: {s:?} is not a number"
                )));
            }
        }

        let m = self.monitor;
        let mut monitor = MonitorConfig::default()
            .with_stop_on_success(m.stop_on_success)
            .with_stop_on_failure(m.stop_on_failure);
        match m.interval_secs {
            None => {}
            Some(RawNumber::Num(secs)) => {
                monitor = monitor.with_interval(interval_from_secs(secs)?)?;
            }
            Some(RawNumber::Text(s)) => {
                return Err(ConfigError::InvalidInterval(format!(
                    "{s:?} is not a number of seconds"
                )));
            }
        }
        match m.overlap_multiplier {
            None => {}
            Some(RawNumber::Num(x)) => monitor = monitor.with_overlap_multiplier(x)?,
            Some(RawNumber::Text(s)) => {
                return Err(ConfigError::InvalidMultiplier(format!("{s:?} is not a number")));
            }
        }
        if let Some(n) = m.dedup_horizon {
            monitor = monitor.with_dedup_horizon(n)?;
        }

        Ok(Settings { client, monitor })
    }
}

/// Load settings from an explicit path. Supports TOML or JSON; env overrides apply.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let raw = parse_raw(&content, ext.as_str())?;
    finish(raw).with_context(|| format!("invalid settings in {}", path.display()))
}

/// Load settings using env var + fallbacks (see module docs).
pub fn load_settings_default() -> Result<Settings> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_settings_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/teahaz.toml");
    if toml_p.exists() {
        return load_settings_from(&toml_p);
    }
    let json_p = PathBuf::from("config/teahaz.json");
    if json_p.exists() {
        return load_settings_from(&json_p);
    }
    finish(RawSettings::default()).context("no config file found; settings from env")
}

/// Parse settings text (TOML or JSON, `hint_ext` picks the first attempt).
/// Env overrides are not applied.
pub fn parse_settings(s: &str, hint_ext: &str) -> Result<Settings> {
    Ok(parse_raw(s, hint_ext)?.into_settings()?)
}

fn finish(mut raw: RawSettings) -> Result<Settings> {
    raw.apply_env()?;
    Ok(raw.into_settings()?)
}

fn parse_raw(s: &str, hint_ext: &str) -> Result<RawSettings> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        return serde_json::from_str(s).map_err(|e| ConfigError::Load(e.to_string()).into());
    }
    toml::from_str(s).map_err(|e| ConfigError::Load(e.to_string()).into())
}
