//! Session tuning loaded from environment variables.
//!
//! Every knob has a default; unset or unparsable values fall back to it.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use mapview::consts::{DEFAULT_BRUSH_SIZE, DEFAULT_PAN_STEP_PX};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000/api";
pub const DEFAULT_FLUSH_DEBOUNCE_MS: u64 = 400;
pub const DEFAULT_FLUSH_THRESHOLD: usize = 30;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2500;
pub const DEFAULT_STALENESS_MS: u64 = 2000;
pub const DEFAULT_NAV_POLL_MS: u64 = 100;
pub const DEFAULT_VIEWPORT_REPORT_MS: u64 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// API root, including the `/api` prefix.
    pub base_url: String,
    /// Quiet period after the last edit before a flush.
    pub flush_debounce: Duration,
    /// Queue length that forces an immediate flush.
    pub flush_threshold: usize,
    /// Cadence of the fog hash reconciliation poll.
    pub poll_interval: Duration,
    /// A remote snapshot is never applied this soon after a local edit.
    pub staleness: Duration,
    /// Cadence of the preview's navigation slot poll.
    pub nav_poll: Duration,
    /// Cadence of GM viewport telemetry while the frame is enabled.
    pub viewport_report: Duration,
    /// Screen-pixel step of one pan command.
    pub pan_step_px: f64,
    pub brush_size: u32,
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            flush_debounce: Duration::from_millis(DEFAULT_FLUSH_DEBOUNCE_MS),
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            staleness: Duration::from_millis(DEFAULT_STALENESS_MS),
            nav_poll: Duration::from_millis(DEFAULT_NAV_POLL_MS),
            viewport_report: Duration::from_millis(DEFAULT_VIEWPORT_REPORT_MS),
            pan_step_px: DEFAULT_PAN_STEP_PX,
            brush_size: DEFAULT_BRUSH_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl SessionConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `FOGMAP_BASE_URL`: default `http://127.0.0.1:3000/api`
    /// - `FOGMAP_FLUSH_DEBOUNCE_MS`: default 400
    /// - `FOGMAP_FLUSH_THRESHOLD`: default 30
    /// - `FOGMAP_POLL_INTERVAL_MS`: default 2500
    /// - `FOGMAP_STALENESS_MS`: default 2000
    /// - `FOGMAP_NAV_POLL_MS`: default 100
    /// - `FOGMAP_VIEWPORT_REPORT_MS`: default 500
    /// - `FOGMAP_PAN_STEP_PX`: default 100
    /// - `FOGMAP_BRUSH_SIZE`: default 3
    /// - `FOGMAP_REQUEST_TIMEOUT_SECS`: default 10
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("FOGMAP_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        Self {
            base_url,
            flush_debounce: env_millis("FOGMAP_FLUSH_DEBOUNCE_MS", DEFAULT_FLUSH_DEBOUNCE_MS),
            flush_threshold: env_parse("FOGMAP_FLUSH_THRESHOLD", DEFAULT_FLUSH_THRESHOLD).max(1),
            poll_interval: env_millis("FOGMAP_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
            staleness: env_millis("FOGMAP_STALENESS_MS", DEFAULT_STALENESS_MS),
            nav_poll: env_millis("FOGMAP_NAV_POLL_MS", DEFAULT_NAV_POLL_MS),
            viewport_report: env_millis("FOGMAP_VIEWPORT_REPORT_MS", DEFAULT_VIEWPORT_REPORT_MS),
            pan_step_px: env_parse("FOGMAP_PAN_STEP_PX", DEFAULT_PAN_STEP_PX),
            brush_size: env_parse("FOGMAP_BRUSH_SIZE", DEFAULT_BRUSH_SIZE).max(1),
            request_timeout: Duration::from_secs(env_parse(
                "FOGMAP_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
        }
    }
}

fn env_millis(key: &str, default: u64) -> Duration {
    Duration::from_millis(env_parse(key, default).max(1))
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
