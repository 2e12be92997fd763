use serde::Deserialize;

use crate::session::DEFAULT_SESSION_KEY;

/// Root widget configuration. Loaded from environment variables with the
/// prefix `POPUP_WIDGET__`, e.g. `POPUP_WIDGET__TIMINGS__CLOSE_TRANSITION_MS`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub timings: TimingConfig,
    #[serde(default = "default_session_storage_key")]
    pub session_storage_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Explicit API origin. When unset the origin is derived from the page.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Origin used when the page itself is served from a loopback host.
    #[serde(default = "default_local_dev_origin")]
    pub local_dev_origin: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Fixed delays of the widget, all in milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_time_trigger_ms")]
    pub default_time_trigger_ms: u64,
    #[serde(default = "default_scroll_trigger_percent")]
    pub default_scroll_trigger_percent: f64,
    #[serde(default = "default_page_load_delay_ms")]
    pub page_load_delay_ms: u64,
    /// Stand-in for "next animation frame" before the show state is applied.
    #[serde(default = "default_frame_delay_ms")]
    pub frame_delay_ms: u64,
    #[serde(default = "default_close_transition_ms")]
    pub close_transition_ms: u64,
    #[serde(default = "default_success_auto_close_ms")]
    pub success_auto_close_ms: u64,
    /// Minimum upward swipe distance in pixels that closes on mobile.
    #[serde(default = "default_swipe_threshold_px")]
    pub swipe_threshold_px: f64,
}

fn default_session_storage_key() -> String {
    DEFAULT_SESSION_KEY.to_string()
}
fn default_local_dev_origin() -> String {
    "http://localhost:3001".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_time_trigger_ms() -> u64 {
    5000
}
fn default_scroll_trigger_percent() -> f64 {
    50.0
}
fn default_page_load_delay_ms() -> u64 {
    100
}
fn default_frame_delay_ms() -> u64 {
    16
}
fn default_close_transition_ms() -> u64 {
    300
}
fn default_success_auto_close_ms() -> u64 {
    3000
}
fn default_swipe_threshold_px() -> f64 {
    100.0
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            local_dev_origin: default_local_dev_origin(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            default_time_trigger_ms: default_time_trigger_ms(),
            default_scroll_trigger_percent: default_scroll_trigger_percent(),
            page_load_delay_ms: default_page_load_delay_ms(),
            frame_delay_ms: default_frame_delay_ms(),
            close_transition_ms: default_close_transition_ms(),
            success_auto_close_ms: default_success_auto_close_ms(),
            swipe_threshold_px: default_swipe_threshold_px(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            timings: TimingConfig::default(),
            session_storage_key: default_session_storage_key(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("POPUP_WIDGET")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_widget_timings() {
        let config = AppConfig::default();
        assert_eq!(config.timings.default_time_trigger_ms, 5000);
        assert_eq!(config.timings.default_scroll_trigger_percent, 50.0);
        assert_eq!(config.timings.page_load_delay_ms, 100);
        assert_eq!(config.timings.close_transition_ms, 300);
        assert_eq!(config.timings.success_auto_close_ms, 3000);
        assert_eq!(config.timings.swipe_threshold_px, 100.0);
        assert_eq!(config.session_storage_key, "popup_session_id");
        assert!(config.api.base_url.is_none());
    }

    #[test]
    fn test_partial_source_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{"api": {"base_url": "https://api.example"}, "timings": {"close_transition_ms": 250}}"#,
        )
        .unwrap();
        assert_eq!(config.api.base_url.as_deref(), Some("https://api.example"));
        assert_eq!(config.api.local_dev_origin, "http://localhost:3001");
        assert_eq!(config.timings.close_transition_ms, 250);
        assert_eq!(config.timings.success_auto_close_ms, 3000);
    }
}
