//! Wire and domain types shared by the popup client: popup configuration,
//! trigger rules, and the request/response bodies of the popup API.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::device::DeviceClass;

/// Popup identifier as issued by the server. Numeric and string ids are
/// both accepted and serialized back in the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PopupId {
    Number(i64),
    Text(String),
}

impl fmt::Display for PopupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopupId::Number(n) => write!(f, "{n}"),
            PopupId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PopupId {
    fn from(value: i64) -> Self {
        PopupId::Number(value)
    }
}

impl From<&str> for PopupId {
    fn from(value: &str) -> Self {
        PopupId::Text(value.to_string())
    }
}

/// Condition that causes a popup to display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// One-shot delay in milliseconds.
    #[default]
    Time,
    /// Vertical scroll depth in percent.
    Scroll,
    /// Pointer leaving the viewport across the top edge.
    #[serde(alias = "exit-intent", alias = "exit")]
    ExitIntent,
    /// Shortly after page load, unconditionally.
    #[serde(alias = "page-load", alias = "immediate")]
    PageLoad,
}

/// Named styling and text tokens. Every token is optional on the wire and
/// falls back to a default at render time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PopupTokens {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub placeholder_text: Option<String>,
    #[serde(default)]
    pub success_message: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
    #[serde(default)]
    pub button_color: Option<String>,
    #[serde(default)]
    pub button_text_color: Option<String>,
    #[serde(default)]
    pub overlay_color: Option<String>,
}

/// Full configuration of one popup as returned by the config endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopupConfig {
    pub id: PopupId,
    #[serde(default)]
    pub trigger_type: TriggerType,
    /// Milliseconds for `time`, percent for `scroll`, unused otherwise.
    #[serde(default, deserialize_with = "lenient_number")]
    pub trigger_value: Option<f64>,
    #[serde(default)]
    pub html_template: String,
    #[serde(default)]
    pub css_template: String,
    #[serde(flatten)]
    pub tokens: PopupTokens,
}

impl PopupConfig {
    /// Trigger threshold, or `default` when the server sent none (or a
    /// non-positive value).
    pub fn trigger_value_or(&self, default: f64) -> f64 {
        match self.trigger_value {
            Some(v) if v.is_finite() && v > 0.0 => v,
            _ => default,
        }
    }
}

/// Accepts a JSON number, a numeric string, or null.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

/// Entry of the active-popups list. Only the id is used; everything else
/// the server sends is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopupSummary {
    pub id: PopupId,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `GET /api/popup/active`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivePopupsResponse {
    pub success: bool,
    #[serde(default)]
    pub popups: Vec<PopupSummary>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/popup/config/<id>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopupConfigResponse {
    pub success: bool,
    #[serde(default)]
    pub config: Option<PopupConfig>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /api/popup/submit` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub email: String,
    pub popup_id: PopupId,
    pub session_id: String,
    pub page_url: String,
    pub user_agent: String,
    pub referrer: String,
    pub device_type: DeviceClass,
    /// Milliseconds between display and submit.
    pub time_to_action: u64,
}

/// `POST /api/popup/submit` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(default)]
    pub discount_code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackEventType {
    Impression,
    Close,
}

/// Why a popup was closed. Sent as `close_reason` on close events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    CloseButton,
    OverlayClick,
    EscapeKey,
    SwipeUp,
    AutoClose,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::CloseButton => "close_button",
            CloseReason::OverlayClick => "overlay_click",
            CloseReason::EscapeKey => "escape_key",
            CloseReason::SwipeUp => "swipe_up",
            CloseReason::AutoClose => "auto_close",
        }
    }
}

/// `POST /api/popup/track` request body. The response is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRequest {
    pub popup_id: PopupId,
    pub event_type: TrackEventType,
    pub session_id: String,
    pub page_url: String,
    pub user_agent: String,
    /// Milliseconds since the page loaded.
    pub time_on_page: u64,
    /// Deepest scroll position reached, in percent.
    pub scroll_depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<CloseReason>,
    /// Milliseconds the popup was on screen, for close events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_displayed: Option<u64>,
}

/// Facts about the hosting page, captured once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PageContext {
    pub url: String,
    pub user_agent: String,
    pub referrer: String,
    pub device: DeviceClass,
}

impl PageContext {
    pub fn new(
        url: impl Into<String>,
        user_agent: impl Into<String>,
        referrer: impl Into<String>,
    ) -> Self {
        let user_agent = user_agent.into();
        let device = DeviceClass::from_user_agent(&user_agent);
        Self {
            url: url.into(),
            user_agent,
            referrer: referrer.into(),
            device,
        }
    }
}
