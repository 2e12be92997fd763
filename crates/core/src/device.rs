//! Device classification from the user-agent string.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

const MOBILE_MARKERS: &[&str] = &[
    "Mobile",
    "iPhone",
    "iPod",
    "Android",
    "BlackBerry",
    "IEMobile",
    "Opera Mini",
];

impl DeviceClass {
    /// Tablet markers win over mobile ones: Android without `Mobile` is a
    /// tablet, Android with it is a phone.
    pub fn from_user_agent(user_agent: &str) -> Self {
        let is_android = user_agent.contains("Android");
        let is_tablet = user_agent.contains("iPad")
            || user_agent.contains("Tablet")
            || (is_android && !user_agent.contains("Mobile"));

        if is_tablet {
            DeviceClass::Tablet
        } else if MOBILE_MARKERS.iter().any(|m| user_agent.contains(m)) {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
