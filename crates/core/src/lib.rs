//! Shared types for the popup engagement widget: wire formats of the popup
//! API, configuration, template rendering, validation, device
//! classification, and the per-tab session id.

pub mod config;
pub mod device;
pub mod error;
pub mod session;
pub mod templates;
pub mod types;
pub mod validation;

pub use config::AppConfig;
pub use device::DeviceClass;
pub use error::{PopupError, PopupResult, TemplateError};
pub use types::{PageContext, PopupConfig, PopupId};
