//! Popup engagement widget, client side.
//!
//! Asks the popup API which popup is active for the page, arms a single
//! display trigger, renders the popup into the page, and reports
//! impressions, closes and form submissions back to the API.
//!
//! # Modules
//!
//! - [`controller`]: Per-page state machine (fetch, arm, display, close, submit)
//! - [`events`]: Page events in, commands out
//! - [`host`]: Page/DOM seam and the in-memory page
//! - [`api`]: Popup API client over HTTP
//! - [`runtime`]: Tokio event loop that executes controller commands

pub mod api;
pub mod controller;
pub mod events;
pub mod host;
pub mod runtime;

pub use api::{HttpPopupApi, PopupApi};
pub use controller::{Phase, PopupController};
pub use events::{Command, Listener, PageEvent, ScrollPosition, Timer};
pub use host::{MemoryPage, PageHost};
pub use runtime::{PageHandle, PopupRuntime};
