//! Inputs and outputs of the popup controller.
//!
//! [`PageEvent`]s flow in from the page (DOM listeners) and from completed
//! asynchronous work. [`Command`]s flow out and are executed by the runtime.

use popup_core::types::{PopupSummary, SubmitRequest, SubmitResponse, TrackRequest};
use popup_core::{DeviceClass, PopupConfig, PopupId, PopupResult};

/// Vertical scroll metrics of the document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub viewport_height: f64,
}

impl ScrollPosition {
    /// Scrolled fraction in percent, or `None` if the page cannot scroll.
    pub fn percent(&self) -> Option<f64> {
        let max = self.scroll_height - self.viewport_height;
        if max <= 0.0 {
            return None;
        }
        Some((self.scroll_top / max * 100.0).clamp(0.0, 100.0))
    }
}

/// DOM listeners the controller asks the host to attach or detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Listener {
    /// Window scroll, for the scroll trigger.
    Scroll,
    /// Window scroll, for telemetry depth. Attached for the whole page load.
    ScrollDepth,
    /// Document mouseleave, for the exit-intent trigger.
    ExitIntent,
    /// Document keydown while a popup is shown.
    Keyboard,
    /// Touch start/end on the popup, mobile only.
    Swipe,
}

/// One-shot timers. Each carries the popup it was armed for so a timer
/// outliving its popup is recognised and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timer {
    /// Time and page-load triggers.
    Trigger(PopupId),
    /// Apply the "show" state one frame after mounting.
    Reveal(PopupId),
    /// End of the exit transition: detach the overlay.
    Detach(PopupId),
    /// Close after a successful submission.
    AutoClose(PopupId),
}

#[derive(Debug)]
pub enum PageEvent {
    Scroll(ScrollPosition),
    PointerLeave { client_y: f64 },
    KeyDown { key: String },
    CloseClicked,
    BackdropClicked,
    TouchStart { client_y: f64 },
    TouchEnd { client_y: f64 },
    SubmitForm { email: String },

    ActiveLoaded(PopupResult<Vec<PopupSummary>>),
    ConfigLoaded(PopupId, PopupResult<PopupConfig>),
    SubmitCompleted(PopupId, PopupResult<SubmitResponse>),
    TimerFired(Timer),
}

/// Asynchronous work requested by the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    FetchActive {
        page_url: String,
        device: DeviceClass,
    },
    FetchConfig {
        popup_id: PopupId,
        session_id: String,
    },
    Submit(SubmitRequest),
    /// Fire-and-forget telemetry.
    Track(TrackRequest),
    Schedule {
        delay_ms: u64,
        timer: Timer,
    },
}
