//! Popup controller, the per-page state machine.
//!
//! `Idle → Fetching → Armed → Displayed → Closing → Closed`
//!
//! The controller owns the page host and all widget state. It never awaits:
//! page events and completed work go in through [`PopupController::handle`],
//! DOM changes are applied to the host immediately, and network calls and
//! timers come back out as [`Command`]s for the runtime.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use popup_core::config::TimingConfig;
use popup_core::templates::{render_popup, render_success};
use popup_core::types::{
    CloseReason, PopupSummary, SubmitRequest, SubmitResponse, TrackEventType, TrackRequest,
    TriggerType,
};
use popup_core::validation::validate_email;
use popup_core::{DeviceClass, PageContext, PopupConfig, PopupError, PopupId, PopupResult};

use crate::events::{Command, Listener, PageEvent, ScrollPosition, Timer};
use crate::host::PageHost;

pub const GENERIC_SUBMIT_ERROR: &str = "Something went wrong. Please try again.";
pub const SUBMITTING_LABEL: &str = "Submitting...";

/// Coarse lifecycle phase, for hosts and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Armed,
    Displayed,
    Closing,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ArmedTrigger {
    /// Waiting on `Timer::Trigger`.
    Timer,
    Scroll { threshold_percent: f64 },
    ExitIntent,
}

#[derive(Debug)]
struct ArmedPopup {
    config: PopupConfig,
    trigger: ArmedTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitState {
    Ready,
    InFlight,
    Succeeded,
}

#[derive(Debug)]
struct CurrentPopup {
    config: PopupConfig,
    button_text: String,
    displayed_at_ms: u64,
    submit: SubmitState,
    touch_start_y: Option<f64>,
}

#[derive(Debug)]
enum WidgetState {
    Idle,
    FetchingActive,
    FetchingConfig(PopupId),
    Armed(ArmedPopup),
    Displayed(CurrentPopup),
    Closing(PopupId),
    Closed,
}

/// One controller per page load, owned by whatever drives the page.
pub struct PopupController<H: PageHost> {
    page: PageContext,
    session_id: String,
    timings: TimingConfig,
    host: H,
    state: WidgetState,
    started: bool,
    displayed: HashSet<PopupId>,
    /// Deepest scroll seen on this page, reported with every track event.
    max_scroll_percent: f64,
}

impl<H: PageHost> PopupController<H> {
    pub fn new(page: PageContext, session_id: String, timings: TimingConfig, host: H) -> Self {
        Self {
            page,
            session_id,
            timings,
            host,
            state: WidgetState::Idle,
            started: false,
            displayed: HashSet::new(),
            max_scroll_percent: 0.0,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            WidgetState::Idle => Phase::Idle,
            WidgetState::FetchingActive | WidgetState::FetchingConfig(_) => Phase::Fetching,
            WidgetState::Armed(_) => Phase::Armed,
            WidgetState::Displayed(_) => Phase::Displayed,
            WidgetState::Closing(_) => Phase::Closing,
            WidgetState::Closed => Phase::Closed,
        }
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Id of the popup currently on screen (including during the exit
    /// transition).
    pub fn current_popup(&self) -> Option<&PopupId> {
        match &self.state {
            WidgetState::Displayed(current) => Some(&current.config.id),
            WidgetState::Closing(id) => Some(id),
            _ => None,
        }
    }

    pub fn was_displayed(&self, popup_id: &PopupId) -> bool {
        self.displayed.contains(popup_id)
    }

    /// Ask the API for active popups and start tracking scroll depth. Only
    /// the first call does anything.
    pub fn start(&mut self, now_ms: u64) -> Vec<Command> {
        if self.started {
            return Vec::new();
        }
        self.started = true;
        self.state = WidgetState::FetchingActive;
        self.host.install_listener(Listener::ScrollDepth);
        debug!(
            page_url = %self.page.url,
            device = %self.page.device,
            at_ms = now_ms,
            "fetching active popups"
        );
        vec![Command::FetchActive {
            page_url: self.page.url.clone(),
            device: self.page.device,
        }]
    }

    pub fn handle(&mut self, now_ms: u64, event: PageEvent) -> Vec<Command> {
        match event {
            PageEvent::ActiveLoaded(result) => self.on_active_loaded(result),
            PageEvent::ConfigLoaded(id, result) => self.on_config_loaded(id, result),
            PageEvent::SubmitCompleted(id, result) => self.on_submit_completed(id, result),
            PageEvent::TimerFired(timer) => self.on_timer(now_ms, timer),
            PageEvent::Scroll(position) => self.on_scroll(now_ms, position),
            PageEvent::PointerLeave { client_y } => self.on_pointer_leave(now_ms, client_y),
            PageEvent::KeyDown { key } if key == "Escape" => {
                self.close(now_ms, CloseReason::EscapeKey)
            }
            PageEvent::KeyDown { .. } => Vec::new(),
            PageEvent::CloseClicked => self.close(now_ms, CloseReason::CloseButton),
            PageEvent::BackdropClicked => self.close(now_ms, CloseReason::OverlayClick),
            PageEvent::TouchStart { client_y } => {
                if let WidgetState::Displayed(current) = &mut self.state {
                    current.touch_start_y = Some(client_y);
                }
                Vec::new()
            }
            PageEvent::TouchEnd { client_y } => self.on_touch_end(now_ms, client_y),
            PageEvent::SubmitForm { email } => self.submit(now_ms, &email),
        }
    }

    fn on_active_loaded(&mut self, result: PopupResult<Vec<PopupSummary>>) -> Vec<Command> {
        if !matches!(self.state, WidgetState::FetchingActive) {
            return Vec::new();
        }
        let popups = match result {
            Ok(popups) => popups,
            Err(e) => {
                warn!(error = %e, "failed to load active popups");
                metrics::counter!("popup.fetch_errors").increment(1);
                self.state = WidgetState::Idle;
                return Vec::new();
            }
        };

        let Some(first) = popups.into_iter().next() else {
            debug!("no active popups for page");
            self.state = WidgetState::Idle;
            return Vec::new();
        };

        self.state = WidgetState::FetchingConfig(first.id.clone());
        vec![Command::FetchConfig {
            popup_id: first.id,
            session_id: self.session_id.clone(),
        }]
    }

    fn on_config_loaded(&mut self, id: PopupId, result: PopupResult<PopupConfig>) -> Vec<Command> {
        match &self.state {
            WidgetState::FetchingConfig(expected) if *expected == id => {}
            _ => return Vec::new(),
        }
        let config = match result {
            Ok(config) => config,
            Err(e) => {
                warn!(popup_id = %id, error = %e, "failed to load popup config");
                metrics::counter!("popup.fetch_errors").increment(1);
                self.state = WidgetState::Idle;
                return Vec::new();
            }
        };
        self.arm(config)
    }

    /// Install the config's single trigger.
    fn arm(&mut self, config: PopupConfig) -> Vec<Command> {
        let id = config.id.clone();
        let mut commands = Vec::new();

        let trigger = match config.trigger_type {
            TriggerType::Time => {
                let delay_ms =
                    config.trigger_value_or(self.timings.default_time_trigger_ms as f64) as u64;
                commands.push(Command::Schedule {
                    delay_ms,
                    timer: Timer::Trigger(id.clone()),
                });
                ArmedTrigger::Timer
            }
            TriggerType::PageLoad => {
                commands.push(Command::Schedule {
                    delay_ms: self.timings.page_load_delay_ms,
                    timer: Timer::Trigger(id.clone()),
                });
                ArmedTrigger::Timer
            }
            TriggerType::Scroll => {
                self.host.install_listener(Listener::Scroll);
                ArmedTrigger::Scroll {
                    threshold_percent: config
                        .trigger_value_or(self.timings.default_scroll_trigger_percent),
                }
            }
            TriggerType::ExitIntent => {
                if self.page.device != DeviceClass::Desktop {
                    info!(
                        popup_id = %id,
                        device = %self.page.device,
                        "exit-intent trigger is desktop only, not arming"
                    );
                    self.state = WidgetState::Idle;
                    return Vec::new();
                }
                self.host.install_listener(Listener::ExitIntent);
                ArmedTrigger::ExitIntent
            }
        };

        info!(popup_id = %id, trigger = ?config.trigger_type, "popup armed");
        self.state = WidgetState::Armed(ArmedPopup { config, trigger });
        commands
    }

    fn on_scroll(&mut self, now_ms: u64, position: ScrollPosition) -> Vec<Command> {
        let Some(percent) = position.percent() else {
            return Vec::new();
        };
        self.max_scroll_percent = self.max_scroll_percent.max(percent);

        match &self.state {
            WidgetState::Armed(ArmedPopup {
                trigger: ArmedTrigger::Scroll { threshold_percent },
                ..
            }) if percent >= *threshold_percent => {
                self.host.remove_listener(Listener::Scroll);
                self.fire(now_ms)
            }
            _ => Vec::new(),
        }
    }

    fn on_pointer_leave(&mut self, now_ms: u64, client_y: f64) -> Vec<Command> {
        match &self.state {
            WidgetState::Armed(ArmedPopup {
                trigger: ArmedTrigger::ExitIntent,
                ..
            }) if client_y <= 0.0 => {
                self.host.remove_listener(Listener::ExitIntent);
                self.fire(now_ms)
            }
            _ => Vec::new(),
        }
    }

    fn on_touch_end(&mut self, now_ms: u64, client_y: f64) -> Vec<Command> {
        if self.page.device != DeviceClass::Mobile {
            return Vec::new();
        }
        let WidgetState::Displayed(current) = &mut self.state else {
            return Vec::new();
        };
        let Some(start_y) = current.touch_start_y.take() else {
            return Vec::new();
        };
        if start_y - client_y > self.timings.swipe_threshold_px {
            self.close(now_ms, CloseReason::SwipeUp)
        } else {
            Vec::new()
        }
    }

    fn on_timer(&mut self, now_ms: u64, timer: Timer) -> Vec<Command> {
        match timer {
            Timer::Trigger(id) => match &self.state {
                WidgetState::Armed(ArmedPopup {
                    config,
                    trigger: ArmedTrigger::Timer,
                }) if config.id == id => self.fire(now_ms),
                _ => Vec::new(),
            },
            Timer::Reveal(id) => {
                if matches!(&self.state, WidgetState::Displayed(c) if c.config.id == id) {
                    self.host.set_overlay_visible(true);
                }
                Vec::new()
            }
            Timer::Detach(id) => {
                if matches!(&self.state, WidgetState::Closing(closing) if *closing == id) {
                    self.host.unmount_overlay();
                    self.state = WidgetState::Closed;
                    debug!(popup_id = %id, "popup detached");
                }
                Vec::new()
            }
            Timer::AutoClose(id) => {
                if matches!(&self.state, WidgetState::Displayed(c) if c.config.id == id) {
                    self.close(now_ms, CloseReason::AutoClose)
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// The armed trigger fired: render and mount the popup.
    fn fire(&mut self, now_ms: u64) -> Vec<Command> {
        let armed = match std::mem::replace(&mut self.state, WidgetState::Closed) {
            WidgetState::Armed(armed) => armed,
            other => {
                self.state = other;
                return Vec::new();
            }
        };
        let config = armed.config;
        let id = config.id.clone();

        if self.displayed.contains(&id) {
            debug!(popup_id = %id, "popup already shown on this page");
            return Vec::new();
        }

        let rendered = match render_popup(&config) {
            Ok(rendered) => rendered,
            Err(e) => {
                error!(popup_id = %id, error = %e, "failed to render popup");
                self.state = WidgetState::Idle;
                return Vec::new();
            }
        };
        if let Err(e) = self.host.mount_overlay(&rendered) {
            error!(popup_id = %id, error = %e, "failed to mount popup");
            self.state = WidgetState::Idle;
            return Vec::new();
        }

        self.displayed.insert(id.clone());
        self.host.install_listener(Listener::Keyboard);
        if self.page.device == DeviceClass::Mobile {
            self.host.install_listener(Listener::Swipe);
        }
        self.state = WidgetState::Displayed(CurrentPopup {
            config,
            button_text: rendered.button_text,
            displayed_at_ms: now_ms,
            submit: SubmitState::Ready,
            touch_start_y: None,
        });

        metrics::counter!("popup.impressions").increment(1);
        info!(popup_id = %id, "popup displayed");

        vec![
            Command::Schedule {
                delay_ms: self.timings.frame_delay_ms,
                timer: Timer::Reveal(id.clone()),
            },
            Command::Track(self.track_request(
                id,
                TrackEventType::Impression,
                now_ms,
                None,
                None,
            )),
        ]
    }

    /// Start the exit transition. No-op unless a popup is displayed.
    pub fn close(&mut self, now_ms: u64, reason: CloseReason) -> Vec<Command> {
        let current = match std::mem::replace(&mut self.state, WidgetState::Closed) {
            WidgetState::Displayed(current) => current,
            other => {
                self.state = other;
                return Vec::new();
            }
        };
        let id = current.config.id;
        let dwell_ms = now_ms.saturating_sub(current.displayed_at_ms);

        self.host.set_overlay_visible(false);
        self.host.remove_listener(Listener::Keyboard);
        self.host.remove_listener(Listener::Swipe);
        self.state = WidgetState::Closing(id.clone());

        metrics::counter!("popup.closes", "reason" => reason.as_str()).increment(1);
        info!(popup_id = %id, reason = reason.as_str(), dwell_ms, "popup closing");

        vec![
            Command::Track(self.track_request(
                id.clone(),
                TrackEventType::Close,
                now_ms,
                Some(reason),
                Some(dwell_ms),
            )),
            Command::Schedule {
                delay_ms: self.timings.close_transition_ms,
                timer: Timer::Detach(id),
            },
        ]
    }

    /// Validate and submit the popup's email form.
    pub fn submit(&mut self, now_ms: u64, raw_email: &str) -> Vec<Command> {
        let WidgetState::Displayed(current) = &mut self.state else {
            return Vec::new();
        };
        if current.submit != SubmitState::Ready {
            debug!(popup_id = %current.config.id, "submission already in progress");
            return Vec::new();
        }

        let email = match validate_email(raw_email) {
            Ok(email) => email.to_string(),
            Err(e) => {
                if let PopupError::Validation(message) = &e {
                    self.host.show_form_error(message);
                }
                return Vec::new();
            }
        };

        current.submit = SubmitState::InFlight;
        self.host.clear_form_error();
        self.host.set_submit_busy(true, SUBMITTING_LABEL);

        let request = SubmitRequest {
            email,
            popup_id: current.config.id.clone(),
            session_id: self.session_id.clone(),
            page_url: self.page.url.clone(),
            user_agent: self.page.user_agent.clone(),
            referrer: self.page.referrer.clone(),
            device_type: self.page.device,
            time_to_action: now_ms.saturating_sub(current.displayed_at_ms),
        };
        vec![Command::Submit(request)]
    }

    fn on_submit_completed(
        &mut self,
        id: PopupId,
        result: PopupResult<SubmitResponse>,
    ) -> Vec<Command> {
        let WidgetState::Displayed(current) = &mut self.state else {
            debug!(popup_id = %id, "submission finished after popup closed");
            return Vec::new();
        };
        if current.config.id != id || current.submit != SubmitState::InFlight {
            return Vec::new();
        }

        let failure = match result {
            Ok(SubmitResponse {
                success: true,
                discount_code,
                ..
            }) => {
                current.submit = SubmitState::Succeeded;
                let html = render_success(&current.config, discount_code.as_deref());
                self.host.show_success(&html);
                metrics::counter!("popup.submissions", "outcome" => "ok").increment(1);
                info!(popup_id = %id, "popup submission accepted");
                return vec![Command::Schedule {
                    delay_ms: self.timings.success_auto_close_ms,
                    timer: Timer::AutoClose(id),
                }];
            }
            Ok(SubmitResponse { error, .. }) => error,
            Err(e) => {
                warn!(popup_id = %id, error = %e, "popup submission failed");
                None
            }
        };

        current.submit = SubmitState::Ready;
        let message = failure
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| GENERIC_SUBMIT_ERROR.to_string());
        self.host.set_submit_busy(false, &current.button_text);
        self.host.show_form_error(&message);
        metrics::counter!("popup.submissions", "outcome" => "failed").increment(1);
        Vec::new()
    }

    fn track_request(
        &self,
        popup_id: PopupId,
        event_type: TrackEventType,
        now_ms: u64,
        close_reason: Option<CloseReason>,
        time_displayed: Option<u64>,
    ) -> TrackRequest {
        TrackRequest {
            popup_id,
            event_type,
            session_id: self.session_id.clone(),
            page_url: self.page.url.clone(),
            user_agent: self.page.user_agent.clone(),
            time_on_page: now_ms,
            scroll_depth: self.max_scroll_percent.round() as u32,
            close_reason,
            time_displayed,
        }
    }
}
