//! Tokio driver for a [`PopupController`].
//!
//! The runtime owns the controller and an event channel. Network calls and
//! timers requested by the controller run as spawned tasks that only report
//! back through the channel, so the controller is only ever touched from the
//! event loop and never waits on the network.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::PopupApi;
use crate::controller::PopupController;
use crate::events::{Command, PageEvent, ScrollPosition};
use crate::host::PageHost;

#[derive(Debug)]
enum Inbound {
    Event(PageEvent),
    Unload,
}

/// Cloneable handle the page uses to feed DOM events into the runtime.
#[derive(Debug, Clone)]
pub struct PageHandle {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl PageHandle {
    /// Deliver an event. Returns `false` once the page has been unloaded.
    pub fn send(&self, event: PageEvent) -> bool {
        self.tx.send(Inbound::Event(event)).is_ok()
    }

    pub fn scroll(&self, position: ScrollPosition) -> bool {
        self.send(PageEvent::Scroll(position))
    }

    pub fn pointer_leave(&self, client_y: f64) -> bool {
        self.send(PageEvent::PointerLeave { client_y })
    }

    pub fn key_down(&self, key: impl Into<String>) -> bool {
        self.send(PageEvent::KeyDown { key: key.into() })
    }

    /// Close the current popup via its close control.
    pub fn close(&self) -> bool {
        self.send(PageEvent::CloseClicked)
    }

    pub fn backdrop_click(&self) -> bool {
        self.send(PageEvent::BackdropClicked)
    }

    pub fn touch_start(&self, client_y: f64) -> bool {
        self.send(PageEvent::TouchStart { client_y })
    }

    pub fn touch_end(&self, client_y: f64) -> bool {
        self.send(PageEvent::TouchEnd { client_y })
    }

    /// Submit the popup form with the given email.
    pub fn submit(&self, email: impl Into<String>) -> bool {
        self.send(PageEvent::SubmitForm {
            email: email.into(),
        })
    }

    /// Stop the event loop. In-flight work is abandoned.
    pub fn unload(&self) -> bool {
        self.tx.send(Inbound::Unload).is_ok()
    }
}

pub struct PopupRuntime<A: PopupApi, H: PageHost> {
    controller: PopupController<H>,
    api: Arc<A>,
    tx: mpsc::UnboundedSender<Inbound>,
    rx: mpsc::UnboundedReceiver<Inbound>,
    loaded_at: Instant,
}

impl<A, H> PopupRuntime<A, H>
where
    A: PopupApi,
    H: PageHost,
{
    /// The page is considered loaded when the runtime is created.
    pub fn new(controller: PopupController<H>, api: Arc<A>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            controller,
            api,
            tx,
            rx,
            loaded_at: Instant::now(),
        }
    }

    pub fn handle(&self) -> PageHandle {
        PageHandle {
            tx: self.tx.clone(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.loaded_at.elapsed().as_millis() as u64
    }

    /// Start the controller and process events until the page unloads.
    /// Returns the controller for inspection.
    pub async fn run(mut self) -> PopupController<H> {
        let commands = self.controller.start(self.elapsed_ms());
        self.dispatch(commands);

        while let Some(inbound) = self.rx.recv().await {
            let event = match inbound {
                Inbound::Event(event) => event,
                Inbound::Unload => break,
            };
            let commands = self.controller.handle(self.elapsed_ms(), event);
            self.dispatch(commands);
        }

        info!(phase = ?self.controller.phase(), "popup runtime stopped");
        self.controller
    }

    fn dispatch(&self, commands: Vec<Command>) {
        for command in commands {
            let api = Arc::clone(&self.api);
            let tx = self.tx.clone();
            match command {
                Command::FetchActive { page_url, device } => {
                    tokio::spawn(async move {
                        let result = api.active_popups(&page_url, device).await;
                        let _ = tx.send(Inbound::Event(PageEvent::ActiveLoaded(result)));
                    });
                }
                Command::FetchConfig {
                    popup_id,
                    session_id,
                } => {
                    tokio::spawn(async move {
                        let result = api.popup_config(&popup_id, &session_id).await;
                        let _ = tx.send(Inbound::Event(PageEvent::ConfigLoaded(popup_id, result)));
                    });
                }
                Command::Submit(request) => {
                    tokio::spawn(async move {
                        let result = api.submit(&request).await;
                        let _ = tx.send(Inbound::Event(PageEvent::SubmitCompleted(
                            request.popup_id,
                            result,
                        )));
                    });
                }
                Command::Track(request) => {
                    tokio::spawn(async move {
                        match api.track(&request).await {
                            Ok(()) => debug!(
                                popup_id = %request.popup_id,
                                event_type = ?request.event_type,
                                "popup event tracked"
                            ),
                            Err(e) => warn!(
                                popup_id = %request.popup_id,
                                event_type = ?request.event_type,
                                error = %e,
                                "failed to track popup event"
                            ),
                        }
                    });
                }
                Command::Schedule { delay_ms, timer } => {
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        let _ = tx.send(Inbound::Event(PageEvent::TimerFired(timer)));
                    });
                }
            }
        }
    }
}
