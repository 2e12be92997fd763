//! The page seam. The controller never touches the DOM directly; it drives
//! a [`PageHost`]. [`MemoryPage`] is a headless host that records what a
//! browser page would show.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use popup_core::templates::RenderedPopup;
use popup_core::{PopupError, PopupId, PopupResult};

use crate::events::Listener;

pub trait PageHost {
    /// Append the overlay (markup plus stylesheet) to the document.
    fn mount_overlay(&mut self, popup: &RenderedPopup) -> PopupResult<()>;
    /// Toggle the "show" class that drives the enter/exit transition.
    fn set_overlay_visible(&mut self, visible: bool);
    /// Detach the overlay and its stylesheet.
    fn unmount_overlay(&mut self);
    fn show_form_error(&mut self, message: &str);
    fn clear_form_error(&mut self);
    /// Disable the submit control and relabel it, or restore it.
    fn set_submit_busy(&mut self, busy: bool, label: &str);
    /// Replace the popup body with the success view.
    fn show_success(&mut self, html: &str);
    fn install_listener(&mut self, listener: Listener);
    fn remove_listener(&mut self, listener: Listener);
}

/// Observable state of a [`MemoryPage`].
#[derive(Debug, Clone, Default)]
pub struct PageState {
    pub overlay: Option<RenderedPopup>,
    pub visible: bool,
    pub body_html: Option<String>,
    pub form_error: Option<String>,
    pub submit_disabled: bool,
    pub submit_label: Option<String>,
    pub listeners: HashSet<Listener>,
    /// Every popup ever mounted, in order.
    pub mounted_history: Vec<PopupId>,
    reject_mounts: bool,
}

/// Shared in-memory page. Clones observe the same state, so a test can keep
/// one handle while the controller owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryPage {
    inner: Arc<Mutex<PageState>>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page whose document refuses the overlay, as when the mount point
    /// is missing.
    pub fn rejecting_mounts() -> Self {
        let page = Self::default();
        page.state().reject_mounts = true;
        page
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.inner.lock().expect("page mutex poisoned")
    }

    pub fn snapshot(&self) -> PageState {
        self.state().clone()
    }

    pub fn has_overlay(&self) -> bool {
        self.state().overlay.is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.state().visible
    }

    pub fn form_error(&self) -> Option<String> {
        self.state().form_error.clone()
    }

    pub fn has_listener(&self, listener: Listener) -> bool {
        self.state().listeners.contains(&listener)
    }
}

impl PageHost for MemoryPage {
    fn mount_overlay(&mut self, popup: &RenderedPopup) -> PopupResult<()> {
        let mut state = self.state();
        if state.reject_mounts {
            return Err(PopupError::Host("overlay container unavailable".into()));
        }
        state.mounted_history.push(popup.popup_id.clone());
        state.overlay = Some(popup.clone());
        state.visible = false;
        state.body_html = None;
        state.form_error = None;
        state.submit_disabled = false;
        state.submit_label = Some(popup.button_text.clone());
        Ok(())
    }

    fn set_overlay_visible(&mut self, visible: bool) {
        let mut state = self.state();
        if state.overlay.is_some() {
            state.visible = visible;
        }
    }

    fn unmount_overlay(&mut self) {
        let mut state = self.state();
        state.overlay = None;
        state.visible = false;
        state.body_html = None;
        state.form_error = None;
        state.submit_disabled = false;
        state.submit_label = None;
    }

    fn show_form_error(&mut self, message: &str) {
        self.state().form_error = Some(message.to_string());
    }

    fn clear_form_error(&mut self) {
        self.state().form_error = None;
    }

    fn set_submit_busy(&mut self, busy: bool, label: &str) {
        let mut state = self.state();
        state.submit_disabled = busy;
        state.submit_label = Some(label.to_string());
    }

    fn show_success(&mut self, html: &str) {
        self.state().body_html = Some(html.to_string());
    }

    fn install_listener(&mut self, listener: Listener) {
        self.state().listeners.insert(listener);
    }

    fn remove_listener(&mut self, listener: Listener) {
        self.state().listeners.remove(&listener);
    }
}
