//! End-to-end runs of the popup runtime against a stub API, on tokio's
//! paused clock so delays can be asserted exactly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use popup_core::config::TimingConfig;
use popup_core::types::{
    CloseReason, PopupSummary, PopupTokens, SubmitRequest, SubmitResponse, TrackEventType,
    TrackRequest, TriggerType,
};
use popup_core::{DeviceClass, PageContext, PopupConfig, PopupError, PopupId, PopupResult};
use popup_web_sdk::controller::GENERIC_SUBMIT_ERROR;
use popup_web_sdk::{MemoryPage, PageHandle, Phase, PopupApi, PopupController, PopupRuntime};
use tokio::task::JoinHandle;
use tokio::time::sleep;

const DESKTOP_UA: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15 Version/17.0 Safari/605.1.15";

#[derive(Debug, Clone)]
enum SubmitOutcome {
    Accept(&'static str),
    Reject(&'static str),
    NetworkDown,
}

struct StubApi {
    popups: Vec<PopupSummary>,
    config: Option<PopupConfig>,
    submit_outcome: SubmitOutcome,
    active_calls: Mutex<Vec<(String, DeviceClass)>>,
    submits: Mutex<Vec<SubmitRequest>>,
    tracked: Mutex<Vec<TrackRequest>>,
}

impl StubApi {
    fn new(config: Option<PopupConfig>) -> Self {
        let popups = config
            .iter()
            .map(|c| PopupSummary {
                id: c.id.clone(),
                extra: Default::default(),
            })
            .collect();
        Self {
            popups,
            config,
            submit_outcome: SubmitOutcome::Accept("WELCOME10"),
            active_calls: Mutex::new(Vec::new()),
            submits: Mutex::new(Vec::new()),
            tracked: Mutex::new(Vec::new()),
        }
    }

    fn with_submit(mut self, outcome: SubmitOutcome) -> Self {
        self.submit_outcome = outcome;
        self
    }

    fn tracked(&self) -> Vec<TrackRequest> {
        self.tracked.lock().unwrap().clone()
    }
}

impl PopupApi for StubApi {
    async fn active_popups(
        &self,
        page_url: &str,
        device: DeviceClass,
    ) -> PopupResult<Vec<PopupSummary>> {
        self.active_calls
            .lock()
            .unwrap()
            .push((page_url.to_string(), device));
        Ok(self.popups.clone())
    }

    async fn popup_config(&self, popup_id: &PopupId, _session_id: &str) -> PopupResult<PopupConfig> {
        self.config
            .clone()
            .filter(|c| c.id == *popup_id)
            .ok_or_else(|| PopupError::server(Some("popup not found".into())))
    }

    async fn submit(&self, request: &SubmitRequest) -> PopupResult<SubmitResponse> {
        self.submits.lock().unwrap().push(request.clone());
        match self.submit_outcome {
            SubmitOutcome::Accept(code) => Ok(SubmitResponse {
                success: true,
                discount_code: Some(code.to_string()),
                error: None,
            }),
            SubmitOutcome::Reject(message) => Ok(SubmitResponse {
                success: false,
                discount_code: None,
                error: Some(message.to_string()),
            }),
            SubmitOutcome::NetworkDown => {
                Err(PopupError::Transport("connection reset".into()))
            }
        }
    }

    async fn track(&self, request: &TrackRequest) -> PopupResult<()> {
        self.tracked.lock().unwrap().push(request.clone());
        Ok(())
    }
}

fn popup(trigger_type: TriggerType, trigger_value: Option<f64>) -> PopupConfig {
    PopupConfig {
        id: PopupId::Number(21),
        trigger_type,
        trigger_value,
        html_template: String::new(),
        css_template: String::new(),
        tokens: PopupTokens {
            title: Some("Join the list".into()),
            ..Default::default()
        },
    }
}

struct Harness {
    page: MemoryPage,
    api: Arc<StubApi>,
    handle: PageHandle,
    task: JoinHandle<PopupController<MemoryPage>>,
}

impl Harness {
    fn start(api: StubApi) -> Self {
        let page = MemoryPage::new();
        let api = Arc::new(api);
        let controller = PopupController::new(
            PageContext::new("https://shop.example/spring", DESKTOP_UA, ""),
            "popup_1700000000000_k3j5h2g1f".into(),
            TimingConfig::default(),
            page.clone(),
        );
        let runtime = PopupRuntime::new(controller, Arc::clone(&api));
        let handle = runtime.handle();
        let task = tokio::spawn(runtime.run());
        Self {
            page,
            api,
            handle,
            task,
        }
    }

    async fn finish(self) -> PopupController<MemoryPage> {
        self.handle.unload();
        self.task.await.unwrap()
    }
}

#[tokio::test(start_paused = true)]
async fn test_time_trigger_waits_for_configured_delay() {
    let h = Harness::start(StubApi::new(Some(popup(TriggerType::Time, Some(5000.0)))));

    sleep(Duration::from_millis(4999)).await;
    assert!(!h.page.has_overlay());

    sleep(Duration::from_millis(2)).await;
    assert!(h.page.has_overlay());

    sleep(Duration::from_millis(20)).await;
    assert!(h.page.is_visible());

    let tracked = h.api.tracked();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].event_type, TrackEventType::Impression);
    assert_eq!(tracked[0].time_on_page, 5000);

    let controller = h.finish().await;
    assert_eq!(controller.phase(), Phase::Displayed);
}

#[tokio::test(start_paused = true)]
async fn test_no_active_popups_never_shows_overlay() {
    let h = Harness::start(StubApi::new(None));

    sleep(Duration::from_secs(30)).await;
    h.handle.pointer_leave(-1.0);
    sleep(Duration::from_millis(10)).await;

    assert!(!h.page.has_overlay());
    assert!(h.page.snapshot().mounted_history.is_empty());
    assert!(h.api.tracked().is_empty());
    assert_eq!(
        h.api.active_calls.lock().unwrap().clone(),
        vec![("https://shop.example/spring".to_string(), DeviceClass::Desktop)]
    );

    let controller = h.finish().await;
    assert_eq!(controller.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_escape_closes_within_exit_transition() {
    let h = Harness::start(StubApi::new(Some(popup(TriggerType::PageLoad, None))));
    sleep(Duration::from_millis(200)).await;
    assert!(h.page.is_visible());

    h.handle.key_down("Escape");
    sleep(Duration::from_millis(299)).await;
    assert!(h.page.has_overlay());
    assert!(!h.page.is_visible());

    sleep(Duration::from_millis(2)).await;
    assert!(!h.page.has_overlay());

    let close = h
        .api
        .tracked()
        .into_iter()
        .find(|t| t.event_type == TrackEventType::Close)
        .expect("close event tracked");
    assert_eq!(close.close_reason, Some(CloseReason::EscapeKey));
    assert_eq!(close.time_displayed, Some(100));

    let controller = h.finish().await;
    assert_eq!(controller.phase(), Phase::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_scroll_trigger_through_page_handle() {
    let h = Harness::start(StubApi::new(Some(popup(TriggerType::Scroll, Some(50.0)))));
    sleep(Duration::from_millis(10)).await;

    let scrolled = |top: f64| popup_web_sdk::ScrollPosition {
        scroll_top: top,
        scroll_height: 3000.0,
        viewport_height: 1000.0,
    };
    h.handle.scroll(scrolled(400.0));
    sleep(Duration::from_millis(10)).await;
    assert!(!h.page.has_overlay());

    h.handle.scroll(scrolled(1000.0));
    h.handle.scroll(scrolled(1500.0));
    sleep(Duration::from_millis(10)).await;
    assert!(h.page.has_overlay());
    assert_eq!(h.page.snapshot().mounted_history.len(), 1);

    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_successful_submit_auto_closes_after_three_seconds() {
    let h = Harness::start(StubApi::new(Some(popup(TriggerType::PageLoad, None))));
    sleep(Duration::from_millis(200)).await;

    h.handle.submit("shopper@example.com");
    sleep(Duration::from_millis(2999)).await;
    let state = h.page.snapshot();
    assert!(state.visible);
    assert!(state.body_html.unwrap().contains("WELCOME10"));

    sleep(Duration::from_millis(2)).await;
    assert!(!h.page.is_visible());
    let close = h
        .api
        .tracked()
        .into_iter()
        .find(|t| t.event_type == TrackEventType::Close)
        .expect("close event tracked");
    assert_eq!(close.close_reason, Some(CloseReason::AutoClose));

    sleep(Duration::from_millis(300)).await;
    assert!(!h.page.has_overlay());

    let submits = h.api.submits.lock().unwrap().clone();
    assert_eq!(submits.len(), 1);
    assert_eq!(submits[0].email, "shopper@example.com");
    assert_eq!(submits[0].time_to_action, 100);

    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_submit_network_failure_reenables_form() {
    let api = StubApi::new(Some(popup(TriggerType::PageLoad, None)))
        .with_submit(SubmitOutcome::NetworkDown);
    let h = Harness::start(api);
    sleep(Duration::from_millis(200)).await;

    h.handle.submit("shopper@example.com");
    sleep(Duration::from_millis(10)).await;

    let state = h.page.snapshot();
    assert_eq!(state.form_error.as_deref(), Some(GENERIC_SUBMIT_ERROR));
    assert!(!state.submit_disabled);
    assert!(state.overlay.is_some());

    h.finish().await;
}

#[tokio::test(start_paused = true)]
async fn test_submit_server_error_shown_verbatim() {
    let api = StubApi::new(Some(popup(TriggerType::PageLoad, None)))
        .with_submit(SubmitOutcome::Reject("X"));
    let h = Harness::start(api);
    sleep(Duration::from_millis(200)).await;

    h.handle.submit("shopper@example.com");
    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.page.form_error().as_deref(), Some("X"));

    h.finish().await;
}
