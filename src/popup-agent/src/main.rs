//! Popup agent: simulates one visit to a page against a live popup API
//! and prints what the widget renders.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use popup_core::config::AppConfig;
use popup_core::session::{load_or_create_session_id, MemorySessionStore};
use popup_core::PageContext;
use popup_web_sdk::{HttpPopupApi, MemoryPage, PopupController, PopupRuntime, ScrollPosition};
use tokio::time::Instant;
use tracing::{info, warn};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Simulated document: 3000px tall in a 1000px viewport.
const DOCUMENT_HEIGHT: f64 = 3000.0;
const VIEWPORT_HEIGHT: f64 = 1000.0;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "popup-agent")]
#[command(about = "Simulate a page visit against the popup API")]
#[command(version)]
struct Cli {
    /// URL of the visited page
    #[arg(long)]
    page_url: String,

    /// User agent of the simulated browser (decides the device class)
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Referrer of the visit
    #[arg(long, default_value = "")]
    referrer: String,

    /// API origin (overrides config and the page-derived origin)
    #[arg(long, env = "POPUP_WIDGET__API__BASE_URL")]
    api_base: Option<String>,

    /// Scroll to this depth, in percent, once the popup is armed
    #[arg(long)]
    scroll_to: Option<f64>,

    /// Leave the viewport through the top edge once the popup is armed
    #[arg(long, default_value_t = false)]
    exit_intent: bool,

    /// Submit this email once the popup is shown
    #[arg(long)]
    email: Option<String>,

    /// Time spent on the page, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    visit_ms: u64,

    /// Wait before simulating scroll or exit intent, in milliseconds
    #[arg(long, default_value_t = 1_000)]
    settle_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "popup_agent=info,popup_web_sdk=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(base) = cli.api_base.clone() {
        config.api.base_url = Some(base);
    }

    let page_context = PageContext::new(&cli.page_url, &cli.user_agent, &cli.referrer);
    let mut session_store = MemorySessionStore::new();
    let session_id = load_or_create_session_id(&mut session_store, &config.session_storage_key);

    let api = Arc::new(HttpPopupApi::from_config(&config.api, &cli.page_url)?);
    info!(
        page_url = %page_context.url,
        device = %page_context.device,
        api_base = %api.base(),
        session_id = %session_id,
        "Simulating page visit"
    );

    let page = MemoryPage::new();
    let controller =
        PopupController::new(page_context, session_id, config.timings.clone(), page.clone());
    let runtime = PopupRuntime::new(controller, api);
    let handle = runtime.handle();
    let visit = tokio::spawn(runtime.run());

    let deadline = Instant::now() + Duration::from_millis(cli.visit_ms);
    tokio::time::sleep(Duration::from_millis(cli.settle_ms.min(cli.visit_ms))).await;

    if let Some(percent) = cli.scroll_to {
        let max = DOCUMENT_HEIGHT - VIEWPORT_HEIGHT;
        handle.scroll(ScrollPosition {
            scroll_top: max * percent.clamp(0.0, 100.0) / 100.0,
            scroll_height: DOCUMENT_HEIGHT,
            viewport_height: VIEWPORT_HEIGHT,
        });
    }
    if cli.exit_intent {
        handle.pointer_leave(-1.0);
    }

    if wait_until(deadline, || page.has_overlay()).await {
        if let Some(overlay) = page.snapshot().overlay {
            println!("--- popup {} ---", overlay.popup_id);
            println!("<style>\n{}\n</style>", overlay.css);
            println!("{}", overlay.html);
        }

        if let Some(email) = cli.email.as_deref() {
            handle.submit(email);
            let settled = wait_until(deadline, || {
                let state = page.snapshot();
                state.body_html.is_some() || state.form_error.is_some()
            })
            .await;
            let state = page.snapshot();
            match (settled, state.body_html, state.form_error) {
                (true, Some(body), _) => println!("--- submitted ---\n{body}"),
                (true, None, Some(error)) => println!("--- submit failed ---\n{error}"),
                _ => warn!("Submission did not complete before the visit ended"),
            }
        }
    } else {
        info!("No popup shown during the visit");
    }

    tokio::time::sleep_until(deadline).await;
    handle.unload();
    let controller = visit.await?;
    info!(phase = ?controller.phase(), "Visit finished");

    Ok(())
}

/// Poll `done` until it holds or `deadline` passes.
async fn wait_until(deadline: Instant, done: impl Fn() -> bool) -> bool {
    loop {
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
