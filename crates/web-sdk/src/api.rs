//! Client for the remote popup API.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use popup_core::config::ApiConfig;
use popup_core::types::{
    ActivePopupsResponse, PopupConfigResponse, PopupSummary, SubmitRequest, SubmitResponse,
    TrackRequest,
};
use popup_core::{DeviceClass, PopupConfig, PopupError, PopupId, PopupResult};

const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]", "::1", "0.0.0.0"];

/// The four endpoints the widget consumes. Futures are `Send` so the runtime
/// can spawn them.
pub trait PopupApi: Send + Sync + 'static {
    /// `GET /api/popup/active`. `success: false` is an error.
    fn active_popups(
        &self,
        page_url: &str,
        device: DeviceClass,
    ) -> impl Future<Output = PopupResult<Vec<PopupSummary>>> + Send;

    /// `GET /api/popup/config/<id>`. `success: false` or a missing config is
    /// an error.
    fn popup_config(
        &self,
        popup_id: &PopupId,
        session_id: &str,
    ) -> impl Future<Output = PopupResult<PopupConfig>> + Send;

    /// `POST /api/popup/submit`. The body is returned as-is, including
    /// `success: false` responses, whatever the HTTP status.
    fn submit(
        &self,
        request: &SubmitRequest,
    ) -> impl Future<Output = PopupResult<SubmitResponse>> + Send;

    /// `POST /api/popup/track`. The response body is ignored.
    fn track(&self, request: &TrackRequest) -> impl Future<Output = PopupResult<()>> + Send;
}

/// Pick the API origin for a page: the configured override, the local
/// development origin for loopback pages, or the page's own origin.
pub fn resolve_api_base(config: &ApiConfig, page_url: &str) -> PopupResult<Url> {
    if let Some(base) = config.base_url.as_deref().filter(|b| !b.is_empty()) {
        return parse_url(base);
    }

    let page = parse_url(page_url)?;
    let host = page.host_str().unwrap_or_default();
    if LOOPBACK_HOSTS.contains(&host) {
        return parse_url(&config.local_dev_origin);
    }

    let origin = page.origin();
    if !origin.is_tuple() {
        return Err(PopupError::Config(format!(
            "page {page_url} has no usable origin"
        )));
    }
    parse_url(&origin.ascii_serialization())
}

fn parse_url(raw: &str) -> PopupResult<Url> {
    Url::parse(raw).map_err(|e| PopupError::Config(format!("invalid url {raw}: {e}")))
}

fn transport(err: reqwest::Error) -> PopupError {
    PopupError::Transport(err.to_string())
}

/// Read a JSON body. A body that arrives but does not parse is a
/// serialization error, not a transport one.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> PopupResult<T> {
    let body = response.bytes().await.map_err(transport)?;
    Ok(serde_json::from_slice(&body)?)
}

/// [`PopupApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPopupApi {
    client: reqwest::Client,
    base: Url,
}

impl HttpPopupApi {
    /// Endpoints are resolved under `base`, so a base with a path prefix
    /// (`https://cdn.example/widgets`) keeps it.
    pub fn new(mut base: Url, timeout: Duration) -> PopupResult<Self> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &ApiConfig, page_url: &str) -> PopupResult<Self> {
        let base = resolve_api_base(config, page_url)?;
        debug!(base = %base, "resolved popup api base");
        Self::new(base, Duration::from_millis(config.request_timeout_ms))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> PopupResult<Url> {
        self.base
            .join(path)
            .map_err(|e| PopupError::Config(format!("invalid endpoint {path}: {e}")))
    }
}

impl PopupApi for HttpPopupApi {
    async fn active_popups(
        &self,
        page_url: &str,
        device: DeviceClass,
    ) -> PopupResult<Vec<PopupSummary>> {
        let url = self.endpoint("api/popup/active")?;
        let response = self
            .client
            .get(url)
            .query(&[("page_url", page_url), ("device_type", device.as_str())])
            .send()
            .await
            .map_err(transport)?;
        let response: ActivePopupsResponse = decode(response).await?;

        if !response.success {
            return Err(PopupError::server(response.error));
        }
        Ok(response.popups)
    }

    async fn popup_config(&self, popup_id: &PopupId, session_id: &str) -> PopupResult<PopupConfig> {
        let mut url = self.endpoint("api/popup/config")?;
        url.path_segments_mut()
            .map_err(|_| PopupError::Config(format!("api base {} cannot take a path", self.base)))?
            .push(&popup_id.to_string());

        let response = self
            .client
            .get(url)
            .query(&[("session_id", session_id)])
            .send()
            .await
            .map_err(transport)?;
        let response: PopupConfigResponse = decode(response).await?;

        match response {
            PopupConfigResponse {
                success: true,
                config: Some(config),
                ..
            } => Ok(config),
            PopupConfigResponse { error, .. } => Err(PopupError::server(error)),
        }
    }

    async fn submit(&self, request: &SubmitRequest) -> PopupResult<SubmitResponse> {
        let url = self.endpoint("api/popup/submit")?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }

    async fn track(&self, request: &TrackRequest) -> PopupResult<()> {
        let url = self.endpoint("api/popup/track")?;
        self.client
            .post(url)
            .json(request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(transport)?;
        Ok(())
    }
}
