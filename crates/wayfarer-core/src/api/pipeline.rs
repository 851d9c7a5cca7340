//! Authenticated request pipeline.
//!
//! Every outbound call goes through [`RequestPipeline`]:
//! 1. If the access token is missing or inside the refresh buffer, refresh
//!    first. A failed refresh escalates without sending anything.
//! 2. Send with `Authorization: Bearer` and the anti-CSRF marker header.
//! 3. On 401, refresh and retry after a fixed delay, at most `max_retries`
//!    times, then escalate.
//!
//! The delay does not grow between attempts. Refresh exchanges are cheap and
//! rare, so a constant pause is enough.
//!
//! Uploads take the preemptive path only. A multipart body is consumed by the
//! send and cannot be replayed, so a 401 on an upload escalates at once.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::Form;
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::refresh::REFRESH_PATH;
use crate::auth::{RefreshCoordinator, SessionEscalation, SessionKind, TokenInspector, TokenStore};
use crate::config::Config;

/// Marks the call as programmatic rather than a browser navigation.
pub const REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");
const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";

/// A replayable request. JSON bodies are serialized by the caller and sent as is.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn json_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// One session's pipeline. The session kind is fixed at construction, so the
/// store that is read, the coordinator that refreshes and the login route
/// used on escalation always belong to the same session.
#[derive(Clone)]
pub struct RequestPipeline {
    client: Client,
    kind: SessionKind,
    store: Arc<dyn TokenStore>,
    refresher: RefreshCoordinator,
    escalation: SessionEscalation,
    refresh_buffer: chrono::Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl RequestPipeline {
    pub fn new(
        client: Client,
        config: &Config,
        kind: SessionKind,
        store: Arc<dyn TokenStore>,
        escalation: SessionEscalation,
    ) -> Self {
        let refresher = RefreshCoordinator::new(
            client.clone(),
            config.endpoint(REFRESH_PATH),
            kind,
            store.clone(),
        );
        Self {
            client,
            kind,
            store,
            refresher,
            escalation,
            refresh_buffer: config.refresh_buffer(),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub fn escalation(&self) -> &SessionEscalation {
        &self.escalation
    }

    pub fn refresh_buffer(&self) -> chrono::Duration {
        self.refresh_buffer
    }

    /// Send `request`, refreshing and retrying on 401 as needed.
    ///
    /// Returns the response only for 2xx statuses.
    pub async fn execute(&self, request: ApiRequest) -> Result<Response, ApiError> {
        let mut attempt: u32 = 0;
        loop {
            let token = self.fresh_access_token().await?;
            let mut builder = self
                .client
                .request(request.method.clone(), &request.url)
                .headers(Self::headers(&request.headers, &token, request.body.is_some())?);
            if let Some(ref body) = request.body {
                builder = builder.body(body.clone());
            }

            debug!(kind = %self.kind, method = %request.method, url = %request.url, attempt, "Sending request");
            let response = builder.send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }
            if status != StatusCode::UNAUTHORIZED {
                return Err(Self::classify(response).await);
            }
            if attempt >= self.max_retries {
                warn!(kind = %self.kind, url = %request.url, attempt, "Retry budget exhausted on 401");
                return Err(self.escalate());
            }

            warn!(
                kind = %self.kind,
                url = %request.url,
                attempt,
                delay_ms = self.retry_delay.as_millis() as u64,
                "Unauthorized, refreshing and retrying"
            );
            if !self.refresher.refresh().await {
                return Err(self.escalate());
            }
            tokio::time::sleep(self.retry_delay).await;
            attempt += 1;
        }
    }

    /// POST a multipart form. No reactive retry; see module docs.
    pub async fn upload(&self, url: &str, form: Form) -> Result<Response, ApiError> {
        let token = self.fresh_access_token().await?;
        debug!(kind = %self.kind, url, "Sending upload");

        // No Content-Type here: reqwest sets multipart/form-data with the boundary.
        let response = self
            .client
            .post(url)
            .headers(Self::headers(&HeaderMap::new(), &token, false)?)
            .multipart(form)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => {
                warn!(kind = %self.kind, url, "Upload rejected with 401");
                Err(self.escalate())
            }
            _ => Err(Self::classify(response).await),
        }
    }

    /// Current access token if fresh, otherwise the result of a refresh.
    /// A missing access token is treated the same as a stale one.
    async fn fresh_access_token(&self) -> Result<String, ApiError> {
        match self.store.access_token() {
            Some(token) if TokenInspector::is_fresh(&token, self.refresh_buffer) => return Ok(token),
            Some(_) => debug!(kind = %self.kind, "Access token stale, refreshing before send"),
            None => debug!(kind = %self.kind, "No access token, refreshing before send"),
        }

        if !self.refresher.refresh().await {
            return Err(self.escalate());
        }
        match self.store.access_token() {
            Some(token) => Ok(token),
            None => Err(self.escalate()),
        }
    }

    fn headers(extra: &HeaderMap, token: &str, json: bool) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(REQUESTED_WITH, HeaderValue::from_static(REQUESTED_WITH_VALUE));
        if json {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        for (name, value) in extra {
            headers.insert(name.clone(), value.clone());
        }

        // Inserted last so callers cannot replace it.
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            ApiError::InvalidRequest("Access token contains characters not allowed in a header".to_string())
        })?;
        bearer.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    fn escalate(&self) -> ApiError {
        self.escalation.escalate(self.kind, self.store.as_ref())
    }

    async fn classify(response: Response) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        ApiError::from_status(status, &body)
    }
}
