//! API client for the booking backend.
//!
//! `ApiClient` is what pages, forms and the CLI talk to. It turns paths and
//! serde values into pipeline requests and parses JSON payloads back out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::multipart::Form;
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::pipeline::{ApiRequest, RequestPipeline};
use super::ApiError;
use crate::auth::{
    self, CredentialPair, Navigator, SessionEscalation, SessionKind, SessionState, TokenInspector, TokenStore,
};
use crate::config::Config;

/// Login endpoint, relative to the API base URL
const LOGIN_PATH: &str = "token/";

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

/// Client for one session kind.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<Config>,
    client: Client,
    pipeline: RequestPipeline,
}

impl ApiClient {
    /// Create a client over an explicit token store.
    pub fn new(
        config: Config,
        kind: SessionKind,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        let escalation = SessionEscalation::new(&config, navigator);
        let pipeline = RequestPipeline::new(client.clone(), &config, kind, store, escalation);
        Ok(Self {
            config: Arc::new(config),
            client,
            pipeline,
        })
    }

    /// Create a client using the store backend named in `config`.
    pub fn from_config(config: Config, kind: SessionKind, navigator: Arc<dyn Navigator>) -> anyhow::Result<Self> {
        let store = auth::open_store(&config, kind)?;
        Ok(Self::new(config, kind, store, navigator)?)
    }

    pub fn kind(&self) -> SessionKind {
        self.pipeline.kind()
    }

    pub fn login_route(&self) -> &str {
        self.config.login_route(self.kind())
    }

    /// Exchange username/password for a credential pair and store it.
    ///
    /// Rejected credentials return `AuthenticationRequired` without
    /// navigating: the caller is already on the login surface.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let url = self.config.endpoint(LOGIN_PATH);
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                warn!(kind = %self.kind(), username, "Login rejected");
                return Err(ApiError::AuthenticationRequired {
                    kind: self.kind(),
                    login_route: self.login_route().to_string(),
                });
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::from_status(status, &body));
            }
        }

        let tokens: LoginResponse = Self::parse(response).await?;
        if tokens.access.is_empty() || tokens.refresh.is_empty() {
            return Err(ApiError::InvalidResponse("Login response is missing tokens".to_string()));
        }
        self.pipeline
            .store()
            .set(CredentialPair::new(tokens.access, tokens.refresh))
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to store credentials: {e:#}")))?;
        info!(kind = %self.kind(), username, "Logged in");
        Ok(())
    }

    /// Drop the session and send the user to this kind's login route.
    pub fn logout(&self) {
        self.pipeline.escalation().escalate(self.kind(), self.pipeline.store().as_ref());
        info!(kind = %self.kind(), "Logged out");
    }

    /// True when an access token is present and outside the refresh buffer.
    pub fn is_authenticated(&self) -> bool {
        self.pipeline
            .store()
            .access_token()
            .map(|t| TokenInspector::is_fresh(&t, self.pipeline.refresh_buffer()))
            .unwrap_or(false)
    }

    pub fn session_state(&self) -> SessionState {
        SessionState::derive(
            self.pipeline.store().get().as_ref(),
            self.pipeline.refresher().is_refreshing(),
            self.pipeline.refresh_buffer(),
            Utc::now(),
        )
    }

    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.pipeline
            .store()
            .access_token()
            .and_then(|t| TokenInspector::expiry(&t))
    }

    // ===== Verbs =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(Method::GET, path, None).await?;
        Self::parse(response).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let response = self.send(Method::POST, path, Some(Self::encode(body)?)).await?;
        Self::parse(response).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let response = self.send(Method::PUT, path, Some(Self::encode(body)?)).await?;
        Self::parse(response).await
    }

    /// DELETE; the response body is not read.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }

    pub async fn upload<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T, ApiError> {
        let url = self.config.endpoint(path);
        let response = self.pipeline.upload(&url, form).await?;
        Self::parse(response).await
    }

    async fn send(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> Result<Response, ApiError> {
        let mut request = ApiRequest::new(method, self.config.endpoint(path));
        request.body = body;
        self.pipeline.execute(request).await
    }

    fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>, ApiError> {
        serde_json::to_vec(body).map_err(|e| ApiError::InvalidRequest(format!("Failed to serialize body: {e}")))
    }

    /// Parse a JSON body. An empty body parses as `null`, so `()` and
    /// `Option<T>` work for 204 responses.
    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let url = response.url().to_string();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to read response body from {}: {}", url, e)))?;
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            debug!(url = %url, error = %e, "Unparsable response body");
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }
}
