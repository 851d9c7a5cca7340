//! Refresh-token exchange with a single in-flight request per session.
//!
//! Refresh tokens are single use, so concurrent callers that find the access
//! token stale must share one exchange. The first caller starts it; everyone
//! arriving before it settles awaits the same shared future and sees the same
//! outcome. The exchange runs as its own task and empties the slot once it
//! finishes, so it reaches an outcome even if every waiter is dropped.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::store::{CredentialPair, TokenStore};
use super::SessionKind;

/// Refresh endpoint, relative to the API base URL
pub const REFRESH_PATH: &str = "token/refresh/";

type PendingRefresh = Shared<BoxFuture<'static, bool>>;

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

struct Inner {
    client: Client,
    url: String,
    kind: SessionKind,
    store: Arc<dyn TokenStore>,
    in_flight: Mutex<Option<PendingRefresh>>,
}

/// Cheap to clone; clones share the in-flight slot.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(client: Client, url: String, kind: SessionKind, store: Arc<dyn TokenStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                url,
                kind,
                store,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Returns `true` once the store holds the new pair. On any failure the
    /// store is cleared and `false` is returned.
    pub async fn refresh(&self) -> bool {
        let pending = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(existing) => {
                    debug!(kind = %self.inner.kind, "Joining in-flight token refresh");
                    existing.clone()
                }
                None => {
                    let inner = self.inner.clone();
                    let task = tokio::spawn(async move {
                        let outcome = inner.exchange().await;
                        inner.in_flight.lock().take();
                        outcome
                    });
                    // A panicked exchange counts as a failed one.
                    let exchange = task.map(|joined| joined.unwrap_or(false)).boxed().shared();
                    *slot = Some(exchange.clone());
                    exchange
                }
            }
        };
        pending.await
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }
}

impl Inner {
    async fn exchange(&self) -> bool {
        let Some(refresh_token) = self.store.refresh_token() else {
            debug!(kind = %self.kind, "No refresh token, skipping exchange");
            self.discard();
            return false;
        };

        info!(kind = %self.kind, "Refreshing access token");
        let response = match self
            .client
            .post(&self.url)
            .json(&RefreshRequest { refresh: &refresh_token })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "Token refresh request failed");
                self.discard();
                return false;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(kind = %self.kind, %status, "Token refresh rejected");
            self.discard();
            return false;
        }

        let body: RefreshResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "Malformed token refresh response");
                self.discard();
                return false;
            }
        };
        if body.access.is_empty() {
            warn!(kind = %self.kind, "Token refresh response has an empty access token");
            self.discard();
            return false;
        }

        // Servers that do not rotate refresh tokens omit the field.
        let refresh = body
            .refresh
            .filter(|r| !r.is_empty())
            .unwrap_or(refresh_token);
        match self.store.set(CredentialPair::new(body.access, refresh)) {
            Ok(()) => {
                info!(kind = %self.kind, "Access token refreshed");
                true
            }
            Err(e) => {
                warn!(kind = %self.kind, error = %e, "Failed to persist refreshed tokens");
                self.discard();
                false
            }
        }
    }

    fn discard(&self) {
        if let Err(e) = self.store.clear() {
            warn!(kind = %self.kind, error = %e, "Failed to clear credentials");
        }
    }
}
