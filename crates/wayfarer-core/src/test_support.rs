//! Helpers shared by unit tests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use parking_lot::Mutex;
use wiremock::MockServer;

use crate::auth::{Navigator, SessionKind};
use crate::config::Config;

/// Unsigned token with the given JSON payload.
pub fn token_with_payload(payload: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}

pub fn token_expiring_in(secs: i64) -> String {
    token_with_payload(&serde_json::json!({
        "token_type": "access",
        "exp": Utc::now().timestamp() + secs,
        "user_id": 1,
    }))
}

/// Config pointed at a mock server, with a short retry delay.
pub fn test_config(server: &MockServer) -> Config {
    Config {
        api_base_url: format!("{}/api/", server.uri()),
        retry_delay_ms: 10,
        ..Config::default()
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<(SessionKind, String)>>,
}

impl RecordingNavigator {
    pub fn visits(&self) -> Vec<(SessionKind, String)> {
        self.visits.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, kind: SessionKind, route: &str) {
        self.visits.lock().push((kind, route.to_string()));
    }
}
