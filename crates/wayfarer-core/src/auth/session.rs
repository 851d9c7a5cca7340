use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::inspector::TokenInspector;
use super::store::CredentialPair;

/// Which login surface issued a credential pair.
///
/// The admin console and the customer portal hand out independent pairs, so a
/// failing session must always be sent back to its own login route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Admin,
    Customer,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Admin => "admin",
            SessionKind::Customer => "customer",
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived view of a session. Nothing stores this; it is computed from the
/// token store and the refresh coordinator on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    /// Pair present, access token expired or inside the refresh buffer.
    Stale,
    Refreshing,
}

impl SessionState {
    pub fn derive(
        pair: Option<&CredentialPair>,
        refreshing: bool,
        buffer: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        if refreshing {
            return SessionState::Refreshing;
        }
        match pair {
            None => SessionState::Unauthenticated,
            Some(p) if TokenInspector::is_fresh_at(&p.access, buffer, now) => {
                SessionState::Authenticated
            }
            Some(_) => SessionState::Stale,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Unauthenticated => "signed out",
            SessionState::Authenticated => "signed in",
            SessionState::Stale => "token expiring",
            SessionState::Refreshing => "refreshing",
        }
    }
}
