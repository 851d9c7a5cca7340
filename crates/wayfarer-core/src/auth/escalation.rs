//! Terminal handling of unrecoverable authentication failure.

use std::sync::Arc;

use tracing::{error, warn};

use super::store::TokenStore;
use super::SessionKind;
use crate::api::ApiError;
use crate::config::Config;

/// Sends the user to a login surface. The CLI prints the route; a browser
/// shell would change location. Closures work directly.
pub trait Navigator: Send + Sync {
    fn navigate(&self, kind: SessionKind, route: &str);
}

impl<F> Navigator for F
where
    F: Fn(SessionKind, &str) + Send + Sync,
{
    fn navigate(&self, kind: SessionKind, route: &str) {
        self(kind, route)
    }
}

#[derive(Clone)]
pub struct SessionEscalation {
    navigator: Arc<dyn Navigator>,
    admin_route: String,
    customer_route: String,
}

impl SessionEscalation {
    pub fn new(config: &Config, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            admin_route: config.admin_login_route.clone(),
            customer_route: config.customer_login_route.clone(),
        }
    }

    pub fn route(&self, kind: SessionKind) -> &str {
        match kind {
            SessionKind::Admin => &self.admin_route,
            SessionKind::Customer => &self.customer_route,
        }
    }

    /// Clear `store` and navigate to `kind`'s login route.
    ///
    /// Returns the error the failing call must surface. Safe to call on an
    /// already empty store.
    pub fn escalate(&self, kind: SessionKind, store: &dyn TokenStore) -> ApiError {
        if let Err(e) = store.clear() {
            error!(%kind, error = %e, "Failed to clear credentials during escalation");
        }
        let route = self.route(kind);
        warn!(%kind, route, "Authentication required, escalating to login");
        self.navigator.navigate(kind, route);
        ApiError::AuthenticationRequired {
            kind,
            login_route: route.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialPair, MemoryTokenStore};
    use crate::test_support::RecordingNavigator;

    #[test]
    fn test_escalate_clears_and_targets_matching_surface() {
        let navigator = Arc::new(RecordingNavigator::default());
        let escalation = SessionEscalation::new(&Config::default(), navigator.clone());

        let admin_store = MemoryTokenStore::with_pair(CredentialPair::new("a", "r"));
        let err = escalation.escalate(SessionKind::Admin, &admin_store);
        assert!(admin_store.get().is_none());
        assert!(matches!(
            err,
            ApiError::AuthenticationRequired { kind: SessionKind::Admin, ref login_route } if login_route == "/ttm/login"
        ));

        let customer_store = MemoryTokenStore::with_pair(CredentialPair::new("a", "r"));
        escalation.escalate(SessionKind::Customer, &customer_store);
        assert!(customer_store.get().is_none());

        assert_eq!(
            navigator.visits(),
            vec![
                (SessionKind::Admin, "/ttm/login".to_string()),
                (SessionKind::Customer, "/customer/login".to_string()),
            ]
        );
    }

    #[test]
    fn test_escalate_empty_store_still_navigates() {
        let navigator = Arc::new(RecordingNavigator::default());
        let escalation = SessionEscalation::new(&Config::default(), navigator.clone());
        let store = MemoryTokenStore::new();

        escalation.escalate(SessionKind::Customer, &store);
        escalation.escalate(SessionKind::Customer, &store);

        assert!(store.get().is_none());
        assert_eq!(navigator.visits().len(), 2);
    }

    #[test]
    fn test_closure_navigator() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let navigator: Arc<dyn Navigator> = Arc::new(move |_kind: SessionKind, route: &str| {
            sink.lock().push(route.to_string());
        });
        let escalation = SessionEscalation::new(&Config::default(), navigator);
        escalation.escalate(SessionKind::Admin, &MemoryTokenStore::new());
        assert_eq!(*seen.lock(), vec!["/ttm/login".to_string()]);
    }
}
