//! Session credentials and their lifecycle.
//!
//! This module provides:
//! - `TokenStore`: the only read/write path for the access/refresh pair
//!   (in memory, JSON file, or OS keychain)
//! - `TokenInspector`: fail-closed expiry checks on access tokens
//! - `RefreshCoordinator`: one refresh exchange in flight per session
//! - `SessionEscalation`: clears a dead session and sends the user to login
//!
//! Admin and customer sessions are kept apart end to end: each kind has its
//! own store, coordinator and login route.

pub mod escalation;
pub mod inspector;
pub mod keychain;
pub mod refresh;
pub mod session;
pub mod store;

pub use escalation::{Navigator, SessionEscalation};
pub use inspector::TokenInspector;
pub use keychain::KeyringTokenStore;
pub use refresh::RefreshCoordinator;
pub use session::{SessionKind, SessionState};
pub use store::{CredentialPair, FileTokenStore, MemoryTokenStore, TokenStore};

use std::sync::Arc;

use crate::config::{Config, TokenBackend};

/// Open the persistent store for `kind` using the backend named in `config`.
pub fn open_store(config: &Config, kind: SessionKind) -> anyhow::Result<Arc<dyn TokenStore>> {
    let store: Arc<dyn TokenStore> = match config.token_backend {
        TokenBackend::File => Arc::new(FileTokenStore::for_kind(config.cache_dir()?, kind)),
        TokenBackend::Keyring => Arc::new(KeyringTokenStore::new(kind)?),
    };
    Ok(store)
}
