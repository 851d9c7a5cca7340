//! OS keychain token store.
//!
//! Each session kind gets its own service (`wayfarer-admin`,
//! `wayfarer-customer`) with one entry per token. The entries are opened once
//! and kept, since some credential backends only share state through the same
//! `Entry`.

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::warn;

use super::store::{CredentialPair, TokenStore};
use super::SessionKind;

const ACCESS_KEY: &str = "access";
const REFRESH_KEY: &str = "refresh";

/// Credential pair kept in the OS keychain, one service per session kind.
pub struct KeyringTokenStore {
    service: String,
    access: Entry,
    refresh: Entry,
}

impl KeyringTokenStore {
    pub fn new(kind: SessionKind) -> Result<Self> {
        let service = format!("wayfarer-{}", kind.as_str());
        let access = Entry::new(&service, ACCESS_KEY).context("Failed to create keyring entry")?;
        let refresh = Entry::new(&service, REFRESH_KEY).context("Failed to create keyring entry")?;
        Ok(Self {
            service,
            access,
            refresh,
        })
    }

    fn read(entry: &Entry) -> Option<String> {
        entry.get_password().ok().filter(|v| !v.is_empty())
    }

    fn delete(entry: &Entry) -> Result<()> {
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self) -> Option<CredentialPair> {
        match (Self::read(&self.access), Self::read(&self.refresh)) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            (None, None) => None,
            _ => {
                warn!(service = %self.service, "Keychain holds half a credential pair, clearing");
                if let Err(e) = self.clear() {
                    warn!(service = %self.service, error = %e, "Failed to clear credentials");
                }
                None
            }
        }
    }

    fn set(&self, pair: CredentialPair) -> Result<()> {
        if pair.access.is_empty() || pair.refresh.is_empty() {
            anyhow::bail!("Refusing to store an incomplete credential pair");
        }
        self.access
            .set_password(&pair.access)
            .context("Failed to store access token in keychain")?;
        if let Err(e) = self.refresh.set_password(&pair.refresh) {
            if let Err(cleanup) = Self::delete(&self.access) {
                warn!(service = %self.service, error = %cleanup, "Failed to roll back access token");
            }
            return Err(e).context("Failed to store refresh token in keychain");
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let access = Self::delete(&self.access);
        let refresh = Self::delete(&self.refresh);
        access.and(refresh)
    }
}
