//! Persisted access/refresh token pair.
//!
//! Every read and write of credentials goes through [`TokenStore`]. A store
//! holds either a complete [`CredentialPair`] or nothing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::SessionKind;

/// Token file name inside the per-kind cache directory
const TOKEN_FILE: &str = "tokens.json";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.access.is_empty() && !self.refresh.is_empty()
    }
}

// Tokens stay out of logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

pub trait TokenStore: Send + Sync {
    /// Current pair, or `None` when the session is unauthenticated.
    fn get(&self) -> Option<CredentialPair>;

    /// Replace the stored pair.
    fn set(&self, pair: CredentialPair) -> Result<()>;

    /// Remove both tokens. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;

    fn access_token(&self) -> Option<String> {
        self.get().map(|p| p.access)
    }

    fn refresh_token(&self) -> Option<String> {
        self.get().map(|p| p.refresh)
    }
}

/// In-process store. Used for tests and by embedders that keep the session in memory.
#[derive(Default)]
pub struct MemoryTokenStore {
    pair: RwLock<Option<CredentialPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<CredentialPair> {
        self.pair.read().clone()
    }

    fn set(&self, pair: CredentialPair) -> Result<()> {
        if !pair.is_complete() {
            anyhow::bail!("Refusing to store an incomplete credential pair");
        }
        *self.pair.write() = Some(pair);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.pair.write() = None;
        Ok(())
    }
}

/// JSON file holding the two keys `access` and `refresh`.
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store for one session kind under the shared cache directory.
    pub fn for_kind(cache_dir: PathBuf, kind: SessionKind) -> Self {
        Self::new(cache_dir.join(kind.as_str()))
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    fn read(&self) -> Result<Option<CredentialPair>> {
        let path = self.token_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read token file")?;
        let pair: CredentialPair =
            serde_json::from_str(&contents).context("Failed to parse token file")?;
        Ok(pair.is_complete().then_some(pair))
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<CredentialPair> {
        match self.read() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Unreadable token file, treating session as absent");
                None
            }
        }
    }

    fn set(&self, pair: CredentialPair) -> Result<()> {
        if !pair.is_complete() {
            anyhow::bail!("Refusing to store an incomplete credential pair");
        }
        std::fs::create_dir_all(&self.dir).context("Failed to create token directory")?;

        // Write then rename so readers never see half a pair.
        let path = self.token_path();
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(&pair)?;
        std::fs::write(&tmp, contents).context("Failed to write token file")?;
        std::fs::rename(&tmp, &path).context("Failed to replace token file")?;
        debug!(path = %path.display(), "Credential pair saved");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.token_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove token file")?;
            debug!(path = %path.display(), "Credential pair cleared");
        }
        Ok(())
    }
}
