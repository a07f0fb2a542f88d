//! Persistence of OAuth sessions and pending authorizations
//!
//! Layout below the store root:
//!
//! - `sessions/<did>.json` - token set and DPoP key of a signed-in DID
//! - `states/<state>.json` - pending authorization between the PAR request
//!   and the callback
//!
//! Files are pretty-printed JSON; `:` in DIDs is replaced by `_` in file
//! names.

use crate::dpop::DpopKey;
use crate::metadata::AuthorizationServerMetadata;
use crate::OAuthResult;
use atp_client::Did;
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Pending authorizations older than this are discarded
pub const STATE_MAX_AGE_MINUTES: i64 = 60;

/// Tokens issued for a session
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub scope: Option<String>,

    /// Subject (repository owner)
    pub sub: Did,

    /// Issuer that granted the tokens
    pub iss: String,

    /// PDS the tokens are meant for
    pub aud: String,
}

impl TokenSet {
    /// Whether the access token expires within `margin`
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - margin <= Utc::now())
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("sub", &self.sub)
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// A persisted session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub tokens: TokenSet,
    pub dpop_key: DpopKey,
    pub server: AuthorizationServerMetadata,
    pub updated_at: DateTime<Utc>,
}

/// State kept between building the authorization URL and the callback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    pub pkce_verifier: String,
    pub dpop_key: DpopKey,
    pub server: AuthorizationServerMetadata,
    pub redirect_uri: String,

    /// DID the login was started for, if it was started from an identity
    #[serde(default)]
    pub expected_did: Option<Did>,

    pub created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    pub fn is_expired(&self) -> bool {
        self.created_at + Duration::minutes(STATE_MAX_AGE_MINUTES) < Utc::now()
    }
}

/// File-backed store for sessions and pending authorizations
#[derive(Debug, Clone)]
pub struct OAuthStore {
    root: PathBuf,
}

impl OAuthStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn session_path(&self, did: &Did) -> PathBuf {
        self.root
            .join("sessions")
            .join(format!("{}.json", did.as_str().replace(':', "_")))
    }

    fn state_path(&self, state: &str) -> Option<PathBuf> {
        let valid = !state.is_empty()
            && state
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.root.join("states").join(format!("{}.json", state)))
    }

    /// Load the session of a DID
    pub fn load_session(&self, did: &Did) -> OAuthResult<Option<StoredSession>> {
        read_json(&self.session_path(did))
    }

    /// Save (or replace) a session
    pub fn save_session(&self, session: &StoredSession) -> OAuthResult<()> {
        write_json(&self.session_path(&session.tokens.sub), session)?;
        debug!("Saved OAuth session for {}", session.tokens.sub);
        Ok(())
    }

    /// Delete the session of a DID (no-op if absent)
    pub fn delete_session(&self, did: &Did) -> OAuthResult<()> {
        remove_if_exists(&self.session_path(did))
    }

    /// Save a pending authorization under its state
    pub fn save_state(&self, pending: &PendingAuthorization) -> OAuthResult<()> {
        self.prune_states();
        match self.state_path(&pending.state) {
            Some(path) => write_json(&path, pending),
            None => Err(crate::OAuthError::Callback(
                "state contains invalid characters".to_string(),
            )),
        }
    }

    /// Remove and return the pending authorization for a state
    ///
    /// Expired entries are deleted and reported as absent.
    pub fn take_state(&self, state: &str) -> OAuthResult<Option<PendingAuthorization>> {
        let Some(path) = self.state_path(state) else {
            return Ok(None);
        };
        let pending: Option<PendingAuthorization> = read_json(&path)?;
        remove_if_exists(&path)?;
        Ok(pending.filter(|pending| !pending.is_expired()))
    }

    /// Delete expired pending authorizations
    fn prune_states(&self) {
        let Ok(entries) = fs::read_dir(self.root.join("states")) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let expired = read_json::<PendingAuthorization>(&path)
                .map(|pending| pending.map_or(true, |pending| pending.is_expired()))
                .unwrap_or(true);
            if expired {
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to remove stale state {:?}: {}", path, e);
                }
            }
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> OAuthResult<Option<T>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> OAuthResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> OAuthResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
