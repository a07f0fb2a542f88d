//! Authorization service abstraction
//!
//! The application only talks to [`AuthorizationService`]; `OAuthClient` is
//! the real implementation and tests substitute their own.

use crate::metadata::AuthorizationServerMetadata;
use crate::{OAuthError, OAuthResult};
use async_trait::async_trait;
use atp_client::{Did, XrpcHandler};
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// Identity of the account a login was started for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityInfo {
    pub did: Did,
    pub handle: Option<String>,
    pub pds: Url,
}

/// Result of resolving a handle (or DID) to its authorization server
#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    /// Account identity; absent when login starts from a server URL
    pub identity: Option<IdentityInfo>,

    /// Metadata of the authorization server
    pub server: AuthorizationServerMetadata,
}

/// An authenticated session
///
/// `handler` sends XRPC requests to the session's PDS with the session's
/// credentials.
#[derive(Clone)]
pub struct AuthSession {
    pub did: Did,
    pub pds: Url,
    pub handler: Arc<dyn XrpcHandler>,
}

impl AuthSession {
    pub fn new(did: Did, pds: Url, handler: Arc<dyn XrpcHandler>) -> Self {
        Self { did, pds, handler }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("did", &self.did)
            .field("pds", &self.pds.as_str())
            .finish_non_exhaustive()
    }
}

/// Parameters of the authorization redirect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub iss: Option<String>,
}

impl CallbackParams {
    /// Parse `application/x-www-form-urlencoded` parameters
    pub fn from_query(query: &str) -> Self {
        let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect();
        let get = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();

        Self {
            state: get("state"),
            code: get("code"),
            error: get("error"),
            error_description: get("error_description"),
            iss: get("iss"),
        }
    }

    /// Parse the parameters of a full redirect URL (query, else fragment)
    pub fn from_url(url: &Url) -> Self {
        let from_query = url.query().map(Self::from_query).unwrap_or_default();
        if from_query.is_authorization_response() {
            return from_query;
        }
        url.fragment().map(Self::from_query).unwrap_or(from_query)
    }

    /// A `state` plus either a `code` or an `error`
    pub fn is_authorization_response(&self) -> bool {
        self.state.is_some() && (self.code.is_some() || self.error.is_some())
    }

    /// The authorization error, if the redirect carries one
    pub fn error(&self) -> Option<OAuthError> {
        self.error.as_ref().map(|error| OAuthError::Denied {
            error: error.clone(),
            description: self.error_description.clone(),
        })
    }
}

/// Authorization service
///
/// Produces authorization URLs, completes the redirect handshake, and
/// restores or ends persisted sessions.
#[async_trait]
pub trait AuthorizationService: Send + Sync {
    /// Resolve a handle or DID to its identity and authorization server
    async fn resolve_from_identity(&self, input: &str) -> OAuthResult<ResolvedIdentity>;

    /// Build the URL the user has to visit to authorize `scope`
    async fn create_authorization_url(
        &self,
        resolved: &ResolvedIdentity,
        scope: &str,
    ) -> OAuthResult<Url>;

    /// Complete the handshake with the redirect parameters
    async fn finalize_authorization(&self, params: &CallbackParams) -> OAuthResult<AuthSession>;

    /// Restore the persisted session of a DID
    async fn get_session(&self, did: &Did) -> OAuthResult<AuthSession>;

    /// Revoke and forget a session
    async fn sign_out(&self, session: &AuthSession) -> OAuthResult<()>;
}
