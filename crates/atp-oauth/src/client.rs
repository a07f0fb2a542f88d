//! AT Protocol OAuth client
//!
//! Implements [`AuthorizationService`] for a public (loopback or hosted
//! metadata) client:
//!
//! 1. resolve the account: handle → DID → DID document → PDS
//! 2. discover the authorization server of the PDS and its metadata
//! 3. push the authorization request (PKCE S256, DPoP) and hand out the
//!    authorization URL
//! 4. on redirect, exchange the code and verify issuer and subject
//! 5. persist the session; restore, refresh and revoke it later

use crate::agent::OAuthAgent;
use crate::dpop::DpopKey;
use crate::metadata::MetadataResolver;
use crate::pkce::{random_token, Pkce};
use crate::service::{
    AuthSession, AuthorizationService, CallbackParams, IdentityInfo, ResolvedIdentity,
};
use crate::store::{OAuthStore, PendingAuthorization, StoredSession};
use crate::token::AuthServerClient;
use crate::{OAuthError, OAuthResult};
use async_trait::async_trait;
use atp_client::{normalize_handle, Did, IdentityResolver};
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;
use url::Url;

/// Client registration of this application
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    /// `client_id` (a loopback id or the URL of the client metadata)
    pub client_id: String,
    /// Redirect URI registered for the client
    pub redirect_uri: String,
}

/// OAuth client backed by a file store
pub struct OAuthClient {
    config: OAuthClientConfig,
    identity: Arc<dyn IdentityResolver>,
    metadata: MetadataResolver,
    server: AuthServerClient,
    store: OAuthStore,
}

impl OAuthClient {
    pub fn new(
        config: OAuthClientConfig,
        identity: Arc<dyn IdentityResolver>,
        store: OAuthStore,
    ) -> OAuthResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("repo-kit/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            server: AuthServerClient::new(http.clone(), config.client_id.clone()),
            metadata: MetadataResolver::new(http),
            config,
            identity,
            store,
        })
    }

    fn agent_session(&self, stored: StoredSession) -> OAuthResult<(AuthSession, Arc<OAuthAgent>)> {
        let did = stored.tokens.sub.clone();
        let agent = Arc::new(OAuthAgent::new(
            self.server.clone(),
            self.store.clone(),
            stored,
        )?);
        let session = AuthSession::new(did, agent.pds().clone(), agent.clone());
        Ok((session, agent))
    }

    /// Check that `pds` is served by the authorization server `issuer`
    async fn verify_issuer_for(&self, pds: &Url, issuer: &str) -> OAuthResult<()> {
        let expected = self.metadata.authorization_server_for(pds).await?;
        if expected.trim_end_matches('/') != issuer.trim_end_matches('/') {
            return Err(OAuthError::Token(format!(
                "issuer '{}' is not the authorization server of {}",
                issuer, pds
            )));
        }
        Ok(())
    }

    async fn resolve_pds(&self, did: &Did) -> OAuthResult<(Option<String>, Url)> {
        let document = self
            .identity
            .resolve_did_document(did)
            .await
            .map_err(|source| OAuthError::Identity {
                input: did.to_string(),
                source,
            })?;
        let pds = document.pds_endpoint().ok_or_else(|| OAuthError::Identity {
            input: did.to_string(),
            source: anyhow::anyhow!("DID document has no PDS endpoint"),
        })?;
        Ok((document.handle().map(str::to_string), pds))
    }
}

#[async_trait]
impl AuthorizationService for OAuthClient {
    async fn resolve_from_identity(&self, input: &str) -> OAuthResult<ResolvedIdentity> {
        let input = input.trim();
        let did = match input.parse::<Did>() {
            Ok(did) => did,
            Err(_) => self
                .identity
                .resolve_handle(input)
                .await
                .map_err(|source| OAuthError::Identity {
                    input: input.to_string(),
                    source,
                })?,
        };

        let (handle, pds) = self.resolve_pds(&did).await?;
        if !input.starts_with("did:") && handle.as_deref() != Some(normalize_handle(input).as_str()) {
            warn!(
                "Handle '{}' resolves to {} but its document claims {:?}",
                input, did, handle
            );
        }

        let issuer = self.metadata.authorization_server_for(&pds).await?;
        let server = self.metadata.authorization_server(&issuer).await?;
        debug!("{} is served by {} (issuer {})", did, pds, server.issuer);

        Ok(ResolvedIdentity {
            identity: Some(IdentityInfo { did, handle, pds }),
            server,
        })
    }

    async fn create_authorization_url(
        &self,
        resolved: &ResolvedIdentity,
        scope: &str,
    ) -> OAuthResult<Url> {
        let pkce = Pkce::generate();
        let state = random_token(16);
        let dpop_key = DpopKey::generate();

        let mut params = vec![
            ("response_type", "code".to_string()),
            ("code_challenge", pkce.challenge.clone()),
            ("code_challenge_method", pkce.method().to_string()),
            ("state", state.clone()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("scope", scope.to_string()),
            ("response_mode", "query".to_string()),
        ];
        if let Some(identity) = &resolved.identity {
            let hint = identity
                .handle
                .clone()
                .unwrap_or_else(|| identity.did.to_string());
            params.push(("login_hint", hint));
        }

        let request_uri = self
            .server
            .push_authorization(&resolved.server, &dpop_key, params)
            .await?;

        self.store.save_state(&PendingAuthorization {
            state,
            pkce_verifier: pkce.verifier,
            dpop_key,
            server: resolved.server.clone(),
            redirect_uri: self.config.redirect_uri.clone(),
            expected_did: resolved.identity.as_ref().map(|i| i.did.clone()),
            created_at: Utc::now(),
        })?;

        let mut url = Url::parse(&resolved.server.authorization_endpoint)?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("request_uri", &request_uri);
        Ok(url)
    }

    async fn finalize_authorization(&self, params: &CallbackParams) -> OAuthResult<AuthSession> {
        let state = params
            .state
            .as_deref()
            .ok_or_else(|| OAuthError::Callback("missing state".to_string()))?;
        let pending = self
            .store
            .take_state(state)?
            .ok_or(OAuthError::UnknownState)?;

        if let Some(error) = params.error() {
            return Err(error);
        }
        if let Some(iss) = &params.iss {
            if iss.trim_end_matches('/') != pending.server.issuer.trim_end_matches('/') {
                return Err(OAuthError::Callback(format!(
                    "issuer mismatch: expected '{}', got '{}'",
                    pending.server.issuer, iss
                )));
            }
        }
        let code = params
            .code
            .as_deref()
            .ok_or_else(|| OAuthError::Callback("missing code".to_string()))?;

        let response = self
            .server
            .exchange_code(
                &pending.server,
                &pending.dpop_key,
                code,
                &pending.pkce_verifier,
                &pending.redirect_uri,
            )
            .await?;

        let sub = response.subject()?;
        if let Some(expected) = &pending.expected_did {
            if *expected != sub {
                return Err(OAuthError::Token(format!(
                    "signed in as {} instead of {}",
                    sub, expected
                )));
            }
        }

        let (_, pds) = self.resolve_pds(&sub).await?;
        self.verify_issuer_for(&pds, &pending.server.issuer).await?;

        let tokens = response.into_token_set(&sub, &pending.server.issuer, pds.as_str())?;
        let stored = StoredSession {
            tokens,
            dpop_key: pending.dpop_key,
            server: pending.server,
            updated_at: Utc::now(),
        };
        self.store.save_session(&stored)?;
        info!("Authorized {}", sub);

        let (session, _) = self.agent_session(stored)?;
        Ok(session)
    }

    async fn get_session(&self, did: &Did) -> OAuthResult<AuthSession> {
        let stored = self
            .store
            .load_session(did)?
            .ok_or_else(|| OAuthError::NoSession(did.clone()))?;

        let (session, agent) = self.agent_session(stored)?;
        if let Err(e) = agent.refresh_if_expiring().await {
            if e.is_session_invalid() {
                warn!("Stored session of {} is no longer valid", did);
                self.store.delete_session(did)?;
            }
            return Err(e);
        }

        info!("Restored session of {}", did);
        Ok(session)
    }

    async fn sign_out(&self, session: &AuthSession) -> OAuthResult<()> {
        if let Some(stored) = self.store.load_session(&session.did)? {
            let token = stored
                .tokens
                .refresh_token
                .as_deref()
                .unwrap_or(&stored.tokens.access_token);
            if let Err(e) = self
                .server
                .revoke(&stored.server, &stored.dpop_key, token)
                .await
            {
                warn!("Failed to revoke tokens of {}: {}", session.did, e);
            }
        }

        self.store.delete_session(&session.did)?;
        info!("Signed out {}", session.did);
        Ok(())
    }
}
