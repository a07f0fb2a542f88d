//! Authenticated XRPC transport for an OAuth session.

use crate::dpop::send_with_dpop;
use crate::store::{OAuthStore, StoredSession};
use crate::token::AuthServerClient;
use crate::{OAuthError, OAuthResult, REFRESH_MARGIN_SECS};
use async_trait::async_trait;
use atp_client::{XrpcHandler, XrpcMethod, XrpcRequest, XrpcResponse};
use chrono::{Duration, Utc};
use log::{debug, info};
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use tokio::sync::Mutex;
use url::Url;

/// Sends XRPC requests to the PDS with DPoP-bound access tokens
///
/// Tokens are refreshed before they expire and once more when the PDS
/// reports an invalid token. Refreshed tokens are written back to the store.
pub struct OAuthAgent {
    server: AuthServerClient,
    store: OAuthStore,
    pds: Url,
    session: Mutex<StoredSession>,
}

impl OAuthAgent {
    pub fn new(
        server: AuthServerClient,
        store: OAuthStore,
        session: StoredSession,
    ) -> OAuthResult<Self> {
        let pds = Url::parse(&session.tokens.aud)?;
        Ok(Self {
            server,
            store,
            pds,
            session: Mutex::new(session),
        })
    }

    pub fn pds(&self) -> &Url {
        &self.pds
    }

    /// Refresh the tokens now
    pub async fn refresh(&self) -> OAuthResult<()> {
        let mut session = self.session.lock().await;
        self.refresh_locked(&mut session).await
    }

    /// Refresh if the access token expires within the refresh margin
    pub async fn refresh_if_expiring(&self) -> OAuthResult<()> {
        let mut session = self.session.lock().await;
        if session
            .tokens
            .expires_within(Duration::seconds(REFRESH_MARGIN_SECS))
        {
            self.refresh_locked(&mut session).await?;
        }
        Ok(())
    }

    async fn refresh_locked(&self, session: &mut StoredSession) -> OAuthResult<()> {
        let refresh_token = session
            .tokens
            .refresh_token
            .clone()
            .ok_or_else(|| OAuthError::Token("session has no refresh token".to_string()))?;

        let response = self
            .server
            .refresh(&session.server, &session.dpop_key, &refresh_token)
            .await?;
        let mut tokens =
            response.into_token_set(&session.tokens.sub, &session.tokens.iss, &session.tokens.aud)?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token);
        }

        session.tokens = tokens;
        session.updated_at = Utc::now();
        self.store.save_session(session)?;
        info!("Refreshed OAuth tokens for {}", session.tokens.sub);
        Ok(())
    }

    /// Access token to use for the next request
    async fn access_token(&self) -> OAuthResult<(String, crate::dpop::DpopKey)> {
        self.refresh_if_expiring().await?;
        let session = self.session.lock().await;
        Ok((session.tokens.access_token.clone(), session.dpop_key.clone()))
    }

    async fn send_once(&self, request: &XrpcRequest) -> OAuthResult<crate::dpop::RawResponse> {
        let (token, key) = self.access_token().await?;
        let url = request.url(&self.pds).map_err(|e| {
            OAuthError::Metadata(format!("invalid request URL for {}: {}", request.nsid, e))
        })?;
        debug!("XRPC {} {}", request.method.as_str(), url);

        let http = self.server.http();
        send_with_dpop(
            &key,
            self.server.nonces(),
            request.method.as_str(),
            &url,
            Some(&token),
            |proof| {
                let builder = match request.method {
                    XrpcMethod::Get => http.get(url.clone()),
                    XrpcMethod::Post => http.post(url.clone()),
                };
                let builder = builder
                    .header(AUTHORIZATION, format!("DPoP {}", token))
                    .header("DPoP", proof);
                match &request.body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            },
        )
        .await
    }
}

fn is_invalid_token(response: &crate::dpop::RawResponse) -> bool {
    response.status == 401
        && response
            .headers
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("invalid_token"))
}

#[async_trait]
impl XrpcHandler for OAuthAgent {
    async fn send(&self, request: XrpcRequest) -> anyhow::Result<XrpcResponse> {
        let mut response = self.send_once(&request).await?;

        if is_invalid_token(&response) {
            debug!("Access token rejected, refreshing");
            self.refresh().await?;
            response = self.send_once(&request).await?;
        }

        Ok(XrpcResponse {
            status: response.status,
            body: response.body,
        })
    }
}

impl std::fmt::Debug for OAuthAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthAgent")
            .field("pds", &self.pds.as_str())
            .finish_non_exhaustive()
    }
}
