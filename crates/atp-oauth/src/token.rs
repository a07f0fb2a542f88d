//! Requests to the authorization server endpoints
//!
//! PAR, token (code exchange and refresh) and revocation. All of them are
//! form posts carrying a DPoP proof.

use crate::dpop::{send_with_dpop, DpopKey, NonceStore, RawResponse};
use crate::metadata::AuthorizationServerMetadata;
use crate::store::TokenSet;
use crate::{OAuthError, OAuthResult};
use atp_client::Did;
use chrono::{Duration, Utc};
use log::{debug, warn};
use serde::Deserialize;
use std::sync::Arc;
use url::Url;

/// Token endpoint response
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,

    #[serde(default)]
    pub expires_in: Option<i64>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default)]
    pub sub: Option<String>,
}

impl TokenResponse {
    /// Subject DID of the response
    pub fn subject(&self) -> OAuthResult<Did> {
        let sub = self
            .sub
            .as_deref()
            .ok_or_else(|| OAuthError::Token("missing sub".to_string()))?;
        sub.parse()
            .map_err(|_| OAuthError::Token(format!("sub '{}' is not a DID", sub)))
    }

    /// Check the response and turn it into a token set
    ///
    /// `expected_sub` is the DID the tokens must belong to.
    pub fn into_token_set(self, expected_sub: &Did, iss: &str, aud: &str) -> OAuthResult<TokenSet> {
        if !self.token_type.eq_ignore_ascii_case("DPoP") {
            return Err(OAuthError::Token(format!(
                "unexpected token type '{}'",
                self.token_type
            )));
        }
        let sub = self.subject()?;
        if sub != *expected_sub {
            return Err(OAuthError::Token(format!(
                "sub '{}' does not match '{}'",
                sub, expected_sub
            )));
        }
        if let Some(scope) = &self.scope {
            if !scope.split_whitespace().any(|s| s == "atproto") {
                return Err(OAuthError::Token(format!(
                    "granted scope '{}' lacks atproto",
                    scope
                )));
            }
        }

        Ok(TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_in
                .map(|seconds| Utc::now() + Duration::seconds(seconds)),
            scope: self.scope,
            sub,
            iss: iss.to_string(),
            aud: aud.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ParResponse {
    request_uri: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for the endpoints of an authorization server
#[derive(Debug, Clone)]
pub struct AuthServerClient {
    http: reqwest::Client,
    client_id: String,
    nonces: Arc<NonceStore>,
}

impl AuthServerClient {
    pub fn new(http: reqwest::Client, client_id: impl Into<String>) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            nonces: Arc::new(NonceStore::default()),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn nonces(&self) -> &NonceStore {
        &self.nonces
    }

    async fn post_form(
        &self,
        url: &Url,
        key: &DpopKey,
        mut form: Vec<(&str, String)>,
    ) -> OAuthResult<RawResponse> {
        form.push(("client_id", self.client_id.clone()));
        send_with_dpop(key, &self.nonces, "POST", url, None, |proof| {
            self.http
                .post(url.clone())
                .header("DPoP", proof)
                .form(&form)
        })
        .await
    }

    /// Push the authorization request, returning its `request_uri`
    pub async fn push_authorization(
        &self,
        server: &AuthorizationServerMetadata,
        key: &DpopKey,
        params: Vec<(&str, String)>,
    ) -> OAuthResult<String> {
        let url = server.par_endpoint()?;
        debug!("Pushing authorization request to {}", url);

        let response = self.post_form(&url, key, params).await?;
        let par: ParResponse = parse_success(&response)?;
        Ok(par.request_uri)
    }

    /// Exchange an authorization code
    pub async fn exchange_code(
        &self,
        server: &AuthorizationServerMetadata,
        key: &DpopKey,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> OAuthResult<TokenResponse> {
        let url = Url::parse(&server.token_endpoint)?;
        debug!("Exchanging authorization code at {}", url);

        let form = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("code_verifier", verifier.to_string()),
        ];
        let response = self.post_form(&url, key, form).await?;
        parse_success(&response)
    }

    /// Refresh the tokens of a session
    pub async fn refresh(
        &self,
        server: &AuthorizationServerMetadata,
        key: &DpopKey,
        refresh_token: &str,
    ) -> OAuthResult<TokenResponse> {
        let url = Url::parse(&server.token_endpoint)?;
        debug!("Refreshing tokens at {}", url);

        let form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
        ];
        let response = self.post_form(&url, key, form).await?;
        parse_success(&response)
    }

    /// Revoke a token; servers without a revocation endpoint are skipped
    pub async fn revoke(
        &self,
        server: &AuthorizationServerMetadata,
        key: &DpopKey,
        token: &str,
    ) -> OAuthResult<()> {
        let Some(endpoint) = server.revocation_endpoint.as_deref() else {
            debug!("{} has no revocation endpoint", server.issuer);
            return Ok(());
        };
        let url = Url::parse(endpoint)?;

        let response = self
            .post_form(&url, key, vec![("token", token.to_string())])
            .await?;
        if !response.is_success() {
            warn!("Token revocation returned status {}", response.status);
        }
        Ok(())
    }
}

/// Decode a successful JSON response or the server's error
fn parse_success<T: serde::de::DeserializeOwned>(response: &RawResponse) -> OAuthResult<T> {
    if response.is_success() {
        return Ok(serde_json::from_slice(&response.body)?);
    }

    match serde_json::from_slice::<ErrorResponse>(&response.body) {
        Ok(error) => Err(OAuthError::Server {
            error: error.error,
            description: error.error_description,
        }),
        Err(_) => Err(OAuthError::Server {
            error: format!("http_{}", response.status),
            description: None,
        }),
    }
}
