//! Server metadata discovery.
//!
//! The PDS names its authorization server in
//! `/.well-known/oauth-protected-resource`; the authorization server
//! describes its endpoints in `/.well-known/oauth-authorization-server`.

use crate::{OAuthError, OAuthResult};
use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

/// Protected resource metadata of a PDS
#[derive(Debug, Clone, Deserialize)]
pub struct ProtectedResourceMetadata {
    #[serde(default)]
    pub resource: Option<String>,

    #[serde(default)]
    pub authorization_servers: Vec<String>,
}

/// Authorization server metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,

    #[serde(default)]
    pub pushed_authorization_request_endpoint: Option<String>,

    #[serde(default)]
    pub revocation_endpoint: Option<String>,

    #[serde(default)]
    pub dpop_signing_alg_values_supported: Vec<String>,

    #[serde(default)]
    pub scopes_supported: Vec<String>,
}

impl AuthorizationServerMetadata {
    /// Check the metadata is usable for an AT Protocol client
    pub fn validate(&self, expected_issuer: &str) -> OAuthResult<()> {
        if trim_slash(&self.issuer) != trim_slash(expected_issuer) {
            return Err(OAuthError::Metadata(format!(
                "issuer mismatch: expected '{}', got '{}'",
                expected_issuer, self.issuer
            )));
        }
        if self.pushed_authorization_request_endpoint.is_none() {
            return Err(OAuthError::Metadata(
                "pushed authorization requests are not supported".to_string(),
            ));
        }
        if !self.dpop_signing_alg_values_supported.is_empty()
            && !self
                .dpop_signing_alg_values_supported
                .iter()
                .any(|alg| alg == "ES256")
        {
            return Err(OAuthError::Metadata("ES256 DPoP is not supported".to_string()));
        }
        Ok(())
    }

    /// PAR endpoint as URL
    pub fn par_endpoint(&self) -> OAuthResult<Url> {
        let endpoint = self
            .pushed_authorization_request_endpoint
            .as_deref()
            .ok_or_else(|| OAuthError::Metadata("missing PAR endpoint".to_string()))?;
        Ok(Url::parse(endpoint)?)
    }
}

fn trim_slash(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Fetches and validates server metadata
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    http: reqwest::Client,
}

impl MetadataResolver {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Authorization server (issuer URL) responsible for a PDS
    pub async fn authorization_server_for(&self, pds: &Url) -> OAuthResult<String> {
        let url = pds.join("/.well-known/oauth-protected-resource")?;
        debug!("Fetching protected resource metadata from {}", url);

        let metadata: ProtectedResourceMetadata = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        metadata
            .authorization_servers
            .into_iter()
            .next()
            .ok_or_else(|| {
                OAuthError::Metadata(format!("{} names no authorization server", pds))
            })
    }

    /// Metadata of an authorization server, checked against its issuer
    pub async fn authorization_server(
        &self,
        issuer: &str,
    ) -> OAuthResult<AuthorizationServerMetadata> {
        let url = Url::parse(issuer)?.join("/.well-known/oauth-authorization-server")?;
        debug!("Fetching authorization server metadata from {}", url);

        let metadata: AuthorizationServerMetadata = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        metadata.validate(issuer)?;
        Ok(metadata)
    }
}
