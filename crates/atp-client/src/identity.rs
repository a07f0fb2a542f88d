//! Identity resolution
//!
//! Resolves handles to DIDs and DIDs to DID documents. The DID document
//! carries the verified handle (`alsoKnownAs`) and the PDS endpoint
//! (`#atproto_pds` service).

use crate::types::Did;
use crate::xrpc::{PublicHandler, XrpcError, XrpcHandler, XrpcRequest};
use anyhow::{bail, Context};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use url::Url;

/// A DID document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    pub id: Did,

    #[serde(default)]
    pub also_known_as: Vec<String>,

    #[serde(default)]
    pub service: Vec<DidService>,
}

/// A service entry of a DID document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidService {
    pub id: String,

    #[serde(rename = "type")]
    pub service_type: String,

    /// Usually a URL string, but the document format allows maps too
    pub service_endpoint: serde_json::Value,
}

impl DidDocument {
    /// Handle claimed by the document (first `at://` alias)
    pub fn handle(&self) -> Option<&str> {
        self.also_known_as
            .iter()
            .find_map(|alias| alias.strip_prefix("at://"))
            .filter(|handle| !handle.is_empty())
    }

    /// Endpoint of the `#atproto_pds` service
    pub fn pds_endpoint(&self) -> Option<Url> {
        self.service
            .iter()
            .find(|service| service.id.ends_with("#atproto_pds"))
            .and_then(|service| service.service_endpoint.as_str())
            .and_then(|endpoint| Url::parse(endpoint).ok())
    }
}

/// Location of the DID document for a DID
///
/// `did:plc` documents live in the PLC directory; `did:web` documents are
/// served by the host itself.
pub fn did_document_url(did: &Did, plc_directory: &Url) -> anyhow::Result<Url> {
    match did.method() {
        "plc" => Ok(plc_directory.join(&format!("/{}", did))?),
        "web" => {
            let id = did.as_str().trim_start_matches("did:web:");
            let mut segments = id.split(':');
            let host = segments
                .next()
                .filter(|host| !host.is_empty())
                .with_context(|| format!("Invalid did:web '{}'", did))?
                .replace("%3A", ":");
            let path: Vec<&str> = segments.collect();

            let url = if path.is_empty() {
                format!("https://{}/.well-known/did.json", host)
            } else {
                format!("https://{}/{}/did.json", host, path.join("/"))
            };
            Ok(Url::parse(&url)?)
        }
        other => bail!("Unsupported DID method '{}'", other),
    }
}

/// Normalize user input into a bare handle
pub fn normalize_handle(input: &str) -> String {
    input.trim().trim_start_matches('@').to_ascii_lowercase()
}

/// Identity resolver trait
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Fetch the DID document of a DID
    async fn resolve_did_document(&self, did: &Did) -> anyhow::Result<DidDocument>;

    /// Resolve a handle to a DID
    async fn resolve_handle(&self, handle: &str) -> anyhow::Result<Did>;
}

/// Identity resolver over HTTPS
#[derive(Debug, Clone)]
pub struct HttpIdentityResolver {
    http: reqwest::Client,
    plc_directory: Url,
    handle_resolver: Url,
}

#[derive(Deserialize)]
struct ResolveHandleOutput {
    did: Did,
}

impl HttpIdentityResolver {
    /// Create a resolver using the given PLC directory and handle resolver
    pub fn new(plc_directory: Url, handle_resolver: Url) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("repo-kit/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            plc_directory,
            handle_resolver,
        })
    }

    /// Try `https://<handle>/.well-known/atproto-did`
    async fn resolve_handle_well_known(&self, handle: &str) -> anyhow::Result<Did> {
        let url = format!("https://{}/.well-known/atproto-did", handle);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        let body = response.text().await?;
        body.trim().parse()
    }

    /// Ask the configured service via `com.atproto.identity.resolveHandle`
    async fn resolve_handle_xrpc(&self, handle: &str) -> anyhow::Result<Did> {
        let handler = PublicHandler::with_client(self.http.clone(), self.handle_resolver.clone());
        let request =
            XrpcRequest::query("com.atproto.identity.resolveHandle").param("handle", handle);
        let response = handler.send(request).await?;
        if !response.is_success() {
            return Err(XrpcError::from_response(&response).into());
        }
        let output: ResolveHandleOutput = serde_json::from_slice(&response.body)?;
        Ok(output.did)
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve_did_document(&self, did: &Did) -> anyhow::Result<DidDocument> {
        let url = did_document_url(did, &self.plc_directory)?;
        debug!("Fetching DID document for {} from {}", did, url);

        let document: DidDocument = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("Invalid DID document for {}", did))?;

        if document.id != *did {
            bail!("DID document id '{}' does not match '{}'", document.id, did);
        }
        Ok(document)
    }

    async fn resolve_handle(&self, handle: &str) -> anyhow::Result<Did> {
        let handle = normalize_handle(handle);
        if handle.is_empty() {
            bail!("Handle is empty");
        }

        match self.resolve_handle_well_known(&handle).await {
            Ok(did) => {
                debug!("Resolved {} to {} via well-known", handle, did);
                return Ok(did);
            }
            Err(e) => debug!("Well-known resolution of {} failed: {}", handle, e),
        }

        let did = self
            .resolve_handle_xrpc(&handle)
            .await
            .with_context(|| format!("Failed to resolve handle '{}'", handle))
            .inspect_err(|e| warn!("{:#}", e))?;
        debug!("Resolved {} to {} via XRPC", handle, did);
        Ok(did)
    }
}
