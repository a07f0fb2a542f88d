//! DPoP (RFC 9449) proofs.
//!
//! Every token request and every resource request carries a proof JWT signed
//! with the per-session ES256 key. Servers may demand a nonce; the nonce is
//! remembered per origin and the request is retried once.

use crate::{OAuthError, OAuthResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::debug;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use url::Url;

/// Response header carrying a fresh server nonce
pub const DPOP_NONCE_HEADER: &str = "DPoP-Nonce";

/// ES256 key bound to a session
///
/// Persisted as the base64url encoded private scalar.
#[derive(Clone)]
pub struct DpopKey {
    signing: SigningKey,
}

impl DpopKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::random(&mut rand::thread_rng()),
        }
    }

    /// Restore a key from its base64url encoded scalar
    pub fn from_base64(encoded: &str) -> OAuthResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| OAuthError::Dpop(format!("invalid key encoding: {}", e)))?;
        let signing = SigningKey::from_slice(&bytes)
            .map_err(|e| OAuthError::Dpop(format!("invalid key: {}", e)))?;
        Ok(Self { signing })
    }

    /// Base64url encoded private scalar
    pub fn to_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.signing.to_bytes())
    }

    /// Public key as a JWK
    pub fn public_jwk(&self) -> serde_json::Value {
        let point = self.signing.verifying_key().to_encoded_point(false);
        let coordinate = |c: Option<&p256::FieldBytes>| {
            c.map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
                .unwrap_or_default()
        };
        json!({
            "kty": "EC",
            "crv": "P-256",
            "x": coordinate(point.x()),
            "y": coordinate(point.y()),
        })
    }

    /// Build a proof for `method url`
    ///
    /// `access_token` binds the proof to a token (`ath` claim) for resource
    /// requests.
    pub fn proof(
        &self,
        method: &str,
        url: &Url,
        nonce: Option<&str>,
        access_token: Option<&str>,
    ) -> OAuthResult<String> {
        let header = json!({
            "typ": "dpop+jwt",
            "alg": "ES256",
            "jwk": self.public_jwk(),
        });

        let mut claims = json!({
            "jti": uuid::Uuid::new_v4().to_string(),
            "htm": method,
            "htu": htu(url),
            "iat": chrono::Utc::now().timestamp(),
        });
        if let Some(nonce) = nonce {
            claims["nonce"] = json!(nonce);
        }
        if let Some(token) = access_token {
            claims["ath"] = json!(URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes())));
        }

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?)
        );
        let signature: Signature = self.signing.sign(signing_input.as_bytes());

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }
}

impl std::fmt::Debug for DpopKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DpopKey").finish_non_exhaustive()
    }
}

impl Serialize for DpopKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for DpopKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        DpopKey::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// `htu` claim: the request URL without query and fragment
fn htu(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.to_string()
}

/// Server nonces, keyed by origin
#[derive(Debug, Default)]
pub struct NonceStore {
    nonces: Mutex<HashMap<String, String>>,
}

impl NonceStore {
    pub fn get(&self, url: &Url) -> Option<String> {
        self.nonces
            .lock()
            .ok()
            .and_then(|nonces| nonces.get(&origin(url)).cloned())
    }

    pub fn set(&self, url: &Url, nonce: &str) {
        if let Ok(mut nonces) = self.nonces.lock() {
            nonces.insert(origin(url), nonce.to_string());
        }
    }
}

fn origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Buffered HTTP response
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Whether the response asks for a (new) DPoP nonce
///
/// Authorization servers answer 400 with `error=use_dpop_nonce`; resource
/// servers answer 401 with the error in `WWW-Authenticate`.
pub fn is_nonce_challenge(response: &RawResponse) -> bool {
    match response.status {
        400 => serde_json::from_slice::<serde_json::Value>(&response.body)
            .ok()
            .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_owned))
            .is_some_and(|error| error == "use_dpop_nonce"),
        401 => response
            .headers
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("use_dpop_nonce")),
        _ => false,
    }
}

/// Send a request with a DPoP proof, retrying once on a nonce challenge
///
/// `build` receives the proof and must return a complete request (the proof
/// goes into the `DPoP` header).
pub async fn send_with_dpop<F>(
    key: &DpopKey,
    nonces: &NonceStore,
    method: &str,
    url: &Url,
    access_token: Option<&str>,
    build: F,
) -> OAuthResult<RawResponse>
where
    F: Fn(String) -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let nonce = nonces.get(url);
        let proof = key.proof(method, url, nonce.as_deref(), access_token)?;

        let response = build(proof).send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        if let Some(fresh) = headers
            .get(DPOP_NONCE_HEADER)
            .and_then(|value| value.to_str().ok())
        {
            nonces.set(url, fresh);
        }

        let response = RawResponse {
            status,
            headers,
            body,
        };
        if attempt == 0 && is_nonce_challenge(&response) {
            debug!("Retrying {} {} with server nonce", method, url);
            attempt += 1;
            continue;
        }
        return Ok(response);
    }
}
