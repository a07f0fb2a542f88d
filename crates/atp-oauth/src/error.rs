//! Error types for the OAuth client.

use atp_client::Did;
use thiserror::Error;

/// OAuth errors.
#[derive(Debug, Error)]
pub enum OAuthError {
    /// Handle or DID could not be resolved to a PDS
    #[error("Failed to resolve identity '{input}': {source:#}")]
    Identity {
        input: String,
        #[source]
        source: anyhow::Error,
    },

    /// Protected resource or authorization server metadata is unusable
    #[error("Invalid server metadata: {0}")]
    Metadata(String),

    /// Error response of the authorization server
    #[error("Authorization server error: {error}{}", description_suffix(.description))]
    Server {
        error: String,
        description: Option<String>,
    },

    /// The user or the server denied the authorization
    #[error("Authorization denied: {error}{}", description_suffix(.description))]
    Denied {
        error: String,
        description: Option<String>,
    },

    /// Callback parameters are missing or inconsistent
    #[error("Invalid callback: {0}")]
    Callback(String),

    /// The callback `state` does not match a pending authorization
    #[error("Unknown or expired authorization state")]
    UnknownState,

    /// Token response failed verification
    #[error("Token response rejected: {0}")]
    Token(String),

    /// No stored session for this DID
    #[error("No stored session for {0}")]
    NoSession(Did),

    /// DPoP key or proof error
    #[error("DPoP error: {0}")]
    Dpop(String),

    /// Timed out waiting for the browser redirect
    #[error("Timed out waiting for the authorization callback")]
    Timeout,

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error (session store, callback listener)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

fn description_suffix(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

impl OAuthError {
    /// Returns true if the stored session can no longer be used.
    pub fn is_session_invalid(&self) -> bool {
        match self {
            OAuthError::NoSession(_) => true,
            OAuthError::Server { error, .. } => error == "invalid_grant",
            _ => false,
        }
    }
}

/// Result type alias using OAuthError.
pub type OAuthResult<T> = Result<T, OAuthError>;
