//! AT Protocol OAuth
//!
//! This crate provides:
//! - The `AuthorizationService` trait the application signs in through
//! - `OAuthClient`, its implementation (PKCE, PAR, DPoP, token exchange,
//!   refresh and revocation)
//! - `OAuthAgent`, an authenticated `XrpcHandler` for a session
//! - File persistence of sessions and pending authorizations
//! - A loopback listener receiving the browser redirect

mod agent;
mod callback;
mod client;
mod dpop;
mod error;
mod metadata;
mod pkce;
mod service;
mod store;
mod token;

/// Tokens are refreshed when they expire within this many seconds
pub const REFRESH_MARGIN_SECS: i64 = 60;

pub use agent::OAuthAgent;
pub use callback::CallbackListener;
pub use client::{OAuthClient, OAuthClientConfig};
pub use dpop::DpopKey;
pub use error::{OAuthError, OAuthResult};
pub use metadata::AuthorizationServerMetadata;
pub use service::{AuthSession, AuthorizationService, CallbackParams, IdentityInfo, ResolvedIdentity};
pub use store::{OAuthStore, StoredSession, TokenSet};
