//! Session bootstrap
//!
//! Decides at start-up whether a session exists: a pending redirect is
//! completed first, otherwise the last signed-in account is restored.
//! Also drives login and logout against the [`AuthorizationService`].

use atp_client::{Did, IdentityResolver};
use atp_oauth::{AuthSession, AuthorizationService, CallbackParams, OAuthError};
use repo_kit_config::LastSignedIn;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

pub const NOTICE_RESOLVING: &str = "Resolving your identity...";
pub const NOTICE_CONTACTING: &str = "Contacting your data server...";
pub const NOTICE_REDIRECTING: &str = "Redirecting...";
pub const NOTICE_LOGIN_FAILED: &str = "Error during OAuth login";

/// How the bootstrap ended
#[derive(Debug)]
pub enum BootstrapOutcome {
    /// A redirect was completed into a new session
    Authorized(AuthSession),
    /// The session of the last signed-in account was restored
    Restored(AuthSession),
    /// Nobody is signed in
    NoSession,
}

impl BootstrapOutcome {
    pub fn into_session(self) -> Option<AuthSession> {
        match self {
            BootstrapOutcome::Authorized(session) | BootstrapOutcome::Restored(session) => {
                Some(session)
            }
            BootstrapOutcome::NoSession => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The redirect could not be turned into a session
    #[error("Failed to complete sign-in: {0}")]
    CallbackFailed(#[source] OAuthError),

    /// The stored account could not be restored; it has been forgotten
    #[error("Failed to restore the session of {did}: {source:#}")]
    RestoreFailed {
        did: String,
        #[source]
        source: anyhow::Error,
    },

    /// Resolving the handle or building the authorization URL failed
    #[error("Error during OAuth login")]
    LoginFailed(#[source] OAuthError),

    /// Reading or writing local session data failed
    #[error("Session storage error: {0:#}")]
    Storage(#[source] anyhow::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Start-up, login and logout of the single account session
pub struct SessionBootstrap {
    auth: Arc<dyn AuthorizationService>,
    last_signed_in: LastSignedIn,
    scope: String,
}

impl SessionBootstrap {
    pub fn new(
        auth: Arc<dyn AuthorizationService>,
        last_signed_in: LastSignedIn,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            last_signed_in,
            scope: scope.into(),
        }
    }

    /// Establish the session at start-up
    ///
    /// `callback` holds redirect parameters handed in for this run; they are
    /// only used when they form an authorization response.
    pub async fn run(&self, callback: Option<&CallbackParams>) -> SessionResult<BootstrapOutcome> {
        if let Some(params) = callback.filter(|p| p.is_authorization_response()) {
            log::info!("Completing authorization from redirect");
            let session = self
                .auth
                .finalize_authorization(params)
                .await
                .map_err(SessionError::CallbackFailed)?;
            self.last_signed_in
                .set(session.did.as_str())
                .map_err(SessionError::Storage)?;
            return Ok(BootstrapOutcome::Authorized(session));
        }

        let Some(stored) = self.last_signed_in.get().map_err(SessionError::Storage)? else {
            log::info!("No previous session");
            return Ok(BootstrapOutcome::NoSession);
        };

        match self.restore(&stored).await {
            Ok(session) => {
                log::info!("Restored session of {}", session.did);
                Ok(BootstrapOutcome::Restored(session))
            }
            Err(source) => {
                log::warn!("Forgetting {} after failed restore: {:#}", stored, source);
                if let Err(e) = self.last_signed_in.clear() {
                    log::error!("Failed to clear last signed-in account: {:#}", e);
                }
                Err(SessionError::RestoreFailed {
                    did: stored,
                    source,
                })
            }
        }
    }

    async fn restore(&self, stored: &str) -> anyhow::Result<AuthSession> {
        let did: Did = stored.parse()?;
        Ok(self.auth.get_session(&did).await?)
    }

    /// Resolve `handle` and build the authorization URL
    ///
    /// `progress` receives a notice before each remote step.
    pub async fn login(
        &self,
        handle: &str,
        progress: &(dyn Fn(&str) + Send + Sync),
    ) -> SessionResult<Url> {
        progress(NOTICE_RESOLVING);
        let resolved = self
            .auth
            .resolve_from_identity(handle)
            .await
            .map_err(login_failed)?;

        progress(NOTICE_CONTACTING);
        let url = self
            .auth
            .create_authorization_url(&resolved, &self.scope)
            .await
            .map_err(login_failed)?;

        log::info!("Authorization URL ready for {}", handle);
        Ok(url)
    }

    /// End the session; the last signed-in account is kept
    pub async fn logout(&self, session: &AuthSession) -> SessionResult<()> {
        self.auth
            .sign_out(session)
            .await
            .map_err(|e| SessionError::Storage(e.into()))?;
        log::info!("Signed out {}", session.did);
        Ok(())
    }
}

fn login_failed(error: OAuthError) -> SessionError {
    log::error!("OAuth login failed: {}", error);
    SessionError::LoginFailed(error)
}

/// Handle of `did` from its DID document, or the DID itself
pub async fn resolve_display_handle(identity: &dyn IdentityResolver, did: &Did) -> String {
    match identity.resolve_did_document(did).await {
        Ok(document) => match document.handle() {
            Some(handle) => handle.to_string(),
            None => {
                log::warn!("DID document of {} has no handle", did);
                did.to_string()
            }
        },
        Err(e) => {
            log::warn!("Failed to resolve DID document of {}: {:#}", did, e);
            did.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atp_client::{DidDocument, XrpcHandler, XrpcRequest, XrpcResponse};
    use atp_oauth::{AuthorizationServerMetadata, OAuthResult, ResolvedIdentity};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct NoTransport;

    #[async_trait]
    impl XrpcHandler for NoTransport {
        async fn send(&self, _request: XrpcRequest) -> anyhow::Result<XrpcResponse> {
            anyhow::bail!("offline")
        }
    }

    fn session(did: &str) -> AuthSession {
        AuthSession::new(
            did.parse().unwrap(),
            Url::parse("https://pds.example.com").unwrap(),
            Arc::new(NoTransport),
        )
    }

    #[derive(Default)]
    struct FakeAuth {
        stored: Mutex<Vec<String>>,
        signed_out: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AuthorizationService for FakeAuth {
        async fn resolve_from_identity(&self, input: &str) -> OAuthResult<ResolvedIdentity> {
            if input != "alice.test" {
                return Err(OAuthError::Identity {
                    input: input.to_string(),
                    source: anyhow::anyhow!("no such handle"),
                });
            }
            Ok(ResolvedIdentity {
                identity: None,
                server: AuthorizationServerMetadata::default(),
            })
        }

        async fn create_authorization_url(
            &self,
            _resolved: &ResolvedIdentity,
            scope: &str,
        ) -> OAuthResult<Url> {
            assert_eq!(scope, "atproto transition:generic");
            Ok(Url::parse("https://auth.example.com/authorize?client_id=c&request_uri=r")?)
        }

        async fn finalize_authorization(
            &self,
            params: &CallbackParams,
        ) -> OAuthResult<AuthSession> {
            if params.code.as_deref() == Some("good") {
                Ok(session("did:plc:alice"))
            } else {
                Err(OAuthError::UnknownState)
            }
        }

        async fn get_session(&self, did: &Did) -> OAuthResult<AuthSession> {
            if self.stored.lock().unwrap().contains(&did.to_string()) {
                Ok(session(did.as_str()))
            } else {
                Err(OAuthError::NoSession(did.clone()))
            }
        }

        async fn sign_out(&self, session: &AuthSession) -> OAuthResult<()> {
            self.signed_out.lock().unwrap().push(session.did.to_string());
            Ok(())
        }
    }

    fn bootstrap(dir: &TempDir, auth: Arc<FakeAuth>) -> SessionBootstrap {
        SessionBootstrap::new(
            auth,
            LastSignedIn::new(dir.path().join("last-signed-in")),
            "atproto transition:generic",
        )
    }

    fn callback(code: &str) -> CallbackParams {
        CallbackParams::from_query(&format!("state=s1&code={}", code))
    }

    #[tokio::test]
    async fn test_callback_authorizes_and_persists_did() {
        let dir = TempDir::new().unwrap();
        let bootstrap = bootstrap(&dir, Arc::new(FakeAuth::default()));

        let outcome = bootstrap.run(Some(&callback("good"))).await.unwrap();
        assert!(matches!(outcome, BootstrapOutcome::Authorized(_)));
        assert_eq!(
            bootstrap.last_signed_in.get().unwrap().as_deref(),
            Some("did:plc:alice")
        );
    }

    #[tokio::test]
    async fn test_failed_callback() {
        let dir = TempDir::new().unwrap();
        let bootstrap = bootstrap(&dir, Arc::new(FakeAuth::default()));

        let err = bootstrap.run(Some(&callback("bad"))).await.unwrap_err();
        assert!(matches!(err, SessionError::CallbackFailed(_)));
        assert_eq!(bootstrap.last_signed_in.get().unwrap(), None);
    }

    #[tokio::test]
    async fn test_incomplete_callback_is_ignored() {
        let dir = TempDir::new().unwrap();
        let bootstrap = bootstrap(&dir, Arc::new(FakeAuth::default()));

        let params = CallbackParams::from_query("state=s1");
        let outcome = bootstrap.run(Some(&params)).await.unwrap();
        assert!(matches!(outcome, BootstrapOutcome::NoSession));
    }

    #[tokio::test]
    async fn test_restores_last_signed_in() {
        let dir = TempDir::new().unwrap();
        let auth = Arc::new(FakeAuth::default());
        auth.stored.lock().unwrap().push("did:plc:alice".to_string());
        let bootstrap = bootstrap(&dir, auth);
        bootstrap.last_signed_in.set("did:plc:alice").unwrap();

        let session = bootstrap.run(None).await.unwrap().into_session().unwrap();
        assert_eq!(session.did.as_str(), "did:plc:alice");
    }

    #[tokio::test]
    async fn test_failed_restore_forgets_account() {
        let dir = TempDir::new().unwrap();
        let bootstrap = bootstrap(&dir, Arc::new(FakeAuth::default()));
        bootstrap.last_signed_in.set("did:plc:gone").unwrap();

        let err = bootstrap.run(None).await.unwrap_err();
        match err {
            SessionError::RestoreFailed { did, .. } => assert_eq!(did, "did:plc:gone"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(bootstrap.last_signed_in.get().unwrap(), None);

        // Nothing left to restore
        let outcome = bootstrap.run(None).await.unwrap();
        assert!(matches!(outcome, BootstrapOutcome::NoSession));
    }

    #[tokio::test]
    async fn test_login_reports_progress() {
        let dir = TempDir::new().unwrap();
        let bootstrap = bootstrap(&dir, Arc::new(FakeAuth::default()));
        let notices = Mutex::new(Vec::new());

        let url = bootstrap
            .login("alice.test", &|notice: &str| {
                notices.lock().unwrap().push(notice.to_string())
            })
            .await
            .unwrap();

        assert_eq!(url.host_str(), Some("auth.example.com"));
        assert_eq!(
            notices.into_inner().unwrap(),
            vec![NOTICE_RESOLVING.to_string(), NOTICE_CONTACTING.to_string()]
        );
    }

    #[tokio::test]
    async fn test_login_failure() {
        let dir = TempDir::new().unwrap();
        let bootstrap = bootstrap(&dir, Arc::new(FakeAuth::default()));

        let err = bootstrap.login("nobody.test", &|_: &str| {}).await.unwrap_err();
        assert!(matches!(err, SessionError::LoginFailed(_)));
        assert_eq!(err.to_string(), NOTICE_LOGIN_FAILED);
    }

    #[tokio::test]
    async fn test_logout_keeps_last_signed_in() {
        let dir = TempDir::new().unwrap();
        let auth = Arc::new(FakeAuth::default());
        let bootstrap = bootstrap(&dir, auth.clone());
        bootstrap.last_signed_in.set("did:plc:alice").unwrap();

        bootstrap.logout(&session("did:plc:alice")).await.unwrap();
        assert_eq!(auth.signed_out.lock().unwrap().as_slice(), ["did:plc:alice"]);
        assert!(bootstrap.last_signed_in.get().unwrap().is_some());
    }

    struct Documents;

    #[async_trait]
    impl IdentityResolver for Documents {
        async fn resolve_did_document(&self, did: &Did) -> anyhow::Result<DidDocument> {
            if did.as_str() != "did:plc:alice" {
                anyhow::bail!("not found");
            }
            Ok(serde_json::from_value(serde_json::json!({
                "id": "did:plc:alice",
                "alsoKnownAs": ["at://alice.test"],
                "service": []
            }))?)
        }

        async fn resolve_handle(&self, _handle: &str) -> anyhow::Result<Did> {
            anyhow::bail!("unused")
        }
    }

    #[tokio::test]
    async fn test_resolve_display_handle() {
        let alice: Did = "did:plc:alice".parse().unwrap();
        let bob: Did = "did:plc:bob".parse().unwrap();
        assert_eq!(resolve_display_handle(&Documents, &alice).await, "alice.test");
        assert_eq!(resolve_display_handle(&Documents, &bob).await, "did:plc:bob");
    }
}
