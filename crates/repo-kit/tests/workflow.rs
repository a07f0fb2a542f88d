//! End-to-end workflows through the store with fake remote services

use async_trait::async_trait;
use atp_client::{Did, DidDocument, IdentityResolver, XrpcHandler, XrpcRequest, XrpcResponse};
use atp_oauth::{
    AuthSession, AuthorizationServerMetadata, AuthorizationService, CallbackParams, OAuthError,
    OAuthResult, ResolvedIdentity,
};
use pretty_assertions::assert_eq;
use repo_kit::actions::{Action, RecordsAction, SelectionAction, SessionAction};
use repo_kit::bootstrap::SessionBootstrap;
use repo_kit::domain_models::Notice;
use repo_kit::middleware::{
    ActiveSession, LoggingMiddleware, LoginFlow, RepositoryMiddleware, SessionMiddleware,
};
use repo_kit::state::{AppState, LoginStatus};
use repo_kit::store::Store;
use repo_kit_config::LastSignedIn;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use url::Url;

const ALICE: &str = "did:plc:alice";
const LIKES: &str = "app.bsky.feed.like";

/// PDS answering by method id
///
/// `listRecords` serves `pages` in order, one per cursor step.
struct FakePds {
    pages: Vec<usize>,
    batches: Mutex<Vec<usize>>,
}

impl FakePds {
    fn new(pages: Vec<usize>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            batches: Mutex::new(Vec::new()),
        })
    }

    fn list_records(&self, request: &XrpcRequest) -> serde_json::Value {
        let page: usize = request
            .params
            .iter()
            .find(|(key, _)| key == "cursor")
            .map(|(_, cursor)| cursor.parse().unwrap())
            .unwrap_or(0);
        let offset: usize = self.pages[..page].iter().sum();
        let records: Vec<serde_json::Value> = (offset..offset + self.pages[page])
            .map(|n| {
                serde_json::json!({
                    "uri": format!("at://{}/{}/{}", ALICE, LIKES, n),
                    "cid": format!("cid{}", n),
                    "value": { "$type": LIKES, "n": n },
                })
            })
            .collect();

        // The service hands out a cursor even on the last page
        serde_json::json!({ "records": records, "cursor": (page + 1).to_string() })
    }
}

#[async_trait]
impl XrpcHandler for FakePds {
    async fn send(&self, request: XrpcRequest) -> anyhow::Result<XrpcResponse> {
        let body = match request.nsid.as_str() {
            "com.atproto.repo.describeRepo" => serde_json::json!({
                "did": ALICE,
                "handle": "alice.test",
                "collections": [LIKES, "app.bsky.feed.post"],
            }),
            "com.atproto.repo.listRecords" => self.list_records(&request),
            "com.atproto.repo.applyWrites" => {
                let writes = request.body.as_ref().unwrap()["writes"].as_array().unwrap().len();
                self.batches.lock().unwrap().push(writes);
                serde_json::json!({})
            }
            other => panic!("unexpected call {}", other),
        };
        Ok(XrpcResponse {
            status: 200,
            body: serde_json::to_vec(&body)?,
        })
    }
}

struct FakeAuth {
    pds: Arc<FakePds>,
}

#[async_trait]
impl AuthorizationService for FakeAuth {
    async fn resolve_from_identity(&self, input: &str) -> OAuthResult<ResolvedIdentity> {
        if input != "alice.test" {
            return Err(OAuthError::Identity {
                input: input.to_string(),
                source: anyhow::anyhow!("unknown handle"),
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
        _scope: &str,
    ) -> OAuthResult<Url> {
        Ok(Url::parse(
            "https://auth.example.com/oauth/authorize?client_id=c&request_uri=urn%3Areq",
        )?)
    }

    async fn finalize_authorization(&self, params: &CallbackParams) -> OAuthResult<AuthSession> {
        if params.code.as_deref() != Some("code-1") {
            return Err(OAuthError::UnknownState);
        }
        Ok(AuthSession::new(
            ALICE.parse().unwrap(),
            Url::parse("https://pds.example.com").unwrap(),
            self.pds.clone(),
        ))
    }

    async fn get_session(&self, did: &Did) -> OAuthResult<AuthSession> {
        Err(OAuthError::NoSession(did.clone()))
    }

    async fn sign_out(&self, _session: &AuthSession) -> OAuthResult<()> {
        Ok(())
    }
}

struct Documents;

#[async_trait]
impl IdentityResolver for Documents {
    async fn resolve_did_document(&self, did: &Did) -> anyhow::Result<DidDocument> {
        Ok(serde_json::from_value(serde_json::json!({
            "id": did,
            "alsoKnownAs": ["at://alice.test"],
            "service": [{
                "id": "#atproto_pds",
                "type": "AtprotoPersonalDataServer",
                "serviceEndpoint": "https://pds.example.com",
            }],
        }))?)
    }

    async fn resolve_handle(&self, _handle: &str) -> anyhow::Result<Did> {
        Ok(ALICE.parse()?)
    }
}

struct Harness {
    store: Store,
    pds: Arc<FakePds>,
    _dir: TempDir,
    _runtime: Runtime,
}

impl Harness {
    fn new(pages: Vec<usize>) -> Self {
        let runtime = Runtime::new().unwrap();
        let dir = TempDir::new().unwrap();
        let pds = FakePds::new(pages);

        let bootstrap = Arc::new(SessionBootstrap::new(
            Arc::new(FakeAuth { pds: pds.clone() }),
            LastSignedIn::new(dir.path().join("last-signed-in")),
            "atproto transition:generic",
        ));
        let login = LoginFlow {
            open_browser: false,
            callback_uri: None,
            callback_timeout: Duration::from_secs(5),
            redirect_delay: Duration::from_millis(1),
        };
        let active = ActiveSession::default();

        let mut store = Store::new(AppState::default());
        store.add_middleware(Box::new(LoggingMiddleware::new()));
        store.add_middleware(Box::new(SessionMiddleware::new(
            runtime.handle().clone(),
            bootstrap,
            Arc::new(Documents),
            active.clone(),
            login,
        )));
        store.add_middleware(Box::new(RepositoryMiddleware::new(
            runtime.handle().clone(),
            active,
        )));

        Self {
            store,
            pds,
            _dir: dir,
            _runtime: runtime,
        }
    }

    /// Process background results until `done` holds
    fn wait_until(&mut self, done: impl Fn(&AppState) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done(self.store.state()) {
            assert!(Instant::now() < deadline, "timed out, state: {:?}", self.store.state());
            self.store.wait_for_action(Duration::from_millis(20));
        }
    }

    fn dispatch(&mut self, action: Action) {
        self.store.dispatch(action);
    }

    /// Login through the authorization URL and the redirect
    fn login(&mut self) {
        self.dispatch(Action::Session(SessionAction::Bootstrap { callback: None }));
        self.wait_until(|s| s.session.status == LoginStatus::LoggedOut);

        self.dispatch(Action::Session(SessionAction::Login {
            handle: "alice.test".to_string(),
        }));
        self.wait_until(|s| {
            matches!(s.session.status, LoginStatus::AwaitingCallback { .. })
                && s.notice == Some(Notice::progress("Redirecting..."))
        });

        self.dispatch(Action::Session(SessionAction::CallbackReceived(
            CallbackParams::from_query("state=st&code=code-1&iss=https%3A%2F%2Fauth.example.com"),
        )));
        self.wait_until(|s| s.session.is_logged_in() && !s.repo.collections.is_empty());
    }

    fn load_all(&mut self, collection: &str) {
        self.dispatch(Action::Records(RecordsAction::SelectCollection(
            collection.to_string(),
        )));
        self.wait_until(|s| !s.repo.loading);
        while self.store.state().repo.has_more() {
            self.dispatch(Action::Records(RecordsAction::FetchPage));
            self.wait_until(|s| !s.repo.loading);
        }
    }
}

#[test]
fn test_login_shows_resolved_handle() {
    let mut harness = Harness::new(vec![0]);
    harness.login();

    let state = harness.store.state();
    assert_eq!(state.session.handle(), Some("alice.test"));
    assert_eq!(
        state.repo.collections,
        vec![LIKES.to_string(), "app.bsky.feed.post".to_string()]
    );
    assert!(state.notice.is_none());
}

#[test]
fn test_unknown_handle_fails_login() {
    let mut harness = Harness::new(vec![0]);
    harness.dispatch(Action::Session(SessionAction::Bootstrap { callback: None }));
    harness.wait_until(|s| s.session.status == LoginStatus::LoggedOut);

    harness.dispatch(Action::Session(SessionAction::Login {
        handle: "mallory.test".to_string(),
    }));
    harness.wait_until(|s| s.notice == Some(Notice::error("Error during OAuth login")));
    assert_eq!(harness.store.state().session.status, LoginStatus::LoggedOut);
}

#[test]
fn test_second_login_ignored_while_pending() {
    let mut harness = Harness::new(vec![0]);
    harness.dispatch(Action::Session(SessionAction::Bootstrap { callback: None }));
    harness.wait_until(|s| s.session.status == LoginStatus::LoggedOut);

    harness.dispatch(Action::Session(SessionAction::Login {
        handle: "alice.test".to_string(),
    }));
    assert_eq!(harness.store.state().session.status, LoginStatus::Loading);

    // Would fail and sign out if it started a second flow
    harness.dispatch(Action::Session(SessionAction::Login {
        handle: "mallory.test".to_string(),
    }));
    harness.wait_until(|s| {
        matches!(s.session.status, LoginStatus::AwaitingCallback { .. })
            && s.notice == Some(Notice::progress("Redirecting..."))
    });
    harness.store.wait_for_action(Duration::from_millis(50));

    let state = harness.store.state();
    assert!(matches!(
        &state.session.status,
        LoginStatus::AwaitingCallback { handle, .. } if handle == "alice.test"
    ));
    assert_ne!(state.notice, Some(Notice::error("Error during OAuth login")));
}

#[test]
fn test_pages_accumulate_until_short_page() {
    let mut harness = Harness::new(vec![100, 37]);
    harness.login();
    harness.load_all(LIKES);

    let repo = &harness.store.state().repo;
    assert_eq!(repo.records.len(), 137);
    assert!(repo.cursor.is_none());
    assert_eq!(repo.marked_count(), 0);

    // Nothing more to fetch
    harness.dispatch(Action::Records(RecordsAction::FetchPage));
    assert_eq!(
        harness.store.state().notice,
        Some(Notice::success("All records loaded"))
    );
}

#[test]
fn test_delete_marked_in_batches() {
    let mut harness = Harness::new(vec![100, 100, 100, 100, 100, 20]);
    harness.login();
    harness.load_all(LIKES);
    assert_eq!(harness.store.state().repo.records.len(), 520);

    harness.dispatch(Action::Selection(SelectionAction::SelectAll));
    for number in 450..520 {
        harness.dispatch(Action::Selection(SelectionAction::Toggle(number)));
    }
    assert_eq!(harness.store.state().repo.marked_count(), 450);

    harness.dispatch(Action::Records(RecordsAction::DeleteMarked));
    harness.wait_until(|s| !s.repo.deleting);

    assert_eq!(*harness.pds.batches.lock().unwrap(), vec![200, 200, 50]);
    let state = harness.store.state();
    assert!(state.repo.records.is_empty());
    assert!(state.repo.cursor.is_none());
    assert_eq!(state.notice, Some(Notice::success("Deleted 450 records")));
}

#[test]
fn test_logout_drops_records() {
    let mut harness = Harness::new(vec![3]);
    harness.login();
    harness.load_all(LIKES);
    assert_eq!(harness.store.state().repo.records.len(), 3);

    harness.dispatch(Action::Session(SessionAction::Logout));
    harness.wait_until(|s| s.notice == Some(Notice::success("Signed out")));

    let state = harness.store.state();
    assert_eq!(state.session.status, LoginStatus::LoggedOut);
    assert!(state.repo.records.is_empty());
}
