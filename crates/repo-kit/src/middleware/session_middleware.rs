//! Session Middleware
//!
//! Runs the sign-in side effects:
//! - bootstrap at start-up (pending redirect or last signed-in account)
//! - login: authorization URL, browser, loopback callback
//! - completing the handshake when the callback arrives
//! - logout
//!
//! A successful session is stored in [`ActiveSession`] and announced with
//! `Event::SessionReady`.

use crate::actions::{Action, Event, GlobalAction, SessionAction};
use crate::bootstrap::{
    resolve_display_handle, SessionBootstrap, NOTICE_LOGIN_FAILED, NOTICE_REDIRECTING,
};
use crate::dispatcher::Dispatcher;
use crate::domain_models::Notice;
use crate::middleware::{ActiveSession, Connection, Middleware};
use crate::state::{AppState, LoginStatus};
use crate::utils::browser::open_url;
use atp_client::IdentityResolver;
use atp_oauth::{CallbackListener, CallbackParams};
use repo_kit_config::AppConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use url::Url;

/// Pause between showing "Redirecting..." and opening the browser
pub const REDIRECT_DELAY: Duration = Duration::from_millis(250);

/// How a login reaches the user and comes back
#[derive(Debug, Clone)]
pub struct LoginFlow {
    /// Open the authorization URL in the system browser
    pub open_browser: bool,
    /// Loopback redirect URI to listen on; `None` when the redirect leaves
    /// this machine and the URL has to be passed back with `--callback`
    pub callback_uri: Option<Url>,
    pub callback_timeout: Duration,
    pub redirect_delay: Duration,
}

impl LoginFlow {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let redirect = config.redirect_url()?;
        let callback_uri = is_loopback(&redirect).then_some(redirect);

        Ok(Self {
            open_browser: config.open_browser,
            callback_uri,
            callback_timeout: Duration::from_secs(config.callback_timeout_secs),
            redirect_delay: REDIRECT_DELAY,
        })
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(url.host_str(), Some("127.0.0.1" | "localhost" | "[::1]"))
}

/// Session middleware - sign-in, restore and sign-out
pub struct SessionMiddleware {
    runtime: Handle,
    bootstrap: Arc<SessionBootstrap>,
    identity: Arc<dyn IdentityResolver>,
    active: ActiveSession,
    login: LoginFlow,
}

impl SessionMiddleware {
    pub fn new(
        runtime: Handle,
        bootstrap: Arc<SessionBootstrap>,
        identity: Arc<dyn IdentityResolver>,
        active: ActiveSession,
        login: LoginFlow,
    ) -> Self {
        Self {
            runtime,
            bootstrap,
            identity,
            active,
            login,
        }
    }

    /// Establish a session in the background and report the result
    fn start_session(&self, callback: Option<CallbackParams>, dispatcher: &Dispatcher) {
        let bootstrap = self.bootstrap.clone();
        let identity = self.identity.clone();
        let active = self.active.clone();
        let dispatcher = dispatcher.clone();

        self.runtime.spawn(async move {
            let outcome = match bootstrap.run(callback.as_ref()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("Session bootstrap failed: {}", e);
                    dispatcher.dispatch(Action::Session(SessionAction::LoggedOut));
                    dispatcher.dispatch(set_notice(Notice::error(e.to_string())));
                    return;
                }
            };

            let Some(session) = outcome.into_session() else {
                dispatcher.dispatch(Action::Session(SessionAction::LoggedOut));
                return;
            };

            let connection = Connection::new(session);
            let did = connection.did.clone();
            active.set(connection);

            let handle = resolve_display_handle(identity.as_ref(), &did).await;
            dispatcher.dispatch(Action::Session(SessionAction::LoggedIn {
                did: did.clone(),
                handle,
            }));
            dispatcher.dispatch(Action::event(Event::SessionReady { did }));
        });
    }

    fn start_login(&self, handle: String, dispatcher: &Dispatcher) {
        let bootstrap = self.bootstrap.clone();
        let flow = self.login.clone();
        let dispatcher = dispatcher.clone();

        self.runtime.spawn(async move {
            let listener = match &flow.callback_uri {
                Some(uri) => match CallbackListener::bind(uri, flow.callback_timeout).await {
                    Ok(listener) => Some(listener),
                    Err(e) => {
                        log::error!("Failed to listen for the OAuth callback: {}", e);
                        login_failed(&dispatcher);
                        return;
                    }
                },
                None => None,
            };

            let progress = |message: &str| dispatcher.dispatch(set_notice(Notice::progress(message)));
            let url = match bootstrap.login(&handle, &progress).await {
                Ok(url) => url,
                Err(e) => {
                    log::debug!("Login aborted: {}", e);
                    login_failed(&dispatcher);
                    return;
                }
            };

            dispatcher.dispatch(Action::Session(SessionAction::AuthorizationUrlReady {
                handle,
                url: url.to_string(),
            }));
            dispatcher.dispatch(set_notice(Notice::progress(NOTICE_REDIRECTING)));

            tokio::time::sleep(flow.redirect_delay).await;
            if flow.open_browser {
                open_url(url.to_string()).await;
            }

            let Some(listener) = listener else {
                log::info!("No loopback listener, waiting for --callback on next start");
                return;
            };
            match listener.wait_for_callback().await {
                Ok(params) => {
                    dispatcher.dispatch(Action::Session(SessionAction::CallbackReceived(params)))
                }
                Err(e) => {
                    log::error!("OAuth callback failed: {}", e);
                    dispatcher.dispatch(Action::Session(SessionAction::LoggedOut));
                    dispatcher.dispatch(set_notice(Notice::error(format!(
                        "Sign-in was not completed: {}",
                        e
                    ))));
                }
            }
        });
    }

    fn start_logout(&self, dispatcher: &Dispatcher) -> bool {
        let Some(connection) = self.active.take() else {
            dispatcher.dispatch(set_notice(Notice::error("Not signed in")));
            return false;
        };
        let bootstrap = self.bootstrap.clone();
        let dispatcher = dispatcher.clone();

        self.runtime.spawn(async move {
            let notice = match bootstrap.logout(&connection.session).await {
                Ok(()) => Notice::success("Signed out"),
                Err(e) => {
                    log::error!("Sign-out failed: {}", e);
                    Notice::error(e.to_string())
                }
            };
            dispatcher.dispatch(Action::Session(SessionAction::LoggedOut));
            dispatcher.dispatch(Action::event(Event::SessionEnded));
            dispatcher.dispatch(set_notice(notice));
        });
        true
    }
}

fn set_notice(notice: Notice) -> Action {
    Action::Global(GlobalAction::SetNotice(notice))
}

fn login_failed(dispatcher: &Dispatcher) {
    dispatcher.dispatch(Action::Session(SessionAction::LoggedOut));
    dispatcher.dispatch(set_notice(Notice::error(NOTICE_LOGIN_FAILED)));
}

impl Middleware for SessionMiddleware {
    fn handle(&mut self, action: &Action, state: &AppState, dispatcher: &Dispatcher) -> bool {
        let Action::Session(session_action) = action else {
            return true;
        };

        match session_action {
            SessionAction::Bootstrap { callback } => {
                log::info!("SessionMiddleware: bootstrapping session");
                self.start_session(callback.clone(), dispatcher);
                true
            }

            SessionAction::CallbackReceived(params) => {
                self.start_session(Some(params.clone()), dispatcher);
                true
            }

            SessionAction::Login { handle } => match &state.session.status {
                LoginStatus::LoggedOut => {
                    self.start_login(handle.clone(), dispatcher);
                    true
                }
                LoginStatus::LoggedIn { handle, .. } => {
                    dispatcher.dispatch(set_notice(Notice::error(format!(
                        "Already signed in as {}, logout first",
                        handle
                    ))));
                    false
                }
                _ => {
                    log::debug!("Login ignored while a sign-in is in progress");
                    false
                }
            },

            SessionAction::Logout => self.start_logout(dispatcher),

            _ => true,
        }
    }
}
