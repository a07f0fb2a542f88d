//! Session actions
//!
//! Sign-in flow: bootstrap, login, redirect callback, logout.

use atp_client::Did;
use atp_oauth::CallbackParams;

#[derive(Debug, Clone)]
pub enum SessionAction {
    /// Start up: complete a pending callback or restore the last session
    Bootstrap { callback: Option<CallbackParams> },

    /// Start a login for a user-entered handle
    Login { handle: String },

    /// The authorization URL is ready; the user has to visit it
    AuthorizationUrlReady { handle: String, url: String },

    /// The browser came back with these parameters
    CallbackReceived(CallbackParams),

    /// A session is active
    LoggedIn { did: Did, handle: String },

    /// No session (bootstrap found none, login failed or logout completed)
    LoggedOut,

    /// Sign out of the active session
    Logout,
}
