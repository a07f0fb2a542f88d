//! Session Reducer
//!
//! Tracks where the user is in the sign-in flow.

use crate::actions::SessionAction;
use crate::state::{LoginStatus, SessionState};

/// Reduce session actions
pub fn reduce_session(mut state: SessionState, action: &SessionAction) -> SessionState {
    match action {
        // Login is pending until the authorization URL is ready
        SessionAction::Bootstrap { .. }
        | SessionAction::Login { .. }
        | SessionAction::CallbackReceived(_) => {
            state.status = LoginStatus::Loading;
        }
        SessionAction::AuthorizationUrlReady { handle, url } => {
            state.status = LoginStatus::AwaitingCallback {
                handle: handle.clone(),
                url: url.clone(),
            };
        }
        SessionAction::LoggedIn { did, handle } => {
            log::info!("Signed in as {} ({})", handle, did);
            state.status = LoginStatus::LoggedIn {
                did: did.clone(),
                handle: handle.clone(),
            };
        }
        SessionAction::LoggedOut => {
            state.status = LoginStatus::LoggedOut;
        }
        // Logout only starts side effects
        SessionAction::Logout => {}
    }
    state
}
