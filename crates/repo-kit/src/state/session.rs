//! Session state

use atp_client::Did;

/// Where the user is in the sign-in flow
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoginStatus {
    /// Bootstrap or handshake in progress
    #[default]
    Loading,
    /// No session
    LoggedOut,
    /// Authorization URL handed out, waiting for the redirect
    AwaitingCallback { handle: String, url: String },
    /// Signed in
    LoggedIn { did: Did, handle: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub status: LoginStatus,
}

impl SessionState {
    pub fn is_logged_in(&self) -> bool {
        matches!(self.status, LoginStatus::LoggedIn { .. })
    }

    /// DID of the signed-in account
    pub fn did(&self) -> Option<&Did> {
        match &self.status {
            LoginStatus::LoggedIn { did, .. } => Some(did),
            _ => None,
        }
    }

    /// Handle of the signed-in account
    pub fn handle(&self) -> Option<&str> {
        match &self.status {
            LoginStatus::LoggedIn { handle, .. } => Some(handle),
            _ => None,
        }
    }
}
