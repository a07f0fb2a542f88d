//! The session shared by the middleware
//!
//! Set by the session middleware once a session exists and read by the
//! repository middleware for every remote call.

use atp_client::{Did, RepoClient, XrpcClient};
use atp_oauth::AuthSession;
use std::sync::{Arc, RwLock};

/// An authenticated session and the repository client on top of it
#[derive(Clone)]
pub struct Connection {
    pub did: Did,
    pub session: AuthSession,
    pub client: Arc<dyn RepoClient>,
}

impl Connection {
    pub fn new(session: AuthSession) -> Self {
        Self {
            did: session.did.clone(),
            client: Arc::new(XrpcClient::new(session.handler.clone())),
            session,
        }
    }
}

#[derive(Clone, Default)]
pub struct ActiveSession(Arc<RwLock<Option<Connection>>>);

impl ActiveSession {
    pub fn get(&self) -> Option<Connection> {
        self.0
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set(&self, connection: Connection) {
        *self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(connection);
    }

    /// Remove and return the connection
    pub fn take(&self) -> Option<Connection> {
        self.0
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}
