use crate::actions::Action;
use crate::dispatcher::Dispatcher;
use crate::state::AppState;

pub mod active_session;
pub mod logging;
pub mod repository_middleware;
pub mod session_middleware;

pub use active_session::{ActiveSession, Connection};
pub use logging::LoggingMiddleware;
pub use repository_middleware::RepositoryMiddleware;
pub use session_middleware::{LoginFlow, SessionMiddleware};

/// Middleware trait - intercepts actions before they reach the reducer
///
/// Middleware runs on the thread driving the store and must not block:
/// remote work is spawned on the tokio runtime and reports back through the
/// dispatcher.
pub trait Middleware: Send {
    /// Handle an action
    ///
    /// - `action`: The action to process
    /// - `state`: Current application state (read-only snapshot)
    /// - `dispatcher`: Use to dispatch actions that should re-enter middleware chain
    ///
    /// Returns `true` to continue chain, `false` to consume action
    fn handle(&mut self, action: &Action, state: &AppState, dispatcher: &Dispatcher) -> bool;
}
