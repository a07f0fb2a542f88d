//! Application State Module
//!
//! Contains all state types used by the application, organized by feature.

mod app;
mod repo;
mod session;

pub use app::AppState;
pub use repo::RepoState;
pub use session::{LoginStatus, SessionState};
