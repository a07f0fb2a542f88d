//! Application State

use super::{RepoState, SessionState};
use crate::domain_models::Notice;
use repo_kit_config::AppConfig;

/// Application state
///
/// Owned by the store and only changed by reducers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub running: bool,
    pub session: SessionState,
    pub repo: RepoState,
    /// Latest feedback for the user
    pub notice: Option<Notice>,
    /// Application configuration
    pub app_config: AppConfig,
}

impl AppState {
    pub fn new(app_config: AppConfig) -> Self {
        Self {
            running: true,
            session: SessionState::default(),
            repo: RepoState::default(),
            notice: None,
            app_config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}
