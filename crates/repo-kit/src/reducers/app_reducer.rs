use crate::actions::{Action, GlobalAction, SessionAction};
use crate::reducers::{records_reducer, selection_reducer, session_reducer};
use crate::state::{AppState, RepoState};

/// Reducer - pure function that produces new state from current state + action
/// This is the root reducer that orchestrates all sub-reducers
pub fn reduce(mut state: AppState, action: &Action) -> AppState {
    match action {
        Action::Global(GlobalAction::Quit) => {
            state.running = false;
            return state;
        }
        Action::Global(GlobalAction::SetNotice(notice)) => {
            state.notice = Some(notice.clone());
        }
        Action::Global(GlobalAction::ClearNotice) => {
            state.notice = None;
        }
        Action::Session(session_action) => {
            match session_action {
                SessionAction::LoggedIn { .. } => state.notice = None,
                SessionAction::LoggedOut => {
                    log::debug!("Dropping repository state");
                    state.repo = RepoState::default();
                }
                _ => {}
            }
            state.session = session_reducer::reduce_session(state.session, session_action);
        }
        Action::Records(records_action) => {
            let (repo, notice) = records_reducer::reduce_records(state.repo, records_action);
            state.repo = repo;
            if notice.is_some() {
                state.notice = notice;
            }
        }
        Action::Selection(selection_action) => {
            let (repo, notice) = selection_reducer::reduce_selection(state.repo, selection_action);
            state.repo = repo;
            if notice.is_some() {
                state.notice = notice;
            }
        }
        // Events only reach middleware
        Action::Event(_) | Action::None => {}
    }

    state
}
