//! Selection Reducer

use crate::actions::SelectionAction;
use crate::domain_models::Notice;
use crate::selection;
use crate::state::RepoState;

/// Reduce selection actions
pub fn reduce_selection(
    mut state: RepoState,
    action: &SelectionAction,
) -> (RepoState, Option<Notice>) {
    let notice = match action {
        SelectionAction::SelectAll => {
            selection::select_all(&mut state.records);
            None
        }
        SelectionAction::UnselectAll => {
            selection::unselect_all(&mut state.records);
            None
        }
        SelectionAction::SelectMatching(fragment) => {
            let marked = selection::select_matching(&mut state.records, fragment);
            Some(Notice::success(format!(
                "Marked {} more records matching '{}'",
                marked, fragment
            )))
        }
        SelectionAction::Toggle(index) => match selection::toggle(&mut state.records, *index) {
            Some(_) => None,
            None => Some(Notice::error(format!("No record #{}", index + 1))),
        },
        SelectionAction::ShowSelectedOnly(enabled) => {
            state.show_selected_only = *enabled;
            None
        }
    };
    (state, notice)
}
