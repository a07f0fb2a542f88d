//! Command line of the interactive session
//!
//! Each input line is one command. Commands either become an action for the
//! store or only print part of the state.

use crate::actions::{Action, GlobalAction, RecordsAction, SelectionAction, SessionAction};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(String),
    Logout,
    Collections,
    /// Collection name or its number in the `collections` listing
    Use(String),
    More,
    List,
    SelectAll,
    UnselectAll,
    Select(String),
    /// Number shown by `list` (1-based)
    Toggle(usize),
    ShowSelected(bool),
    Delete,
    Status,
    Help,
    Quit,
}

/// Parse an input line; empty lines yield `None`
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (name, arg) = match line.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (line, ""),
    };

    let command = match (name, arg) {
        ("login", "") => return Err("Usage: login <handle>".to_string()),
        ("login", handle) => Command::Login(handle.to_string()),
        ("logout", "") => Command::Logout,
        ("collections", "") => Command::Collections,
        ("use", "") => return Err("Usage: use <collection>".to_string()),
        ("use", collection) => Command::Use(collection.to_string()),
        ("more", "") => Command::More,
        ("list", "") => Command::List,
        ("select-all", "") => Command::SelectAll,
        ("unselect-all", "") => Command::UnselectAll,
        ("select", "") => return Err("Usage: select <text>".to_string()),
        ("select", text) => Command::Select(text.to_string()),
        ("toggle", number) => match number.parse::<usize>() {
            Ok(n) if n > 0 => Command::Toggle(n),
            _ => return Err("Usage: toggle <number>".to_string()),
        },
        ("show-selected", "on") => Command::ShowSelected(true),
        ("show-selected", "off") => Command::ShowSelected(false),
        ("show-selected", _) => return Err("Usage: show-selected on|off".to_string()),
        ("delete", "") => Command::Delete,
        ("status", "") => Command::Status,
        ("help", "") => Command::Help,
        ("quit" | "exit", "") => Command::Quit,
        _ => return Err(format!("Unknown command '{}', try `help`", line)),
    };
    Ok(Some(command))
}

impl Command {
    /// The action to dispatch, if the command changes anything
    pub fn action(&self, state: &AppState) -> Option<Action> {
        let action = match self {
            Command::Login(handle) => Action::Session(SessionAction::Login {
                handle: handle.clone(),
            }),
            Command::Logout => Action::Session(SessionAction::Logout),
            Command::Collections if state.repo.collections.is_empty() => {
                Action::Records(RecordsAction::LoadCollections)
            }
            Command::Use(collection) => Action::Records(RecordsAction::SelectCollection(
                resolve_collection(state, collection),
            )),
            Command::More => Action::Records(RecordsAction::FetchPage),
            Command::SelectAll => Action::Selection(SelectionAction::SelectAll),
            Command::UnselectAll => Action::Selection(SelectionAction::UnselectAll),
            Command::Select(text) => Action::Selection(SelectionAction::SelectMatching(text.clone())),
            Command::Toggle(number) => Action::Selection(SelectionAction::Toggle(number - 1)),
            Command::ShowSelected(enabled) => {
                Action::Selection(SelectionAction::ShowSelectedOnly(*enabled))
            }
            Command::Delete => Action::Records(RecordsAction::DeleteMarked),
            Command::Quit => Action::Global(GlobalAction::Quit),
            Command::Collections | Command::List | Command::Status | Command::Help => {
                return None
            }
        };
        Some(action)
    }
}

/// A number picks from the loaded collections, anything else is a name
fn resolve_collection(state: &AppState, input: &str) -> String {
    input
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|index| state.repo.collections.get(index))
        .cloned()
        .unwrap_or_else(|| input.to_string())
}
