//! Text rendering of the application state

use crate::domain_models::{Notice, NoticeKind};
use crate::state::{AppState, LoginStatus};
use std::fmt::Write;

/// Session, collection and notice lines
///
/// Printed whenever it changes.
pub fn render_status(state: &AppState) -> String {
    let mut out = String::new();

    let session = match &state.session.status {
        LoginStatus::Loading => "Signing in...".to_string(),
        LoginStatus::LoggedOut => "Not signed in, use `login <handle>`".to_string(),
        LoginStatus::AwaitingCallback { handle, url } => format!(
            "Signing in as {}; if the browser did not open, visit:\n  {}",
            handle, url
        ),
        LoginStatus::LoggedIn { handle, did } => format!("Signed in as {} ({})", handle, did),
    };
    let _ = writeln!(out, "{}", session);

    if state.session.is_logged_in() {
        let repo = &state.repo;
        match &repo.collection {
            Some(collection) => {
                let _ = write!(
                    out,
                    "{}: {} of {} records marked",
                    collection,
                    repo.marked_count(),
                    repo.records.len()
                );
                if repo.loading {
                    out.push_str(", loading...");
                } else if repo.has_more() {
                    out.push_str(", `more` available");
                }
                if repo.show_selected_only {
                    out.push_str(" (showing marked only)");
                }
                out.push('\n');
            }
            None if !repo.collections.is_empty() => {
                let _ = writeln!(
                    out,
                    "{} collections, pick one with `use <collection>`",
                    repo.collections.len()
                );
            }
            None => {}
        }
    }

    if let Some(notice) = &state.notice {
        let _ = writeln!(out, "{}", render_notice(notice));
    }
    out
}

pub fn render_notice(notice: &Notice) -> String {
    let prefix = match notice.kind {
        NoticeKind::Progress => "..",
        NoticeKind::Success => "ok",
        NoticeKind::Error => "!!",
    };
    format!("[{}] {}", prefix, notice.message)
}

/// Numbered collection listing
pub fn render_collections(state: &AppState) -> String {
    if state.repo.collections.is_empty() {
        return "No collections loaded\n".to_string();
    }

    let mut out = String::new();
    for (index, collection) in state.repo.collections.iter().enumerate() {
        let marker = if state.repo.collection.as_ref() == Some(collection) {
            "*"
        } else {
            " "
        };
        let _ = writeln!(out, "{} {:>3}. {}", marker, index + 1, collection);
    }
    out
}

/// Visible records with their number for `toggle`
pub fn render_records(state: &AppState) -> String {
    let mut out = String::new();
    for (index, record) in state.repo.visible_records() {
        let mark = if record.marked_for_deletion { "x" } else { " " };
        let _ = writeln!(out, "[{}] #{} {}", mark, index + 1, record.rkey());
        for line in record.content.lines() {
            let _ = writeln!(out, "      {}", line);
        }
    }
    if out.is_empty() {
        out.push_str("No records to show\n");
    }
    out
}

pub fn help_text() -> &'static str {
    "\
Commands:
  login <handle>        sign in (opens the browser)
  logout                sign out
  collections           list the collections of your repository
  use <collection|n>    switch collection and load its first page
  more                  load the next page
  list                  show the loaded records
  select-all            mark every loaded record
  unselect-all          unmark every loaded record
  select <text>         mark records containing <text>
  toggle <n>            flip the mark of record #n
  show-selected on|off  only list marked records
  delete                delete all marked records
  status                show the current state
  help                  show this help
  quit                  exit
"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_models::RecordEntry;

    fn logged_in() -> AppState {
        let mut state = AppState::default();
        state.session.status = LoginStatus::LoggedIn {
            did: "did:plc:alice".parse().unwrap(),
            handle: "alice.test".to_string(),
        };
        state
    }

    #[test]
    fn test_status_shows_handle_and_counts() {
        let mut state = logged_in();
        state.repo.collection = Some("app.bsky.feed.like".to_string());
        state.repo.records = vec![
            RecordEntry::new("at://a/c/1", "{}"),
            RecordEntry::new("at://a/c/2", "{}"),
        ];
        state.repo.records[0].marked_for_deletion = true;
        state.repo.cursor = Some("c".to_string());
        state.notice = Some(Notice::success("Deleted 2 records"));

        assert_eq!(
            render_status(&state),
            "Signed in as alice.test (did:plc:alice)\n\
             app.bsky.feed.like: 1 of 2 records marked, `more` available\n\
             [ok] Deleted 2 records\n"
        );
    }

    #[test]
    fn test_status_prints_authorization_url() {
        let mut state = AppState::default();
        state.session.status = LoginStatus::AwaitingCallback {
            handle: "alice.test".to_string(),
            url: "https://auth.example.com/authorize".to_string(),
        };
        assert!(render_status(&state).contains("https://auth.example.com/authorize"));
    }

    #[test]
    fn test_records_numbering_follows_full_list() {
        let mut state = logged_in();
        state.repo.records = vec![
            RecordEntry::new("at://a/c/aaa", "{}"),
            RecordEntry::new("at://a/c/bbb", "{}"),
        ];
        state.repo.records[1].marked_for_deletion = true;
        state.repo.show_selected_only = true;

        assert_eq!(render_records(&state), "[x] #2 bbb\n      {}\n");
    }

    #[test]
    fn test_collections_marks_active() {
        let mut state = logged_in();
        state.repo.collections = vec!["a.b.c".to_string(), "d.e.f".to_string()];
        state.repo.collection = Some("d.e.f".to_string());
        assert_eq!(render_collections(&state), "    1. a.b.c\n*   2. d.e.f\n");
    }
}
