//! Actions module
//!
//! This module defines all actions in the application using a tagged action
//! architecture. Actions are organized by domain:
//! - Events that re-enter the middleware chain
//! - Global actions that affect the entire application
//! - Session, records and selection actions

pub mod event;
pub mod global;
pub mod records;
pub mod selection;
pub mod session;

pub use event::Event;
pub use global::GlobalAction;
pub use records::RecordsAction;
pub use selection::SelectionAction;
pub use session::SessionAction;

/// Root action enum - tagged by domain
#[derive(Debug, Clone)]
pub enum Action {
    /// Events are facts/observations that only middleware reacts to.
    /// Use `Action::event(Event::X)` to create - ensures visibility at call site.
    Event(Event),

    /// Global application actions
    Global(GlobalAction),

    /// Sign-in and sign-out
    Session(SessionAction),

    /// Collections, record pages and deletion
    Records(RecordsAction),

    /// Marking records for deletion
    Selection(SelectionAction),

    /// No-op action
    None,
}

impl Action {
    /// Factory method for creating events.
    ///
    /// Using this factory makes event creation visually distinct at the call
    /// site, signaling that the action is meant for middleware only.
    pub fn event(event: Event) -> Action {
        Action::Event(event)
    }
}
