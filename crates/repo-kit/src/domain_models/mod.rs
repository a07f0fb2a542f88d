//! Domain models
//!
//! Core domain types used throughout the application.
//! These are pure domain concepts, separate from application state.

pub mod notice;
pub mod record_entry;

pub use notice::{Notice, NoticeKind};
pub use record_entry::RecordEntry;
