//! Notice model
//!
//! The single line of feedback shown to the user (progress, result, error).

/// A user-facing notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Notice message
    pub message: String,
    /// Type of notice
    pub kind: NoticeKind,
}

impl Notice {
    /// Create a progress notice for an operation in flight
    pub fn progress(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Progress,
        }
    }

    /// Create a success notice
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Success,
        }
    }

    /// Create an error notice
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: NoticeKind::Error,
        }
    }
}

/// Type of notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// An operation is running
    Progress,
    /// An operation completed
    Success,
    /// An operation failed
    Error,
}
