//! Global actions - not tied to any specific domain

use crate::domain_models::Notice;

#[derive(Debug, Clone)]
pub enum GlobalAction {
    /// Quit the application
    Quit,
    /// Replace the notice shown to the user
    SetNotice(Notice),
    /// Remove the notice
    ClearNotice,
}
