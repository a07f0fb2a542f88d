//! Reducers
//!
//! Pure functions producing the next state from the current state and an
//! action. `app_reducer::reduce` is the root; the others reduce one slice.

pub mod app_reducer;
pub mod records_reducer;
pub mod selection_reducer;
pub mod session_reducer;
