//! Event types
//!
//! Events represent facts that have occurred. They run through the
//! middleware chain but never reach the reducer.
//!
//! Events use past tense or descriptive names indicating something has
//! happened (`SessionReady`, not `StartSession`).

use atp_client::Did;

#[derive(Debug, Clone)]
pub enum Event {
    /// A session is active and the repository can be queried
    SessionReady { did: Did },

    /// The active session was dropped
    SessionEnded,
}
