//! Error types for the presence layer.

/// Errors a presence backend can report.
///
/// The in-memory [`PresenceMap`](crate::PresenceMap) never fails; these
/// exist for trackers that talk to an external store.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The backing store could not be reached or answered with garbage.
    #[error("presence backend failed: {0}")]
    Backend(String),
}
