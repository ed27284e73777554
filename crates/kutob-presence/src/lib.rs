//! Presence tracking for Kutob.
//!
//! The engine only needs to know one thing about a player's connection:
//! are they connected to this room right now? This crate answers it.
//!
//! 1. **The seam**: the [`PresenceTracker`] trait, so production can keep
//!    presence in a fast external key/value store.
//! 2. **In-memory tracker**: [`PresenceMap`], used by tests, the demo and
//!    single-process deployments.
//! 3. **Grace expiry**: finding players who have been disconnected for
//!    longer than [`PresenceConfig::reconnect_grace_secs`].
//!
//! Presence is eventually consistent. A reconnect that lands before a
//! cleanup finishes wins; one that lands after does not. That window is
//! accepted.

mod error;
mod status;
mod tracker;

pub use error::PresenceError;
pub use status::{PresenceConfig, PresenceStatus};
pub use tracker::{PresenceMap, PresenceTracker};
