//! Presence values and configuration.

use std::fmt;

/// Configuration for presence tracking.
#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// How long (in seconds) a disconnected player may stay disconnected
    /// before they are removed from their room.
    ///
    /// Default: 30 seconds. 0 means "remove on the next sweep".
    pub reconnect_grace_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            reconnect_grace_secs: 30,
        }
    }
}

/// A player's connection state for one room.
///
/// ```text
///   Unknown ──(connect)──→ Connected ──(disconnect)──→ Disconnected
///                              ↑                            │
///                              └────────(reconnect)─────────┘
/// ```
///
/// `Unknown` means the tracker has never heard of the pair (or forgot it
/// after a cleanup).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Connected,
    Disconnected,
    Unknown,
}

impl fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
