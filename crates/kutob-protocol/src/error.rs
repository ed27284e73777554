//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// Each crate in Kutob defines its own error enum, so a `ProtocolError`
/// always means a payload could not be encoded, decoded or interpreted.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A string did not name a known role.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// A number did not name a phase of the day/night cycle.
    #[error("unknown phase: {0}")]
    UnknownPhase(u8),

    /// The payload decoded but violates protocol rules.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
