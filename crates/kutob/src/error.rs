//! Unified error type for Kutob.

use kutob_engine::{GameError, StoreError};
use kutob_presence::PresenceError;
use kutob_protocol::ProtocolError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` attributes let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum KutobError {
    /// A payload could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The presence backend failed.
    #[error(transparent)]
    Presence(#[from] PresenceError),

    /// The room/player store failed or refused a lobby operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The engine rejected or could not run a game operation.
    #[error(transparent)]
    Game(#[from] GameError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use kutob_protocol::{RoomCode, Username};

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let kutob_err: KutobError = err.into();
        assert!(matches!(kutob_err, KutobError::Protocol(_)));
        assert!(kutob_err.to_string().contains("bad"));
    }

    #[test]
    fn test_from_presence_error() {
        let err = PresenceError::Backend("down".into());
        let kutob_err: KutobError = err.into();
        assert!(matches!(kutob_err, KutobError::Presence(_)));
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::RoomFull(RoomCode::new("ROOM01"));
        let kutob_err: KutobError = err.into();
        assert!(matches!(kutob_err, KutobError::Store(_)));
        assert!(kutob_err.to_string().contains("ROOM01"));
    }

    #[test]
    fn test_from_game_error() {
        let err = GameError::NotYourTurn(Username::new("ana"));
        let kutob_err: KutobError = err.into();
        assert!(matches!(kutob_err, KutobError::Game(_)));
    }
}
