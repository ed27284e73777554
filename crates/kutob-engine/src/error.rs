//! Error types for the engine layer.

use kutob_presence::PresenceError;
use kutob_protocol::{RoomCode, Username};

/// Errors from a [`RoomStore`](crate::RoomStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store failed.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A room with this code already exists.
    #[error("room {0} already exists")]
    DuplicateRoom(RoomCode),

    #[error("room {0} does not exist")]
    MissingRoom(RoomCode),

    /// The room has reached its player limit.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The room's game has started; membership is frozen.
    #[error("room {0} is closed to new members")]
    Closed(RoomCode),

    /// The player already belongs to a room.
    #[error("player {0} is already in room {1}")]
    AlreadyInRoom(Username, RoomCode),
}

/// Errors reported to whoever submitted an action.
///
/// Everything except `Store`, `Presence` and `Unavailable` is a rejection
/// of the request itself. A rejected request never mutates state.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    #[error("player {0} not found")]
    PlayerNotFound(Username),

    /// The action was submitted out of turn, or in a phase that does not
    /// accept it.
    #[error("it is not {0}'s turn")]
    NotYourTurn(Username),

    #[error("invalid target {target}: {reason}")]
    InvalidTarget {
        target: Username,
        reason: &'static str,
    },

    #[error("the game in room {0} has already ended")]
    GameAlreadyEnded(RoomCode),

    #[error("room {code} needs {required} players to start, has {present}")]
    InsufficientPlayers {
        code: RoomCode,
        required: usize,
        present: usize,
    },

    #[error("the game in room {0} has already started")]
    AlreadyStarted(RoomCode),

    /// The room's controller has stopped or its channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Presence(#[from] PresenceError),
}

impl GameError {
    pub(crate) fn invalid_target(target: &Username, reason: &'static str) -> Self {
        GameError::InvalidTarget {
            target: target.clone(),
            reason,
        }
    }

    /// `true` for errors caused by the request rather than by the
    /// infrastructure.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            GameError::Store(_) | GameError::Presence(_) | GameError::Unavailable(_)
        )
    }
}
