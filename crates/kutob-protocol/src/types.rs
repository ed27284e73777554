//! Core vocabulary types: identities, roles, phases and topics.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The short alphanumeric code that identifies a room.
///
/// A newtype rather than a bare `String` so a room code can never be passed
/// where a username is expected. `#[serde(transparent)]` keeps it a plain
/// JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A player's unique username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(pub String);

impl Username {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The three antagonist sub-roles. They share the night kill and can see
/// each other; the sub-role is flavour chosen at random during assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AswangKind {
    Mandurugo,
    Manananggal,
    Berbalang,
}

impl AswangKind {
    /// Every sub-role, in a fixed order.
    pub const ALL: [AswangKind; 3] = [
        AswangKind::Mandurugo,
        AswangKind::Manananggal,
        AswangKind::Berbalang,
    ];
}

/// Which side a role plays for. Win conditions count alive players per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Faction {
    Villagers,
    Aswang,
}

/// A player's role for the duration of one game.
///
/// Serialized as the lowercase strings clients already know
/// (`"mangangaso"`, `"aswang-manananggal"`, ...), which is why the serde
/// impls go through `String` instead of deriving per variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    /// Protector. Shields one player per night; every few cycles may kill.
    Mangangaso,
    /// Seer. Privately learns one player's role per night.
    Manghuhula,
    /// Healer. Cancels a pending night kill.
    Babaylan,
    /// Antagonist.
    Aswang(AswangKind),
    /// Taumbayan: no night action.
    Villager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Mangangaso => "mangangaso",
            Role::Manghuhula => "manghuhula",
            Role::Babaylan => "babaylan",
            Role::Aswang(AswangKind::Mandurugo) => "aswang-mandurugo",
            Role::Aswang(AswangKind::Manananggal) => "aswang-manananggal",
            Role::Aswang(AswangKind::Berbalang) => "aswang-berbalang",
            Role::Villager => "villager",
        }
    }

    pub fn faction(&self) -> Faction {
        match self {
            Role::Aswang(_) => Faction::Aswang,
            _ => Faction::Villagers,
        }
    }

    pub fn is_aswang(&self) -> bool {
        matches!(self, Role::Aswang(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mangangaso" => Ok(Role::Mangangaso),
            "manghuhula" => Ok(Role::Manghuhula),
            "babaylan" => Ok(Role::Babaylan),
            "aswang-mandurugo" => Ok(Role::Aswang(AswangKind::Mandurugo)),
            "aswang-manananggal" => Ok(Role::Aswang(AswangKind::Manananggal)),
            "aswang-berbalang" => Ok(Role::Aswang(AswangKind::Berbalang)),
            "villager" | "taumbayan" => Ok(Role::Villager),
            other => Err(ProtocolError::UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The nine states of the day/night cycle.
///
/// Clients know phases by number, so serde maps each variant to its `u8`.
/// Transitions only ever move forward, except for the loop from
/// [`Phase::RoundEnd`] back to [`Phase::NightBegins`] while nobody has won.
///
/// ```text
/// Lobby → NightBegins → NightActions → DayBegins → DayAnnouncement
///       → Discussion → Voting → VoteResult → RoundEnd ─┐
///            ↑                                         │
///            └─────────────── (no winner) ─────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Phase {
    Lobby = 1,
    NightBegins = 2,
    NightActions = 3,
    DayBegins = 4,
    DayAnnouncement = 5,
    Discussion = 6,
    Voting = 7,
    VoteResult = 8,
    RoundEnd = 9,
}

impl Phase {
    pub fn number(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Lobby => "Lobby",
            Phase::NightBegins => "NightBegins",
            Phase::NightActions => "NightActions",
            Phase::DayBegins => "DayBegins",
            Phase::DayAnnouncement => "DayAnnouncement",
            Phase::Discussion => "Discussion",
            Phase::Voting => "Voting",
            Phase::VoteResult => "VoteResult",
            Phase::RoundEnd => "RoundEnd",
        };
        write!(f, "{}({})", name, self.number())
    }
}

impl TryFrom<u8> for Phase {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Phase::Lobby),
            2 => Ok(Phase::NightBegins),
            3 => Ok(Phase::NightActions),
            4 => Ok(Phase::DayBegins),
            5 => Ok(Phase::DayAnnouncement),
            6 => Ok(Phase::Discussion),
            7 => Ok(Phase::Voting),
            8 => Ok(Phase::VoteResult),
            9 => Ok(Phase::RoundEnd),
            other => Err(ProtocolError::UnknownPhase(other)),
        }
    }
}

impl From<Phase> for u8 {
    fn from(phase: Phase) -> Self {
        phase.number()
    }
}

// ---------------------------------------------------------------------------
// Winners
// ---------------------------------------------------------------------------

/// The final result of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winners {
    Villagers,
    Aswang,
    /// Both sides eliminated at once, or the room's session failed.
    Tie,
}

impl fmt::Display for Winners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winners::Villagers => write!(f, "Villagers"),
            Winners::Aswang => write!(f, "Aswang"),
            Winners::Tie => write!(f, "Tie"),
        }
    }
}

// ---------------------------------------------------------------------------
// Topic
// ---------------------------------------------------------------------------

/// Where a broadcast is delivered.
///
/// A room topic reaches every member; a player topic reaches one member
/// of one room (role reveals, turn prompts, seer results).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Room(RoomCode),
    Player { username: Username, room: RoomCode },
}

impl Topic {
    pub fn room(code: &RoomCode) -> Self {
        Topic::Room(code.clone())
    }

    pub fn player(username: &Username, code: &RoomCode) -> Self {
        Topic::Player {
            username: username.clone(),
            room: code.clone(),
        }
    }
}

/// Renders as `room:<code>` or `player:<username>:<code>`.
impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Room(code) => write!(f, "room:{code}"),
            Topic::Player { username, room } => write!(f, "player:{username}:{room}"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
