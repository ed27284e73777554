//! Rooms, players, and the per-room snapshot the rules operate on.

use std::collections::{BTreeMap, BTreeSet};

use kutob_protocol::{Faction, Phase, Role, RoomCode, Username, Winners};
use serde::{Deserialize, Serialize};

use crate::PlayerQuery;

/// Number of antagonists for a room of `player_limit` players.
///
/// | players | aswang |
/// |---------|--------|
/// | 5–7     | 1      |
/// | 8–9     | 2      |
/// | 10      | 3      |
///
/// Limits outside 5..=10 are clamped into that range first.
pub fn aswang_limit_for(player_limit: usize) -> usize {
    match player_limit.clamp(5, 10) {
        5..=7 => 1,
        8 | 9 => 2,
        _ => 3,
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub owner: Username,
    pub player_limit: usize,
    pub aswang_limit: usize,
    pub phase: Phase,
    pub cycle: u32,
    pub day_count: u32,
    pub night_count: u32,
    pub winners: Option<Winners>,
    pub has_started: bool,
    /// Never goes back to `false`. Use [`Room::end`].
    pub has_ended: bool,
    pub members: BTreeSet<Username>,
    /// Who may act right now. Only set during night actions.
    pub current_actor: Option<Username>,
}

impl Room {
    pub fn new(code: RoomCode, owner: Username, player_limit: usize) -> Self {
        let player_limit = player_limit.clamp(5, 10);
        let mut members = BTreeSet::new();
        members.insert(owner.clone());
        Self {
            code,
            owner,
            player_limit,
            aswang_limit: aswang_limit_for(player_limit),
            phase: Phase::Lobby,
            cycle: 1,
            day_count: 0,
            night_count: 0,
            winners: None,
            has_started: false,
            has_ended: false,
            members,
            current_actor: None,
        }
    }

    /// Started and not yet ended.
    pub fn is_running(&self) -> bool {
        self.has_started && !self.has_ended
    }

    /// Members needed before the game may start.
    pub fn required_players(&self, min_players: usize) -> usize {
        min_players.max(4 + self.aswang_limit)
    }

    /// Marks the game over. Keeps the first recorded winner.
    pub fn end(&mut self, winners: Winners) {
        if self.winners.is_none() {
            self.winners = Some(winners);
        }
        self.has_ended = true;
        self.current_actor = None;
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Markers that only live for one night (and the following day's vote).
///
/// Replaced wholesale with `RoundState::default()` when night actions
/// begin, so no marker can leak into the next round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    pub is_protected: bool,
    /// Scheduled to die at dawn unless cured.
    pub night_target: bool,
    pub vote_target: Option<Username>,
    /// Already acted this night.
    pub turn_done: bool,
}

/// Protector bookkeeping that survives across nights.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectorState {
    /// Disabled by an aswang hitting a protected player.
    pub skip_turn: bool,
    /// The night on which the protector sits out.
    pub night_skip: u32,
    /// Lethal mode: the next action kills instead of shields.
    pub can_execute: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub username: Username,
    pub room: Option<RoomCode>,
    pub role: Option<Role>,
    /// `false` once killed at night.
    pub alive: bool,
    /// `true` once voted out.
    pub eliminated_from_game: bool,
    pub in_lobby: bool,
    pub in_game: bool,
    pub round: RoundState,
    pub protector: ProtectorState,
    /// Night on which the player died, 0 if never.
    pub eliminated_on_night: u32,
    /// Night on which the healer cured the player, 0 if never.
    pub revived_on_night: u32,
}

impl Player {
    pub fn new(username: Username) -> Self {
        Self {
            username,
            room: None,
            role: None,
            alive: true,
            eliminated_from_game: false,
            in_lobby: true,
            in_game: false,
            round: RoundState::default(),
            protector: ProtectorState::default(),
            eliminated_on_night: 0,
            revived_on_night: 0,
        }
    }

    /// Alive and not voted out: may act, vote and be targeted.
    pub fn in_play(&self) -> bool {
        self.alive && !self.eliminated_from_game
    }

    pub fn is_aswang(&self) -> bool {
        self.role.is_some_and(|r| r.is_aswang())
    }

    pub fn faction(&self) -> Option<Faction> {
        self.role.map(|r| r.faction())
    }

    /// Clears every game field, as when a player leaves their room.
    pub fn reset_to_lobby(&mut self) {
        self.role = None;
        self.alive = true;
        self.eliminated_from_game = false;
        self.round = RoundState::default();
        self.protector = ProtectorState::default();
        self.eliminated_on_night = 0;
        self.revived_on_night = 0;
        self.in_game = false;
        self.in_lobby = false;
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

/// A room together with its members, loaded for one read-modify-write.
///
/// Players are keyed by username, so every iteration order is the same
/// sorted order on every node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub room: Room,
    pub players: BTreeMap<Username, Player>,
}

impl Game {
    pub fn new(room: Room, players: impl IntoIterator<Item = Player>) -> Self {
        let players = players
            .into_iter()
            .map(|p| (p.username.clone(), p))
            .collect();
        Self { room, players }
    }

    pub fn code(&self) -> &RoomCode {
        &self.room.code
    }

    pub fn player(&self, username: &Username) -> Option<&Player> {
        self.players.get(username)
    }

    pub fn player_mut(&mut self, username: &Username) -> Option<&mut Player> {
        self.players.get_mut(username)
    }

    pub fn matching(&self, query: PlayerQuery) -> impl Iterator<Item = &Player> {
        self.players.values().filter(move |p| query.matches(p))
    }

    /// Usernames of every player still in play, sorted.
    pub fn roster(&self) -> Vec<Username> {
        self.matching(PlayerQuery::InPlay)
            .map(|p| p.username.clone())
            .collect()
    }

    /// The first player holding `role`, alive or not.
    pub fn holder_of_mut(&mut self, role: Role) -> Option<&mut Player> {
        self.players.values_mut().find(|p| p.role == Some(role))
    }

    /// Alive, non-eliminated players per faction: `(aswang, villagers)`.
    pub fn faction_counts(&self) -> (usize, usize) {
        self.matching(PlayerQuery::InPlay)
            .fold((0, 0), |(aswang, villagers), p| match p.faction() {
                Some(Faction::Aswang) => (aswang + 1, villagers),
                Some(Faction::Villagers) => (aswang, villagers + 1),
                None => (aswang, villagers),
            })
    }
}

// =========================================================================
// Tests
// =========================================================================
