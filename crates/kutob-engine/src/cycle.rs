//! The phase machine: entry actions for every phase of the day/night cycle.
//!
//! Every function here takes a loaded [`Game`], mutates it, queues the
//! resulting broadcasts on an [`Outbox`], and returns a [`Schedule`]
//! telling the room actor what timer to run next. Nothing here awaits,
//! which keeps every transition atomic with respect to the room.
//!
//! ```text
//!  start ─→ 1 Lobby ─(10s)→ 2 NightBegins ─(5s)→ 3 NightActions
//!                              ↑                    │ (all actors done)
//!                              │                    ↓
//!          9 RoundEnd ←(10s)─ 8 VoteResult    4 DayBegins
//!              │                ↑                   │ (5s)
//!              │           (45s) 7 Voting          5 DayAnnouncement
//!              │                ↑                   │ (5s)
//!              │                └── 6 Discussion ←──┘
//!              └─(winner)→ terminal                (60s)
//! ```
//!
//! A winner found at phase 5 or 8 jumps to the result announcement and
//! ends the game. Nothing is scheduled after that.

use kutob_protocol::{GameEvent, Phase, Role, Username, Winners};
use rand::Rng;

use crate::night::{self, NightEffect, Turn};
use crate::{
    EngineConfig, Game, GameError, Outbox, Player, VoteResult, assign_roles,
    check_winner, resolve_votes, vote_counts,
};

/// What the room actor should do with its countdown after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Run a countdown of this many ticks, then call
    /// [`on_countdown_elapsed`].
    Countdown(u32),
    /// No timer: the phase ends when the last night actor is done.
    AwaitActions,
    /// The game is over. Nothing more runs.
    Halt,
}

const DISABLED_PROTECTOR: &str = "The mangangaso was rendered ineffective by the aswang tonight";

// ---------------------------------------------------------------------------
// Start
// ---------------------------------------------------------------------------

/// Deals roles and starts the lobby countdown.
///
/// # Errors
/// `GameAlreadyEnded`, `AlreadyStarted`, or `InsufficientPlayers` when the
/// room has fewer than `max(min_players, 4 + aswang_limit)` members.
pub fn start_game<R: Rng + ?Sized>(
    game: &mut Game,
    config: &EngineConfig,
    rng: &mut R,
    out: &mut Outbox,
) -> Result<Schedule, GameError> {
    let code = game.code().clone();
    if game.room.has_ended {
        return Err(GameError::GameAlreadyEnded(code));
    }
    if game.room.has_started {
        return Err(GameError::AlreadyStarted(code));
    }
    let required = game.room.required_players(config.min_players);
    let present = game.players.len();
    if present < required {
        return Err(GameError::InsufficientPlayers {
            code,
            required,
            present,
        });
    }

    let dealt = assign_roles(game, rng);
    game.room.has_started = true;
    game.room.phase = Phase::Lobby;

    out.room(GameEvent::GameStart {
        message: "GAME START".into(),
    });
    for (username, role) in &dealt {
        out.player(username, GameEvent::RoleShow { role: *role });
    }
    tracing::info!(room = %code, players = present, "game started");
    Ok(countdown(config, Phase::Lobby))
}

// ---------------------------------------------------------------------------
// Timed transitions
// ---------------------------------------------------------------------------

/// Moves the room on after its countdown ran out.
pub fn on_countdown_elapsed(game: &mut Game, config: &EngineConfig, out: &mut Outbox) -> Schedule {
    if game.room.has_ended {
        return Schedule::Halt;
    }
    match game.room.phase {
        Phase::Lobby | Phase::RoundEnd => enter_night_begins(game, config, out),
        Phase::NightBegins => enter_night_actions(game, config, out),
        Phase::NightActions => Schedule::AwaitActions,
        Phase::DayBegins => enter_day_announcement(game, config, out),
        Phase::DayAnnouncement => enter_discussion(game, config, out),
        Phase::Discussion => enter_voting(game, config, out),
        Phase::Voting => enter_vote_result(game, config, out),
        Phase::VoteResult => enter_round_end(game, config, out),
    }
}

fn countdown(config: &EngineConfig, phase: Phase) -> Schedule {
    config
        .timings
        .countdown_for(phase)
        .map(Schedule::Countdown)
        .unwrap_or(Schedule::AwaitActions)
}

fn set_phase(game: &mut Game, phase: Phase) {
    tracing::info!(room = %game.code(), from = %game.room.phase, to = %phase, "phase change");
    game.room.phase = phase;
}

fn enter_night_begins(game: &mut Game, config: &EngineConfig, out: &mut Outbox) -> Schedule {
    set_phase(game, Phase::NightBegins);
    game.room.night_count += 1;
    out.room(GameEvent::NextPhase {
        phase: Phase::NightBegins,
    });
    out.room(GameEvent::NightCount {
        count: game.room.night_count,
    });
    countdown(config, Phase::NightBegins)
}

fn enter_night_actions(game: &mut Game, config: &EngineConfig, out: &mut Outbox) -> Schedule {
    set_phase(game, Phase::NightActions);
    let start = night::begin_night(game);

    if !night::any_aswang_in_play(game) {
        tracing::info!(room = %game.code(), "no aswang in play, night ends at once");
        out.room(GameEvent::NextPhase {
            phase: Phase::NightActions,
        });
        return enter_day_begins(game, config, out);
    }

    let Some(turn) = night::next_actor(game) else {
        return fail(game, "aswang in play but nobody can act", out);
    };
    game.room.current_actor = Some(turn.player.clone());

    out.room(GameEvent::UpdateRoleTurn {
        role: turn.role,
        player: turn.player.clone(),
        message: start
            .disabled_protector
            .as_ref()
            .map(|_| DISABLED_PROTECTOR.to_string()),
    });
    out.room(GameEvent::NextPhase {
        phase: Phase::NightActions,
    });
    out.room(GameEvent::AlivePlayersList {
        player_list: game.roster(),
    });
    if let Some(protector) = &start.disabled_protector {
        out.player(
            protector,
            GameEvent::TurnSkipped {
                message: "You were rendered ineffective by the aswang. You cannot protect anyone tonight."
                    .into(),
            },
        );
    }
    prompt(game, &turn, out);
    Schedule::AwaitActions
}

fn enter_day_begins(game: &mut Game, config: &EngineConfig, out: &mut Outbox) -> Schedule {
    game.room.current_actor = None;
    set_phase(game, Phase::DayBegins);
    game.room.day_count += 1;
    game.room.cycle += 1;

    if game.room.cycle % config.lethal_cycle_interval.max(1) == 0 {
        if let Some(protector) = game.holder_of_mut(Role::Mangangaso) {
            if protector.in_play() {
                protector.protector.can_execute = true;
                tracing::info!(
                    room = %game.room.code,
                    cycle = game.room.cycle,
                    "protector lethal action unlocked"
                );
            }
        }
    }

    out.room(GameEvent::NextPhase {
        phase: Phase::DayBegins,
    });
    out.room(GameEvent::DayCount {
        count: game.room.day_count,
    });
    countdown(config, Phase::DayBegins)
}

fn enter_day_announcement(game: &mut Game, config: &EngineConfig, out: &mut Outbox) -> Schedule {
    set_phase(game, Phase::DayAnnouncement);
    let night = game.room.night_count;

    for player in game.players.values_mut() {
        if player.in_play() && player.round.night_target {
            player.alive = false;
            player.eliminated_on_night = night;
        }
    }
    let victims: Vec<Username> = game
        .players
        .values()
        .filter(|p| night > 0 && p.eliminated_on_night == night)
        .map(|p| p.username.clone())
        .collect();
    let message = match victims.len() {
        0 => "There were no victims during the night".to_string(),
        1 => "There was 1 victim during the night".to_string(),
        n => format!("There were {n} victims during the night"),
    };
    tracing::info!(room = %game.code(), night, victims = victims.len(), "night casualties applied");

    out.room(GameEvent::NextPhase {
        phase: Phase::DayAnnouncement,
    });
    out.room(GameEvent::Announce {
        player_count: victims.len(),
        players: victims,
        message,
    });

    match check_winner(game) {
        Some(winners) => finish(game, winners, out),
        None => countdown(config, Phase::DayAnnouncement),
    }
}

fn enter_discussion(game: &mut Game, config: &EngineConfig, out: &mut Outbox) -> Schedule {
    set_phase(game, Phase::Discussion);
    out.room(GameEvent::NextPhase {
        phase: Phase::Discussion,
    });
    out.room(GameEvent::AlivePlayersList {
        player_list: game.roster(),
    });
    countdown(config, Phase::Discussion)
}

fn enter_voting(game: &mut Game, config: &EngineConfig, out: &mut Outbox) -> Schedule {
    set_phase(game, Phase::Voting);
    for player in game.players.values_mut() {
        player.round.vote_target = None;
    }
    out.room(GameEvent::NextPhase {
        phase: Phase::Voting,
    });
    out.room(GameEvent::AlivePlayersList {
        player_list: game.roster(),
    });
    countdown(config, Phase::Voting)
}

fn enter_vote_result(game: &mut Game, config: &EngineConfig, out: &mut Outbox) -> Schedule {
    set_phase(game, Phase::VoteResult);
    let result = resolve_votes(game);
    tracing::info!(room = %game.code(), ?result, "votes tallied");

    out.room(GameEvent::NextPhase {
        phase: Phase::VoteResult,
    });
    out.room(match result {
        VoteResult::Eliminated {
            player,
            was_aswang: true,
        } => GameEvent::IsAswang {
            eliminated: player,
            message: "The player eliminated IS an aswang".into(),
        },
        VoteResult::Eliminated {
            player,
            was_aswang: false,
        } => GameEvent::NotAswang {
            eliminated: player,
            message: "The player eliminated is NOT an aswang".into(),
        },
        VoteResult::Tie => GameEvent::VoteTie {
            message: "There was a TIE among players, no one will be eliminated".into(),
        },
    });

    match check_winner(game) {
        Some(winners) => finish(game, winners, out),
        None => countdown(config, Phase::VoteResult),
    }
}

fn enter_round_end(game: &mut Game, config: &EngineConfig, out: &mut Outbox) -> Schedule {
    set_phase(game, Phase::RoundEnd);
    match game.room.winners {
        Some(_) => Schedule::Halt,
        None => enter_night_begins(game, config, out),
    }
}

// ---------------------------------------------------------------------------
// Endings
// ---------------------------------------------------------------------------

/// Records the winner and announces it. Always [`Schedule::Halt`].
pub fn finish(game: &mut Game, winners: Winners, out: &mut Outbox) -> Schedule {
    game.room.end(winners);
    if game.room.phase != Phase::VoteResult {
        game.room.phase = Phase::VoteResult;
        out.room(GameEvent::NextPhase {
            phase: Phase::VoteResult,
        });
    }
    out.room(GameEvent::AnnounceWinners { winners });
    game.room.phase = Phase::RoundEnd;
    out.room(GameEvent::NextPhase {
        phase: Phase::RoundEnd,
    });
    tracing::info!(room = %game.code(), %winners, "game over");
    Schedule::Halt
}

/// Ends the game early at the owner's request. No winner is recorded.
///
/// # Errors
/// `GameAlreadyEnded` if the game is already over.
pub fn abort(game: &mut Game, out: &mut Outbox) -> Result<Schedule, GameError> {
    if game.room.has_ended {
        return Err(GameError::GameAlreadyEnded(game.code().clone()));
    }
    game.room.has_ended = true;
    game.room.current_actor = None;
    game.room.phase = Phase::RoundEnd;
    out.room(GameEvent::GameAborted {
        message: "The game was ended by the room owner".into(),
    });
    tracing::info!(room = %game.code(), "game aborted");
    Ok(Schedule::Halt)
}

/// Ends a room whose state no longer makes sense, as a tie.
pub fn fail(game: &mut Game, reason: &str, out: &mut Outbox) -> Schedule {
    tracing::error!(room = %game.code(), phase = %game.room.phase, reason, "inconsistent room state, ending game");
    game.room.end(Winners::Tie);
    game.room.phase = Phase::RoundEnd;
    out.room(GameEvent::AnnounceWinners {
        winners: Winners::Tie,
    });
    out.room(GameEvent::NextPhase {
        phase: Phase::RoundEnd,
    });
    Schedule::Halt
}

// ---------------------------------------------------------------------------
// Night turns
// ---------------------------------------------------------------------------

/// The player holding the night turn, with their role.
pub fn current_turn(game: &Game) -> Option<Turn> {
    let username = game.room.current_actor.as_ref()?;
    let role = game.player(username)?.role?;
    Some(Turn {
        player: username.clone(),
        role,
    })
}

fn prompt(game: &Game, turn: &Turn, out: &mut Outbox) {
    out.player(
        &turn.player,
        GameEvent::PlayerSelectTarget {
            role: turn.role,
            targets: night::eligible_targets(game, turn),
        },
    );
}

/// Hands the turn to the next eligible actor, or ends the night.
fn advance_turn(game: &mut Game, config: &EngineConfig, out: &mut Outbox) -> Schedule {
    match night::next_actor(game) {
        Some(turn) => {
            game.room.current_actor = Some(turn.player.clone());
            out.room(GameEvent::UpdateRoleTurn {
                role: turn.role,
                player: turn.player.clone(),
                message: None,
            });
            prompt(game, &turn, out);
            Schedule::AwaitActions
        }
        None => {
            tracing::info!(room = %game.code(), night = game.room.night_count, "night actions complete");
            enter_day_begins(game, config, out)
        }
    }
}

/// Applies a night action from the current actor and passes the turn on.
///
/// # Errors
/// `GameAlreadyEnded` after the game ended, `NotYourTurn` outside night
/// actions, plus everything [`night::apply_night_action`] rejects. On error
/// `game` and `out` are untouched.
pub fn submit_action(
    game: &mut Game,
    config: &EngineConfig,
    actor: &Username,
    role: Role,
    target: &Username,
    out: &mut Outbox,
) -> Result<Schedule, GameError> {
    if game.room.has_ended {
        return Err(GameError::GameAlreadyEnded(game.code().clone()));
    }
    if !game.room.has_started || game.room.phase != Phase::NightActions {
        return Err(GameError::NotYourTurn(actor.clone()));
    }

    let effect = night::apply_night_action(game, actor, role, target)?;
    if let NightEffect::Revealed { target, role } = &effect {
        out.player(
            actor,
            GameEvent::GuessPicked {
                target: target.clone(),
                role: *role,
                message: format!("{target}'s role is {role}"),
            },
        );
    }
    game.room.current_actor = None;
    Ok(advance_turn(game, config, out))
}

/// Skips `username`'s turn if they hold it. `None` if nothing changed.
pub fn skip_current_turn(
    game: &mut Game,
    username: &Username,
    config: &EngineConfig,
    out: &mut Outbox,
) -> Option<Schedule> {
    if !game.room.is_running() || game.room.phase != Phase::NightActions {
        return None;
    }
    if !night::skip_turn(game, username) {
        return None;
    }
    tracing::info!(room = %game.code(), player = %username, "turn skipped");
    Some(advance_turn(game, config, out))
}

/// Re-sends a reconnecting player their role and, if the turn is theirs,
/// their target prompt.
pub fn resend_private_state(game: &Game, username: &Username, out: &mut Outbox) {
    if !game.room.is_running() {
        return;
    }
    if let Some(role) = game.player(username).and_then(|p| p.role) {
        out.player(username, GameEvent::RoleShow { role });
    }
    if game.room.phase == Phase::NightActions {
        if let Some(turn) = current_turn(game).filter(|t| &t.player == username) {
            prompt(game, &turn, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Votes and leaving
// ---------------------------------------------------------------------------

/// Records `voter`'s ballot, replacing any earlier one.
///
/// # Errors
/// `GameAlreadyEnded`; `NotYourTurn` outside the voting phase;
/// `PlayerNotFound` for unknown voter or target; `InvalidTarget` if either
/// is out of play.
pub fn vote(
    game: &mut Game,
    voter: &Username,
    target: &Username,
    out: &mut Outbox,
) -> Result<(), GameError> {
    if game.room.has_ended {
        return Err(GameError::GameAlreadyEnded(game.code().clone()));
    }
    if game.room.phase != Phase::Voting {
        return Err(GameError::NotYourTurn(voter.clone()));
    }
    let voter_in_play = game
        .player(voter)
        .ok_or_else(|| GameError::PlayerNotFound(voter.clone()))?
        .in_play();
    let target_in_play = game
        .player(target)
        .ok_or_else(|| GameError::PlayerNotFound(target.clone()))?
        .in_play();
    if !voter_in_play {
        return Err(GameError::invalid_target(voter, "voter is not in play"));
    }
    if !target_in_play {
        return Err(GameError::invalid_target(target, "not in play"));
    }

    if let Some(p) = game.player_mut(voter) {
        p.round.vote_target = Some(target.clone());
    }
    tracing::debug!(room = %game.code(), %voter, %target, "vote cast");
    out.room(GameEvent::UpdateVotes {
        votes: vote_counts(game),
    });
    Ok(())
}

/// Removes `username` from the room for good and resets them to lobby
/// defaults. Returns the detached player (for saving) and, if they held
/// the night turn, the schedule after skipping it.
///
/// # Errors
/// `PlayerNotFound` if `username` is not a member.
pub fn leave(
    game: &mut Game,
    username: &Username,
    config: &EngineConfig,
    out: &mut Outbox,
) -> Result<(Player, Option<Schedule>), GameError> {
    let mut player = game
        .players
        .remove(username)
        .ok_or_else(|| GameError::PlayerNotFound(username.clone()))?;
    game.room.members.remove(username);
    player.reset_to_lobby();
    player.room = None;

    out.room(GameEvent::PlayerLeft {
        player: username.clone(),
    });
    tracing::info!(
        room = %game.code(),
        player = %username,
        members = game.players.len(),
        "player left"
    );

    let schedule = skip_current_turn(game, username, config, out);
    Ok((player, schedule))
}

// =========================================================================
// Tests
// =========================================================================
