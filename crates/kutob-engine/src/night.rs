//! Role resolution: who acts next at night, and what their action does.
//!
//! Turn order is fixed: protector, then each aswang (sorted by username),
//! then the seer, then the healer. A player is eligible while they are in
//! play and have not yet acted this night. Exactly one eligible player is
//! the current actor at a time; everything here assumes the caller only
//! lets that player through.

use kutob_protocol::{AswangKind, Faction, Role, Username};

use crate::{Game, GameError, PlayerQuery, RoundState};

// ---------------------------------------------------------------------------
// NightRole
// ---------------------------------------------------------------------------

/// The night-action capability of a role. Villagers have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NightRole {
    Protector,
    Antagonist(AswangKind),
    Seer,
    Healer,
}

impl NightRole {
    pub fn of(role: Role) -> Option<Self> {
        match role {
            Role::Mangangaso => Some(NightRole::Protector),
            Role::Aswang(kind) => Some(NightRole::Antagonist(kind)),
            Role::Manghuhula => Some(NightRole::Seer),
            Role::Babaylan => Some(NightRole::Healer),
            Role::Villager => None,
        }
    }

    pub fn role(self) -> Role {
        match self {
            NightRole::Protector => Role::Mangangaso,
            NightRole::Antagonist(kind) => Role::Aswang(kind),
            NightRole::Seer => Role::Manghuhula,
            NightRole::Healer => Role::Babaylan,
        }
    }
}

/// A player entitled to act, with the role they act as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub player: Username,
    pub role: Role,
}

/// What an accepted night action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NightEffect {
    /// The protector shielded `target`.
    Protected { target: Username },
    /// The protector, in lethal mode, marked `target` to die at dawn.
    Executed { target: Username },
    /// An aswang marked `target` to die at dawn.
    Marked { target: Username },
    /// An aswang hit a shielded player. Nobody dies; the protector sits
    /// out the night after next.
    Blocked { target: Username },
    /// The seer learned `target`'s role.
    Revealed { target: Username, role: Role },
    /// The healer tended `target`. `cured` is `true` if a pending kill was
    /// cancelled.
    Healed { target: Username, cured: bool },
}

/// Result of preparing a new night.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightStart {
    /// The protector, if they sit out this night.
    pub disabled_protector: Option<Username>,
}

// ---------------------------------------------------------------------------
// Night preparation
// ---------------------------------------------------------------------------

/// Resets every member's round state and applies protector disablement.
///
/// The protector sits out when their `night_skip` is this night. Once that
/// night has come (or passed) the disablement is cleared.
pub fn begin_night(game: &mut Game) -> NightStart {
    let night = game.room.night_count;
    for player in game.players.values_mut() {
        player.round = RoundState::default();
    }

    let mut start = NightStart::default();
    if let Some(protector) = game.holder_of_mut(Role::Mangangaso) {
        let night_skip = protector.protector.night_skip;
        if protector.protector.skip_turn && night_skip <= night {
            if night_skip == night && protector.in_play() {
                protector.round.turn_done = true;
                start.disabled_protector = Some(protector.username.clone());
            }
            protector.protector.skip_turn = false;
        }
    }
    start
}

// ---------------------------------------------------------------------------
// Turn order
// ---------------------------------------------------------------------------

/// The next player entitled to act, or `None` when the night is over.
pub fn next_actor(game: &Game) -> Option<Turn> {
    let eligible = |role: Role| {
        game.matching(PlayerQuery::Role(role))
            .find(|p| p.in_play() && !p.round.turn_done)
            .map(|p| Turn {
                player: p.username.clone(),
                role,
            })
    };

    eligible(Role::Mangangaso)
        .or_else(|| {
            game.matching(PlayerQuery::Faction(Faction::Aswang))
                .find(|p| p.in_play() && !p.round.turn_done)
                .and_then(|p| {
                    p.role.map(|role| Turn {
                        player: p.username.clone(),
                        role,
                    })
                })
        })
        .or_else(|| eligible(Role::Manghuhula))
        .or_else(|| eligible(Role::Babaylan))
}

/// `true` while at least one aswang is in play.
pub fn any_aswang_in_play(game: &Game) -> bool {
    game.matching(PlayerQuery::InPlay).any(|p| p.is_aswang())
}

/// Players `turn` may pick, sorted.
///
/// - Protector: anyone in play; in lethal mode, anyone but themselves.
/// - Aswang: anyone in play who is not an aswang.
/// - Seer: anyone in play but themselves.
/// - Healer: anyone in play, themselves included.
pub fn eligible_targets(game: &Game, turn: &Turn) -> Vec<Username> {
    let lethal = game
        .player(&turn.player)
        .is_some_and(|p| p.protector.can_execute);

    game.matching(PlayerQuery::InPlay)
        .filter(|target| match NightRole::of(turn.role) {
            Some(NightRole::Protector) => !lethal || target.username != turn.player,
            Some(NightRole::Antagonist(_)) => !target.is_aswang(),
            Some(NightRole::Seer) => target.username != turn.player,
            Some(NightRole::Healer) => true,
            None => false,
        })
        .map(|p| p.username.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Validates and applies one night action, then ends the actor's turn.
///
/// On error `game` is left untouched.
///
/// # Errors
/// - `NotYourTurn` if `actor` is not the current actor or does not hold
///   `role`.
/// - `PlayerNotFound` if `target` is not a member.
/// - `InvalidTarget` if `target` is not one of [`eligible_targets`].
pub fn apply_night_action(
    game: &mut Game,
    actor: &Username,
    role: Role,
    target: &Username,
) -> Result<NightEffect, GameError> {
    if game.room.current_actor.as_ref() != Some(actor) {
        return Err(GameError::NotYourTurn(actor.clone()));
    }
    let Some(actor_player) = game.player(actor) else {
        return Err(GameError::PlayerNotFound(actor.clone()));
    };
    if actor_player.role != Some(role) {
        return Err(GameError::NotYourTurn(actor.clone()));
    }
    let Some(night_role) = NightRole::of(role) else {
        return Err(GameError::NotYourTurn(actor.clone()));
    };
    let Some(target_player) = game.player(target) else {
        return Err(GameError::PlayerNotFound(target.clone()));
    };
    if !target_player.in_play() {
        return Err(GameError::invalid_target(target, "not in play"));
    }

    let turn = Turn {
        player: actor.clone(),
        role,
    };
    if !eligible_targets(game, &turn).contains(target) {
        let reason = match night_role {
            NightRole::Antagonist(_) => "cannot target another aswang",
            _ => "cannot target yourself",
        };
        return Err(GameError::invalid_target(target, reason));
    }

    let effect = match night_role {
        NightRole::Protector => protector_action(game, actor, target),
        NightRole::Antagonist(_) => aswang_action(game, target),
        NightRole::Seer => seer_action(game, target),
        NightRole::Healer => healer_action(game, actor, target),
    };

    if let Some(p) = game.player_mut(actor) {
        p.round.turn_done = true;
    }
    tracing::debug!(room = %game.code(), player = %actor, %role, ?effect, "night action applied");
    Ok(effect)
}

/// Ends the current actor's turn with no effect (disconnect or leave).
///
/// Returns `true` if `username` held the turn.
pub fn skip_turn(game: &mut Game, username: &Username) -> bool {
    if game.room.current_actor.as_ref() != Some(username) {
        return false;
    }
    if let Some(p) = game.player_mut(username) {
        p.round.turn_done = true;
    }
    game.room.current_actor = None;
    true
}

fn protector_action(game: &mut Game, actor: &Username, target: &Username) -> NightEffect {
    let lethal = game
        .player_mut(actor)
        .map(|p| std::mem::take(&mut p.protector.can_execute))
        .unwrap_or(false);

    if let Some(t) = game.player_mut(target) {
        if lethal {
            t.round.night_target = true;
        } else {
            t.round.is_protected = true;
        }
    }
    if lethal {
        NightEffect::Executed {
            target: target.clone(),
        }
    } else {
        NightEffect::Protected {
            target: target.clone(),
        }
    }
}

fn aswang_action(game: &mut Game, target: &Username) -> NightEffect {
    let shielded = game.player(target).is_some_and(|t| t.round.is_protected);
    if !shielded {
        if let Some(t) = game.player_mut(target) {
            t.round.night_target = true;
        }
        return NightEffect::Marked {
            target: target.clone(),
        };
    }

    let night = game.room.night_count;
    if let Some(protector) = game.holder_of_mut(Role::Mangangaso) {
        protector.protector.skip_turn = true;
        protector.protector.night_skip = night + 2;
    }
    NightEffect::Blocked {
        target: target.clone(),
    }
}

fn seer_action(game: &Game, target: &Username) -> NightEffect {
    let role = game
        .player(target)
        .and_then(|t| t.role)
        .unwrap_or(Role::Villager);
    NightEffect::Revealed {
        target: target.clone(),
        role,
    }
}

/// Cures when either the healer or their target is marked; the cure lands
/// on the target.
fn healer_action(game: &mut Game, actor: &Username, target: &Username) -> NightEffect {
    let night = game.room.night_count;
    let healer_marked = game.player(actor).is_some_and(|p| p.round.night_target);
    let mut cured = false;
    if let Some(t) = game.player_mut(target) {
        if healer_marked || t.round.night_target {
            cured = std::mem::take(&mut t.round.night_target);
            if cured {
                t.revived_on_night = night;
            }
        }
    }
    NightEffect::Healed {
        target: target.clone(),
        cured,
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Player, Room};
    use kutob_protocol::{Phase, RoomCode};

    fn user(name: &str) -> Username {
        Username::new(name)
    }

    const BERBALANG: Role = Role::Aswang(AswangKind::Berbalang);
    const MANANANGGAL: Role = Role::Aswang(AswangKind::Manananggal);

    /// Six players: protector, two aswang, seer, healer, villager.
    fn game() -> Game {
        let code = RoomCode::new("NIGHT1");
        let mut room = Room::new(code.clone(), user("prot"), 6);
        room.has_started = true;
        room.phase = Phase::NightActions;
        room.night_count = 1;
        let roles = [
            ("prot", Role::Mangangaso),
            ("zed", BERBALANG),
            ("asa", MANANANGGAL),
            ("seer", Role::Manghuhula),
            ("heal", Role::Babaylan),
            ("vil", Role::Villager),
        ];
        let players = roles.into_iter().map(|(name, role)| {
            room.members.insert(user(name));
            let mut p = Player::new(user(name));
            p.room = Some(code.clone());
            p.role = Some(role);
            p
        });
        let players: Vec<Player> = players.collect();
        Game::new(room, players)
    }

    fn act(game: &mut Game, actor: &str, role: Role, target: &str) -> Result<NightEffect, GameError> {
        game.room.current_actor = Some(user(actor));
        apply_night_action(game, &user(actor), role, &user(target))
    }

    #[test]
    fn test_next_actor_follows_fixed_order() {
        let mut g = game();
        let mut order = Vec::new();
        while let Some(turn) = next_actor(&g) {
            order.push(turn.player.to_string());
            g.player_mut(&turn.player).unwrap().round.turn_done = true;
        }
        assert_eq!(order, vec!["prot", "asa", "zed", "seer", "heal"]);
    }

    #[test]
    fn test_next_actor_skips_dead_and_eliminated() {
        let mut g = game();
        g.player_mut(&user("prot")).unwrap().alive = false;
        g.player_mut(&user("asa")).unwrap().eliminated_from_game = true;
        assert_eq!(next_actor(&g).unwrap().player, user("zed"));
    }

    #[test]
    fn test_apply_night_action_out_of_turn_rejected_without_mutation() {
        let mut g = game();
        g.room.current_actor = Some(user("prot"));
        let before = g.clone();

        let result = apply_night_action(&mut g, &user("zed"), BERBALANG, &user("vil"));

        assert!(matches!(result, Err(GameError::NotYourTurn(_))));
        assert_eq!(g, before);
    }

    #[test]
    fn test_apply_night_action_wrong_role_rejected() {
        let mut g = game();
        g.room.current_actor = Some(user("zed"));
        let result = apply_night_action(&mut g, &user("zed"), Role::Manghuhula, &user("vil"));
        assert!(matches!(result, Err(GameError::NotYourTurn(_))));
    }

    #[test]
    fn test_protector_shields_target() {
        let mut g = game();
        let effect = act(&mut g, "prot", Role::Mangangaso, "vil").unwrap();
        assert_eq!(effect, NightEffect::Protected { target: user("vil") });
        assert!(g.player(&user("vil")).unwrap().round.is_protected);
        assert!(g.player(&user("prot")).unwrap().round.turn_done);
    }

    #[test]
    fn test_protector_lethal_marks_target_and_consumes_unlock() {
        let mut g = game();
        g.player_mut(&user("prot")).unwrap().protector.can_execute = true;

        let effect = act(&mut g, "prot", Role::Mangangaso, "zed").unwrap();

        assert_eq!(effect, NightEffect::Executed { target: user("zed") });
        assert!(g.player(&user("zed")).unwrap().round.night_target);
        assert!(!g.player(&user("prot")).unwrap().protector.can_execute);
    }

    #[test]
    fn test_protector_lethal_self_target_invalid() {
        let mut g = game();
        g.player_mut(&user("prot")).unwrap().protector.can_execute = true;
        let result = act(&mut g, "prot", Role::Mangangaso, "prot");
        assert!(matches!(result, Err(GameError::InvalidTarget { .. })));
        assert!(g.player(&user("prot")).unwrap().protector.can_execute);
    }

    #[test]
    fn test_aswang_on_aswang_invalid() {
        let mut g = game();
        let result = act(&mut g, "zed", BERBALANG, "asa");
        assert!(matches!(result, Err(GameError::InvalidTarget { .. })));
    }

    #[test]
    fn test_aswang_marks_unprotected_target() {
        let mut g = game();
        let effect = act(&mut g, "asa", MANANANGGAL, "vil").unwrap();
        assert_eq!(effect, NightEffect::Marked { target: user("vil") });
        assert!(g.player(&user("vil")).unwrap().round.night_target);
        assert!(g.player(&user("asa")).unwrap().round.turn_done);
    }

    #[test]
    fn test_aswang_on_protected_target_disables_protector() {
        let mut g = game();
        act(&mut g, "prot", Role::Mangangaso, "vil").unwrap();
        let effect = act(&mut g, "asa", MANANANGGAL, "vil").unwrap();

        assert_eq!(effect, NightEffect::Blocked { target: user("vil") });
        assert!(!g.player(&user("vil")).unwrap().round.night_target);
        let prot = g.player(&user("prot")).unwrap();
        assert!(prot.protector.skip_turn);
        assert_eq!(prot.protector.night_skip, 3);
    }

    #[test]
    fn test_seer_reveals_role_without_mutation() {
        let mut g = game();
        let effect = act(&mut g, "seer", Role::Manghuhula, "zed").unwrap();
        assert_eq!(
            effect,
            NightEffect::Revealed {
                target: user("zed"),
                role: BERBALANG
            }
        );
        assert_eq!(g.player(&user("zed")).unwrap().round, RoundState::default());
    }

    #[test]
    fn test_healer_cures_marked_target() {
        let mut g = game();
        act(&mut g, "asa", MANANANGGAL, "vil").unwrap();
        let effect = act(&mut g, "heal", Role::Babaylan, "vil").unwrap();
        assert_eq!(effect, NightEffect::Healed { target: user("vil"), cured: true });
        let vil = g.player(&user("vil")).unwrap();
        assert!(!vil.round.night_target);
        assert_eq!(vil.revived_on_night, 1);
    }

    #[test]
    fn test_healer_may_cure_themselves() {
        let mut g = game();
        act(&mut g, "asa", MANANANGGAL, "heal").unwrap();
        let effect = act(&mut g, "heal", Role::Babaylan, "heal").unwrap();
        assert_eq!(effect, NightEffect::Healed { target: user("heal"), cured: true });
    }

    #[test]
    fn test_healer_on_unmarked_target_does_nothing() {
        let mut g = game();
        let effect = act(&mut g, "heal", Role::Babaylan, "vil").unwrap();
        assert_eq!(effect, NightEffect::Healed { target: user("vil"), cured: false });
    }

    #[test]
    fn test_target_not_in_play_invalid() {
        let mut g = game();
        g.player_mut(&user("vil")).unwrap().alive = false;
        let result = act(&mut g, "asa", MANANANGGAL, "vil");
        assert!(matches!(result, Err(GameError::InvalidTarget { .. })));
    }

    #[test]
    fn test_unknown_target_not_found() {
        let mut g = game();
        let result = act(&mut g, "asa", MANANANGGAL, "ghost");
        assert!(matches!(result, Err(GameError::PlayerNotFound(_))));
    }

    #[test]
    fn test_begin_night_resets_round_state() {
        let mut g = game();
        {
            let vil = g.player_mut(&user("vil")).unwrap();
            vil.round.is_protected = true;
            vil.round.night_target = true;
            vil.round.vote_target = Some(user("zed"));
            vil.round.turn_done = true;
        }
        begin_night(&mut g);
        assert_eq!(g.player(&user("vil")).unwrap().round, RoundState::default());
    }

    #[test]
    fn test_begin_night_disables_protector_on_skip_night() {
        let mut g = game();
        {
            let prot = g.player_mut(&user("prot")).unwrap();
            prot.protector.skip_turn = true;
            prot.protector.night_skip = 2;
        }

        // Night 1: not yet.
        let start = begin_night(&mut g);
        assert_eq!(start.disabled_protector, None);
        assert_eq!(next_actor(&g).unwrap().player, user("prot"));

        // Night 2: sits out, then the flag clears.
        g.room.night_count = 2;
        let start = begin_night(&mut g);
        assert_eq!(start.disabled_protector, Some(user("prot")));
        assert_eq!(next_actor(&g).unwrap().player, user("asa"));
        assert!(!g.player(&user("prot")).unwrap().protector.skip_turn);

        // Night 3: back to normal.
        g.room.night_count = 3;
        let start = begin_night(&mut g);
        assert_eq!(start.disabled_protector, None);
        assert_eq!(next_actor(&g).unwrap().player, user("prot"));
    }

    #[test]
    fn test_eligible_targets_per_role() {
        let g = game();
        let aswang = eligible_targets(&g, &Turn { player: user("zed"), role: BERBALANG });
        assert_eq!(aswang, vec![user("heal"), user("prot"), user("seer"), user("vil")]);

        let seer = eligible_targets(&g, &Turn { player: user("seer"), role: Role::Manghuhula });
        assert!(!seer.contains(&user("seer")));

        let healer = eligible_targets(&g, &Turn { player: user("heal"), role: Role::Babaylan });
        assert!(healer.contains(&user("heal")));
    }

    #[test]
    fn test_skip_turn_only_for_current_actor() {
        let mut g = game();
        g.room.current_actor = Some(user("prot"));
        assert!(!skip_turn(&mut g, &user("zed")));
        assert!(skip_turn(&mut g, &user("prot")));
        assert!(g.player(&user("prot")).unwrap().round.turn_done);
        assert_eq!(g.room.current_actor, None);
        assert_eq!(next_actor(&g).unwrap().player, user("asa"));
    }
}
