//! Win-condition evaluation.

use kutob_protocol::Winners;

use crate::Game;

/// Decides the game from the number of aswang and villagers still in play.
///
/// Rules, first match wins:
///
/// 1. aswang left, no villagers → `Aswang`
/// 2. no aswang, villagers left → `Villagers`
/// 3. nobody left → `Tie`
/// 4. otherwise the game goes on (`None`)
pub fn evaluate(alive_aswang: usize, alive_villagers: usize) -> Option<Winners> {
    match (alive_aswang, alive_villagers) {
        (a, 0) if a > 0 => Some(Winners::Aswang),
        (0, v) if v >= 1 => Some(Winners::Villagers),
        (0, 0) => Some(Winners::Tie),
        _ => None,
    }
}

/// [`evaluate`] over the players of `game`.
pub fn check_winner(game: &Game) -> Option<Winners> {
    let (aswang, villagers) = game.faction_counts();
    evaluate(aswang, villagers)
}
