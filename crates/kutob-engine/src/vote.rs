//! Vote tally: from ballots to an elimination decision.

use std::collections::BTreeMap;

use kutob_protocol::Username;

use crate::{Game, PlayerQuery};

/// What a set of ballots decides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyOutcome {
    Eliminate(Username),
    /// No ballots, or the top two counts are equal.
    Tie,
}

/// Counts ballots and picks the player to eliminate.
///
/// ```
/// use kutob_engine::{TallyOutcome, tally};
/// use kutob_protocol::Username;
///
/// let a = Username::new("a");
/// let b = Username::new("b");
/// assert_eq!(tally([&a, &a, &b, &b]), TallyOutcome::Tie);
/// assert_eq!(tally([&a, &a, &a, &b]), TallyOutcome::Eliminate(a.clone()));
/// assert_eq!(tally(std::iter::empty::<&Username>()), TallyOutcome::Tie);
/// ```
pub fn tally<'a, I>(ballots: I) -> TallyOutcome
where
    I: IntoIterator<Item = &'a Username>,
{
    let mut counts: BTreeMap<&Username, usize> = BTreeMap::new();
    for target in ballots {
        *counts.entry(target).or_default() += 1;
    }

    let mut ranked: Vec<(&Username, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    match ranked.as_slice() {
        [] => TallyOutcome::Tie,
        [(_, first), (_, second), ..] if first == second => TallyOutcome::Tie,
        [(winner, _), ..] => TallyOutcome::Eliminate((*winner).clone()),
    }
}

/// Running counts per target, from voters who are still in play.
pub fn vote_counts(game: &Game) -> BTreeMap<Username, usize> {
    let mut counts = BTreeMap::new();
    for target in ballots(game) {
        *counts.entry(target.clone()).or_default() += 1;
    }
    counts
}

fn ballots(game: &Game) -> impl Iterator<Item = &Username> {
    game.matching(PlayerQuery::InPlay)
        .filter_map(|voter| voter.round.vote_target.as_ref())
}

/// The applied result of a vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteResult {
    Eliminated { player: Username, was_aswang: bool },
    Tie,
}

/// Tallies the in-play ballots and votes out the winner, if any.
///
/// Players who did not vote, and voters who are no longer in play,
/// contribute nothing.
pub fn resolve_votes(game: &mut Game) -> VoteResult {
    let outcome = tally(ballots(game));
    let TallyOutcome::Eliminate(username) = outcome else {
        return VoteResult::Tie;
    };

    match game.player_mut(&username) {
        Some(player) => {
            player.eliminated_from_game = true;
            VoteResult::Eliminated {
                was_aswang: player.is_aswang(),
                player: username,
            }
        }
        None => VoteResult::Tie,
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Player, Room};
    use kutob_protocol::{AswangKind, Role, RoomCode};

    fn user(name: &str) -> Username {
        Username::new(name)
    }

    fn ballots_of(names: &[&str]) -> Vec<Username> {
        names.iter().map(|n| user(n)).collect()
    }

    #[test]
    fn test_tally_empty_is_tie() {
        assert_eq!(tally(&ballots_of(&[])), TallyOutcome::Tie);
    }

    #[test]
    fn test_tally_top_two_equal_is_tie() {
        assert_eq!(tally(&ballots_of(&["a", "a", "b", "b"])), TallyOutcome::Tie);
    }

    #[test]
    fn test_tally_plurality_wins() {
        assert_eq!(
            tally(&ballots_of(&["a", "a", "a", "b"])),
            TallyOutcome::Eliminate(user("a"))
        );
    }

    #[test]
    fn test_tally_single_ballot_wins() {
        assert_eq!(tally(&ballots_of(&["c"])), TallyOutcome::Eliminate(user("c")));
    }

    #[test]
    fn test_tally_third_place_does_not_matter() {
        assert_eq!(
            tally(&ballots_of(&["a", "a", "a", "b", "b", "c", "c"])),
            TallyOutcome::Eliminate(user("a"))
        );
        assert_eq!(
            tally(&ballots_of(&["a", "a", "b", "b", "c"])),
            TallyOutcome::Tie
        );
    }

    fn game(votes: &[(&str, Option<&str>)]) -> Game {
        let code = RoomCode::new("VOTE01");
        let room = Room::new(code.clone(), user("a"), 5);
        let players = votes.iter().map(|(name, target)| {
            let mut p = Player::new(user(name));
            p.room = Some(code.clone());
            p.role = Some(if *name == "z" {
                Role::Aswang(AswangKind::Mandurugo)
            } else {
                Role::Villager
            });
            p.round.vote_target = target.map(user);
            p
        });
        Game::new(room, players.collect::<Vec<_>>())
    }

    #[test]
    fn test_resolve_votes_eliminates_plurality() {
        let mut g = game(&[
            ("a", Some("z")),
            ("b", Some("z")),
            ("c", Some("z")),
            ("z", Some("a")),
            ("d", None),
        ]);
        let result = resolve_votes(&mut g);
        assert_eq!(
            result,
            VoteResult::Eliminated {
                player: user("z"),
                was_aswang: true
            }
        );
        assert!(g.player(&user("z")).unwrap().eliminated_from_game);
    }

    #[test]
    fn test_resolve_votes_ignores_dead_voters() {
        let mut g = game(&[
            ("a", Some("b")),
            ("c", Some("d")),
            ("d", Some("d")),
        ]);
        g.player_mut(&user("d")).unwrap().alive = false;

        // One counted ballot each for b and d: tie.
        assert_eq!(resolve_votes(&mut g), VoteResult::Tie);
        assert!(!g.player(&user("b")).unwrap().eliminated_from_game);
    }

    #[test]
    fn test_vote_counts_per_target() {
        let g = game(&[("a", Some("z")), ("b", Some("z")), ("z", Some("a"))]);
        let counts = vote_counts(&g);
        assert_eq!(counts.get(&user("z")), Some(&2));
        assert_eq!(counts.get(&user("a")), Some(&1));
    }
}
