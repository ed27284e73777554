//! One-time role distribution at game start.

use std::collections::BTreeMap;

use kutob_protocol::{AswangKind, Role, Username};
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};

use crate::Game;

/// Deals roles to `players` without touching any state.
///
/// The players are shuffled, then the first three get the protector, seer
/// and healer, the next `aswang_limit` become aswang (each with a random
/// sub-role; repeats allowed) and everyone else is a villager.
///
/// Callers make sure there are at least `4 + aswang_limit` players. With
/// fewer, the later special roles are simply left out.
pub fn deal_roles<R: Rng + ?Sized>(
    players: &[Username],
    aswang_limit: usize,
    rng: &mut R,
) -> BTreeMap<Username, Role> {
    let mut order = players.to_vec();
    order.shuffle(rng);

    let mut slots = vec![Role::Mangangaso, Role::Manghuhula, Role::Babaylan];
    for _ in 0..aswang_limit {
        let kind = AswangKind::ALL
            .choose(rng)
            .copied()
            .unwrap_or(AswangKind::Mandurugo);
        slots.push(Role::Aswang(kind));
    }

    let mut slots = slots.into_iter();
    order
        .into_iter()
        .map(|username| (username, slots.next().unwrap_or(Role::Villager)))
        .collect()
}

/// Deals roles to every member of `game` and moves them from the lobby
/// into the game. Returns the dealt roles.
///
/// Only called once per game, from `start_game`, which refuses to run
/// twice.
pub fn assign_roles<R: Rng + ?Sized>(game: &mut Game, rng: &mut R) -> BTreeMap<Username, Role> {
    let usernames: Vec<Username> = game.players.keys().cloned().collect();
    let dealt = deal_roles(&usernames, game.room.aswang_limit, rng);

    for (username, role) in &dealt {
        if let Some(player) = game.players.get_mut(username) {
            player.role = Some(*role);
            player.in_lobby = false;
            player.in_game = true;
        }
    }

    tracing::info!(
        room = %game.code(),
        players = dealt.len(),
        aswang = game.room.aswang_limit,
        "roles assigned"
    );
    dealt
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Player, Room, aswang_limit_for};
    use kutob_protocol::RoomCode;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn names(n: usize) -> Vec<Username> {
        (0..n).map(|i| Username::new(format!("p{i}"))).collect()
    }

    fn count(dealt: &BTreeMap<Username, Role>, pred: impl Fn(&Role) -> bool) -> usize {
        dealt.values().filter(|r| pred(r)).count()
    }

    #[test]
    fn test_deal_roles_counts_for_every_table_size() {
        for n in 5..=10 {
            let limit = aswang_limit_for(n);
            for seed in 0..20 {
                let mut rng = StdRng::seed_from_u64(seed);
                let dealt = deal_roles(&names(n), limit, &mut rng);

                assert_eq!(dealt.len(), n);
                assert_eq!(count(&dealt, |r| *r == Role::Mangangaso), 1);
                assert_eq!(count(&dealt, |r| *r == Role::Manghuhula), 1);
                assert_eq!(count(&dealt, |r| *r == Role::Babaylan), 1);
                assert_eq!(count(&dealt, Role::is_aswang), limit);
                assert_eq!(count(&dealt, |r| *r == Role::Villager), n - 3 - limit);
            }
        }
    }

    #[test]
    fn test_deal_roles_same_seed_same_assignment() {
        let a = deal_roles(&names(8), 2, &mut StdRng::seed_from_u64(42));
        let b = deal_roles(&names(8), 2, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_deal_roles_different_seeds_vary() {
        let first = deal_roles(&names(10), 3, &mut StdRng::seed_from_u64(0));
        let varied = (1..50).any(|seed| {
            deal_roles(&names(10), 3, &mut StdRng::seed_from_u64(seed)) != first
        });
        assert!(varied, "fifty seeds should not all deal the same table");
    }

    #[test]
    fn test_assign_roles_moves_players_into_game() {
        let code = RoomCode::new("ROOM01");
        let room = Room::new(code.clone(), Username::new("p0"), 5);
        let players = names(5).into_iter().map(|u| {
            let mut p = Player::new(u);
            p.room = Some(code.clone());
            p
        });
        let mut game = Game::new(room, players);

        let dealt = assign_roles(&mut game, &mut StdRng::seed_from_u64(3));

        assert_eq!(dealt.len(), 5);
        for player in game.players.values() {
            assert_eq!(player.role, dealt.get(&player.username).copied());
            assert!(player.in_game);
            assert!(!player.in_lobby);
        }
    }
}
