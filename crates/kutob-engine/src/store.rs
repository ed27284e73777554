//! The Room/Player store seam and its in-memory implementation.

use std::collections::HashMap;
use std::future::Future;

use kutob_protocol::{Faction, Role, RoomCode, Username};
use tokio::sync::RwLock;

use crate::{Player, Room, StoreError};

/// Player predicates the engine asks the store for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerQuery {
    /// Every member of the room.
    Members,
    /// Alive and not voted out.
    InPlay,
    /// Role belongs to this faction (any sub-role for aswang).
    Faction(Faction),
    /// Holds exactly this role.
    Role(Role),
    /// `night_target` equals the given value.
    NightTarget(bool),
}

impl PlayerQuery {
    pub fn matches(&self, player: &Player) -> bool {
        match *self {
            PlayerQuery::Members => true,
            PlayerQuery::InPlay => player.in_play(),
            PlayerQuery::Faction(faction) => player.faction() == Some(faction),
            PlayerQuery::Role(role) => player.role == Some(role),
            PlayerQuery::NightTarget(flag) => player.round.night_target == flag,
        }
    }
}

/// Durable state for rooms and players.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one store is shared by every room actor.
/// - Each method returns a `Send` future so production stores can do I/O.
///
/// The engine serializes writes per room itself (one actor per room), so
/// implementations only need per-call atomicity.
pub trait RoomStore: Send + Sync + 'static {
    /// `Ok(None)` if no such room exists.
    fn get_room(
        &self,
        code: &RoomCode,
    ) -> impl Future<Output = Result<Option<Room>, StoreError>> + Send;

    fn get_player(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<Option<Player>, StoreError>> + Send;

    fn save_room(&self, room: &Room) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn save_player(&self, player: &Player) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Players whose `room` is `code` and who match `query`, sorted by
    /// username.
    fn query_players(
        &self,
        code: &RoomCode,
        query: PlayerQuery,
    ) -> impl Future<Output = Result<Vec<Player>, StoreError>> + Send;
}

#[derive(Debug, Default)]
struct Tables {
    rooms: HashMap<RoomCode, Room>,
    players: HashMap<Username, Player>,
}

/// In-memory [`RoomStore`].
///
/// Also carries the room/lobby plumbing the engine itself does not own
/// (creating rooms, joining, deleting), so tests and the demo have a
/// complete backend.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room owned by `owner`, who becomes its first member.
    pub async fn create_room(
        &self,
        code: RoomCode,
        owner: Username,
        player_limit: usize,
    ) -> Result<Room, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.rooms.contains_key(&code) {
            return Err(StoreError::DuplicateRoom(code));
        }
        if let Some(room) = tables.players.get(&owner).and_then(|p| p.room.clone()) {
            return Err(StoreError::AlreadyInRoom(owner, room));
        }

        let room = Room::new(code.clone(), owner.clone(), player_limit);
        let player = tables
            .players
            .entry(owner.clone())
            .or_insert_with(|| Player::new(owner.clone()));
        player.room = Some(code.clone());
        player.in_lobby = true;
        tables.rooms.insert(code.clone(), room.clone());

        tracing::info!(room = %code, %owner, player_limit = room.player_limit, "room created");
        Ok(room)
    }

    /// Adds `username` to a room that has not started yet.
    pub async fn join(&self, code: &RoomCode, username: Username) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let Tables { rooms, players } = &mut *tables;

        let room = rooms
            .get_mut(code)
            .ok_or_else(|| StoreError::MissingRoom(code.clone()))?;
        if room.has_started {
            return Err(StoreError::Closed(code.clone()));
        }
        if let Some(current) = players.get(&username).and_then(|p| p.room.clone()) {
            return Err(StoreError::AlreadyInRoom(username, current));
        }
        if room.members.len() >= room.player_limit {
            return Err(StoreError::RoomFull(code.clone()));
        }

        room.members.insert(username.clone());
        let player = players
            .entry(username.clone())
            .or_insert_with(|| Player::new(username.clone()));
        player.room = Some(code.clone());
        player.in_lobby = true;

        tracing::info!(room = %code, player = %username, members = room.members.len(), "player joined");
        Ok(())
    }

    /// Deletes a room and detaches its members. Returns `false` if it did
    /// not exist.
    pub async fn delete_room(&self, code: &RoomCode) -> bool {
        let mut tables = self.tables.write().await;
        let Some(room) = tables.rooms.remove(code) else {
            return false;
        };
        for username in &room.members {
            if let Some(player) = tables.players.get_mut(username) {
                player.room = None;
            }
        }
        tracing::info!(room = %code, "room deleted");
        true
    }

    pub async fn room_count(&self) -> usize {
        self.tables.read().await.rooms.len()
    }
}

impl RoomStore for InMemoryStore {
    async fn get_room(&self, code: &RoomCode) -> Result<Option<Room>, StoreError> {
        Ok(self.tables.read().await.rooms.get(code).cloned())
    }

    async fn get_player(&self, username: &Username) -> Result<Option<Player>, StoreError> {
        Ok(self.tables.read().await.players.get(username).cloned())
    }

    async fn save_room(&self, room: &Room) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .rooms
            .insert(room.code.clone(), room.clone());
        Ok(())
    }

    async fn save_player(&self, player: &Player) -> Result<(), StoreError> {
        self.tables
            .write()
            .await
            .players
            .insert(player.username.clone(), player.clone());
        Ok(())
    }

    async fn query_players(
        &self,
        code: &RoomCode,
        query: PlayerQuery,
    ) -> Result<Vec<Player>, StoreError> {
        let tables = self.tables.read().await;
        let mut found: Vec<Player> = tables
            .players
            .values()
            .filter(|p| p.room.as_ref() == Some(code) && query.matches(p))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(found)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn code() -> RoomCode {
        RoomCode::new("ROOM01")
    }

    fn user(name: &str) -> Username {
        Username::new(name)
    }

    #[tokio::test]
    async fn test_create_room_registers_owner_as_member() {
        let store = InMemoryStore::new();
        store.create_room(code(), user("owner"), 5).await.unwrap();

        let members = store.query_players(&code(), PlayerQuery::Members).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].username, user("owner"));
        assert_eq!(members[0].room, Some(code()));
    }

    #[tokio::test]
    async fn test_create_room_duplicate_code_rejected() {
        let store = InMemoryStore::new();
        store.create_room(code(), user("a"), 5).await.unwrap();
        let result = store.create_room(code(), user("b"), 5).await;
        assert!(matches!(result, Err(StoreError::DuplicateRoom(_))));
    }

    #[tokio::test]
    async fn test_join_rejects_full_room() {
        let store = InMemoryStore::new();
        store.create_room(code(), user("p0"), 5).await.unwrap();
        for i in 1..5 {
            store.join(&code(), user(&format!("p{i}"))).await.unwrap();
        }
        let result = store.join(&code(), user("late")).await;
        assert!(matches!(result, Err(StoreError::RoomFull(_))));
    }

    #[tokio::test]
    async fn test_join_rejects_player_in_other_room() {
        let store = InMemoryStore::new();
        store.create_room(code(), user("a"), 5).await.unwrap();
        store.create_room(RoomCode::new("ROOM02"), user("b"), 5).await.unwrap();
        let result = store.join(&RoomCode::new("ROOM02"), user("a")).await;
        assert!(matches!(result, Err(StoreError::AlreadyInRoom(_, _))));
    }

    #[tokio::test]
    async fn test_join_rejects_started_room() {
        let store = InMemoryStore::new();
        let mut room = store.create_room(code(), user("a"), 5).await.unwrap();
        room.has_started = true;
        store.save_room(&room).await.unwrap();

        let result = store.join(&code(), user("b")).await;
        assert!(matches!(result, Err(StoreError::Closed(_))));
    }

    #[tokio::test]
    async fn test_query_players_filters_and_sorts() {
        let store = InMemoryStore::new();
        store.create_room(code(), user("carl"), 5).await.unwrap();
        store.join(&code(), user("ana")).await.unwrap();
        store.join(&code(), user("ben")).await.unwrap();

        let mut ben = store.get_player(&user("ben")).await.unwrap().unwrap();
        ben.alive = false;
        ben.role = Some(Role::Villager);
        store.save_player(&ben).await.unwrap();

        let in_play = store.query_players(&code(), PlayerQuery::InPlay).await.unwrap();
        let names: Vec<_> = in_play.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["ana", "carl"]);

        let villagers = store
            .query_players(&code(), PlayerQuery::Role(Role::Villager))
            .await
            .unwrap();
        assert_eq!(villagers.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_room_detaches_members() {
        let store = InMemoryStore::new();
        store.create_room(code(), user("a"), 5).await.unwrap();
        assert!(store.delete_room(&code()).await);
        assert!(!store.delete_room(&code()).await);

        assert!(store.get_room(&code()).await.unwrap().is_none());
        let a = store.get_player(&user("a")).await.unwrap().unwrap();
        assert_eq!(a.room, None);
    }
}
