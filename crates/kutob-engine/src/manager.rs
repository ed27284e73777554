//! Game manager: routes entrypoints to the controller of each room.

use std::collections::HashMap;
use std::sync::Arc;

use kutob_presence::PresenceTracker;
use kutob_protocol::{Role, RoomCode, Username};

use crate::controller::spawn_room;
use crate::{Broadcaster, EngineConfig, GameError, RoomHandle, RoomStore, Turn};

/// Tracks one [`RoomHandle`] per active room.
///
/// Controllers are spawned lazily, the first time a room is addressed, and
/// respawned if the previous one stopped. Room state lives in the store,
/// so a fresh controller picks up where the old one left off (minus any
/// countdown that was running).
pub struct GameManager<S, B, P> {
    store: Arc<S>,
    broadcaster: Arc<B>,
    presence: Arc<P>,
    config: Arc<EngineConfig>,
    rooms: HashMap<RoomCode, RoomHandle>,
}

impl<S, B, P> GameManager<S, B, P>
where
    S: RoomStore,
    B: Broadcaster,
    P: PresenceTracker,
{
    pub fn new(store: Arc<S>, broadcaster: Arc<B>, presence: Arc<P>, config: EngineConfig) -> Self {
        Self {
            store,
            broadcaster,
            presence,
            config: Arc::new(config.validated()),
            rooms: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<B> {
        &self.broadcaster
    }

    pub fn presence(&self) -> &Arc<P> {
        &self.presence
    }

    /// Returns the handle for `code`, spawning a controller if needed.
    ///
    /// # Errors
    /// `RoomNotFound` if the store has no such room.
    pub async fn room(&mut self, code: &RoomCode) -> Result<RoomHandle, GameError> {
        self.prune();
        if let Some(handle) = self.rooms.get(code) {
            return Ok(handle.clone());
        }

        if self.store.get_room(code).await?.is_none() {
            return Err(GameError::RoomNotFound(code.clone()));
        }

        let handle = spawn_room(
            code.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.broadcaster),
            Arc::clone(&self.presence),
            Arc::clone(&self.config),
        );
        self.rooms.insert(code.clone(), handle.clone());
        tracing::debug!(room = %code, rooms = self.rooms.len(), "room controller spawned");
        Ok(handle)
    }

    pub async fn start_game(&mut self, code: &RoomCode) -> Result<(), GameError> {
        self.room(code).await?.start_game().await
    }

    pub async fn select_target(
        &mut self,
        code: &RoomCode,
        actor: Username,
        role: Role,
        target: Username,
    ) -> Result<Option<Turn>, GameError> {
        self.room(code).await?.select_target(actor, role, target).await
    }

    pub async fn vote(
        &mut self,
        code: &RoomCode,
        voter: Username,
        target: Username,
    ) -> Result<(), GameError> {
        self.room(code).await?.vote(voter, target).await
    }

    pub async fn player_disconnected(
        &mut self,
        code: &RoomCode,
        username: Username,
    ) -> Result<(), GameError> {
        self.room(code).await?.player_disconnected(username).await
    }

    pub async fn player_reconnected(
        &mut self,
        code: &RoomCode,
        username: Username,
    ) -> Result<(), GameError> {
        self.room(code).await?.player_reconnected(username).await
    }

    pub async fn player_left(&mut self, code: &RoomCode, username: Username) -> Result<(), GameError> {
        self.room(code).await?.player_left(username).await
    }

    pub async fn abort_game(&mut self, code: &RoomCode) -> Result<(), GameError> {
        self.room(code).await?.abort_game().await
    }

    /// Stops the controller of `code`, if one is running. The room record
    /// stays in the store.
    pub async fn close_room(&mut self, code: &RoomCode) -> bool {
        let Some(handle) = self.rooms.remove(code) else {
            return false;
        };
        let _ = handle.shutdown().await;
        tracing::info!(room = %code, "room controller closed");
        true
    }

    /// Forgets handles whose controller has stopped, for example after its
    /// room was deleted.
    fn prune(&mut self) {
        let before = self.rooms.len();
        self.rooms.retain(|_, handle| !handle.is_closed());
        let pruned = before - self.rooms.len();
        if pruned > 0 {
            tracing::debug!(pruned, rooms = self.rooms.len(), "stopped room controllers dropped");
        }
    }

    /// Number of rooms with a controller.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BroadcastHub, InMemoryStore};
    use kutob_presence::PresenceMap;

    type Manager = GameManager<InMemoryStore, BroadcastHub, PresenceMap>;

    fn manager() -> Manager {
        GameManager::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(BroadcastHub::new()),
            Arc::new(PresenceMap::new()),
            EngineConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_room_unknown_code_not_found() {
        let mut manager = manager();
        let result = manager.room(&RoomCode::new("NOPE00")).await;
        assert!(matches!(result, Err(GameError::RoomNotFound(_))));
        assert_eq!(manager.room_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_room_spawns_once_and_reuses_handle() {
        let mut manager = manager();
        let code = RoomCode::new("ROOM01");
        manager
            .store()
            .create_room(code.clone(), Username::new("owner"), 5)
            .await
            .unwrap();

        manager.room(&code).await.unwrap();
        manager.room(&code).await.unwrap();
        assert_eq!(manager.room_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_room_then_respawn() {
        let mut manager = manager();
        let code = RoomCode::new("ROOM02");
        manager
            .store()
            .create_room(code.clone(), Username::new("owner"), 5)
            .await
            .unwrap();

        manager.room(&code).await.unwrap();
        assert!(manager.close_room(&code).await);
        assert!(!manager.close_room(&code).await);
        assert_eq!(manager.room_count(), 0);

        // The room record survives, so the next request brings it back.
        let result = manager.start_game(&code).await;
        assert!(matches!(result, Err(GameError::InsufficientPlayers { .. })));
        assert_eq!(manager.room_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_room_deleted_controller_pruned() {
        let mut manager = manager();
        let code = RoomCode::new("ROOM03");
        manager
            .store()
            .create_room(code.clone(), Username::new("owner"), 5)
            .await
            .unwrap();
        let handle = manager.room(&code).await.unwrap();

        assert!(manager.store().delete_room(&code).await);
        let result = handle.abort_game().await;
        assert!(matches!(result, Err(GameError::RoomNotFound(_))));
        assert!(handle.is_closed());

        let result = manager.room(&code).await;
        assert!(matches!(result, Err(GameError::RoomNotFound(_))));
        assert_eq!(manager.room_count(), 0);
    }
}
