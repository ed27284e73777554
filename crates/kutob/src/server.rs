//! `GameServer` builder, entrypoints and the presence reaper.
//!
//! The server ties the layers together: client actions → game manager →
//! room controllers, with the store, broadcaster and presence tracker
//! injected at build time.

use std::sync::Arc;
use std::time::Duration;

use kutob_engine::{
    BroadcastHub, Broadcaster, EngineConfig, GameError, GameManager, InMemoryStore, RoomHandle,
    RoomStore, Turn,
};
use kutob_presence::{PresenceConfig, PresenceMap, PresenceStatus, PresenceTracker};
use kutob_protocol::{Codec, JsonCodec, Role, RoomCode, Username};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::{ActionResponse, ClientAction, KutobError};

/// How often the reaper looks for expired disconnections by default.
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(5);

/// Shared server state. Wrapped in `Arc` so the reaper task and every
/// caller can hold it.
struct ServerState<S, B, P, C> {
    /// Locked only long enough to look up (or spawn) a room handle.
    rooms: Mutex<GameManager<S, B, P>>,
    store: Arc<S>,
    broadcaster: Arc<B>,
    presence: Arc<P>,
    codec: C,
    engine_config: EngineConfig,
    presence_config: PresenceConfig,
    reap_interval: Duration,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for a [`GameServer`].
///
/// ```rust
/// use std::time::Duration;
/// use kutob::prelude::*;
///
/// let server = GameServer::builder()
///     .engine_config(EngineConfig {
///         timings: PhaseTimings::uniform(3),
///         ..EngineConfig::default()
///     })
///     .presence_config(PresenceConfig { reconnect_grace_secs: 10 })
///     .reap_interval(Duration::from_secs(1))
///     .build_in_memory();
/// assert_eq!(server.engine_config().timings.discussion, 3);
/// ```
pub struct GameServerBuilder {
    engine: EngineConfig,
    presence: PresenceConfig,
    reap_interval: Duration,
}

impl GameServerBuilder {
    pub fn new() -> Self {
        Self {
            engine: EngineConfig::default(),
            presence: PresenceConfig::default(),
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine = config;
        self
    }

    pub fn presence_config(mut self, config: PresenceConfig) -> Self {
        self.presence = config;
        self
    }

    /// How often [`GameServer::spawn_reaper`] sweeps. Zero is raised to
    /// one millisecond.
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Builds a server over the given collaborators, using [`JsonCodec`].
    pub fn build<S, B, P>(
        self,
        store: Arc<S>,
        broadcaster: Arc<B>,
        presence: Arc<P>,
    ) -> GameServer<S, B, P, JsonCodec>
    where
        S: RoomStore,
        B: Broadcaster,
        P: PresenceTracker,
    {
        self.build_with_codec(store, broadcaster, presence, JsonCodec)
    }

    pub fn build_with_codec<S, B, P, C>(
        self,
        store: Arc<S>,
        broadcaster: Arc<B>,
        presence: Arc<P>,
        codec: C,
    ) -> GameServer<S, B, P, C>
    where
        S: RoomStore,
        B: Broadcaster,
        P: PresenceTracker,
        C: Codec,
    {
        let engine_config = self.engine.validated();
        let rooms = GameManager::new(
            Arc::clone(&store),
            Arc::clone(&broadcaster),
            Arc::clone(&presence),
            engine_config.clone(),
        );
        GameServer {
            state: Arc::new(ServerState {
                rooms: Mutex::new(rooms),
                store,
                broadcaster,
                presence,
                codec,
                engine_config,
                presence_config: self.presence,
                reap_interval: self.reap_interval,
            }),
        }
    }

    /// Builds a single-process server backed by the in-memory store,
    /// broadcast hub and presence map.
    pub fn build_in_memory(self) -> GameServer<InMemoryStore, BroadcastHub, PresenceMap, JsonCodec> {
        self.build(
            Arc::new(InMemoryStore::new()),
            Arc::new(BroadcastHub::new()),
            Arc::new(PresenceMap::new()),
        )
    }
}

impl Default for GameServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A running Kutob backend. Cheap to clone.
pub struct GameServer<S, B, P, C = JsonCodec> {
    state: Arc<ServerState<S, B, P, C>>,
}

impl<S, B, P, C> Clone for GameServer<S, B, P, C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl GameServer<InMemoryStore, BroadcastHub, PresenceMap, JsonCodec> {
    pub fn builder() -> GameServerBuilder {
        GameServerBuilder::new()
    }
}

impl<S, B, P, C> GameServer<S, B, P, C>
where
    S: RoomStore,
    B: Broadcaster,
    P: PresenceTracker,
    C: Codec,
{
    pub fn store(&self) -> &Arc<S> {
        &self.state.store
    }

    pub fn broadcaster(&self) -> &Arc<B> {
        &self.state.broadcaster
    }

    pub fn presence(&self) -> &Arc<P> {
        &self.state.presence
    }

    pub fn codec(&self) -> &C {
        &self.state.codec
    }

    /// The validated engine configuration every room runs with.
    pub fn engine_config(&self) -> &EngineConfig {
        &self.state.engine_config
    }

    pub fn presence_config(&self) -> &PresenceConfig {
        &self.state.presence_config
    }

    async fn room(&self, code: &RoomCode) -> Result<RoomHandle, GameError> {
        self.state.rooms.lock().await.room(code).await
    }

    // -- entrypoints -------------------------------------------------------

    pub async fn start_game(&self, code: &RoomCode) -> Result<(), KutobError> {
        Ok(self.room(code).await?.start_game().await?)
    }

    pub async fn select_target(
        &self,
        code: &RoomCode,
        actor: Username,
        role: Role,
        target: Username,
    ) -> Result<Option<Turn>, KutobError> {
        Ok(self
            .room(code)
            .await?
            .select_target(actor, role, target)
            .await?)
    }

    pub async fn vote(
        &self,
        code: &RoomCode,
        voter: Username,
        target: Username,
    ) -> Result<(), KutobError> {
        Ok(self.room(code).await?.vote(voter, target).await?)
    }

    pub async fn player_disconnected(
        &self,
        code: &RoomCode,
        username: Username,
    ) -> Result<(), KutobError> {
        Ok(self.room(code).await?.player_disconnected(username).await?)
    }

    pub async fn player_reconnected(
        &self,
        code: &RoomCode,
        username: Username,
    ) -> Result<(), KutobError> {
        Ok(self.room(code).await?.player_reconnected(username).await?)
    }

    pub async fn player_left(&self, code: &RoomCode, username: Username) -> Result<(), KutobError> {
        Ok(self.room(code).await?.player_left(username).await?)
    }

    pub async fn abort_game(&self, code: &RoomCode) -> Result<(), KutobError> {
        Ok(self.room(code).await?.abort_game().await?)
    }

    /// Stops the controller of `code`. The room record is untouched.
    pub async fn close_room(&self, code: &RoomCode) -> bool {
        self.state.rooms.lock().await.close_room(code).await
    }

    // -- action boundary ---------------------------------------------------

    /// Runs one decoded action and reports the outcome.
    pub async fn dispatch(&self, action: ClientAction) -> ActionResponse {
        let room = action.room().clone();
        let result = match action {
            ClientAction::StartGame { room } => {
                self.start_game(&room).await.map(|()| "game started".to_string())
            }
            ClientAction::SelectTarget {
                room,
                username,
                role,
                target,
            } => self
                .select_target(&room, username, role, target)
                .await
                .map(|next| match next {
                    Some(turn) => format!("target accepted, {} is next", turn.role),
                    None => "target accepted, night is over".to_string(),
                }),
            ClientAction::Vote {
                room,
                voter,
                target,
            } => self
                .vote(&room, voter, target.clone())
                .await
                .map(|()| format!("vote for {target} recorded")),
            ClientAction::AbortGame { room } => {
                self.abort_game(&room).await.map(|()| "game aborted".to_string())
            }
        };

        match result {
            Ok(message) => ActionResponse::accepted(message),
            Err(KutobError::Game(err)) if err.is_rejection() => {
                tracing::debug!(%room, %err, "action rejected");
                ActionResponse::rejected(err)
            }
            Err(err) => {
                tracing::warn!(%room, %err, "action failed");
                ActionResponse::rejected(err)
            }
        }
    }

    /// Decodes a [`ClientAction`], runs it and encodes the
    /// [`ActionResponse`].
    ///
    /// Malformed input is answered with a rejection, not an error.
    ///
    /// # Errors
    /// Only if the response itself cannot be encoded.
    pub async fn handle_action(&self, data: &[u8]) -> Result<Vec<u8>, KutobError> {
        let response = match self.state.codec.decode::<ClientAction>(data) {
            Ok(action) => self.dispatch(action).await,
            Err(err) => {
                tracing::debug!(%err, "failed to decode action");
                ActionResponse::rejected(format!("malformed action: {err}"))
            }
        };
        Ok(self.state.codec.encode(&response)?)
    }

    // -- presence reaper ---------------------------------------------------

    /// Removes every player disconnected for longer than the grace period.
    /// Returns how many were removed.
    ///
    /// A player who reconnected after the sweep started is left alone.
    ///
    /// # Errors
    /// If the presence backend cannot be queried.
    pub async fn reap_once(&self) -> Result<usize, KutobError> {
        let grace = Duration::from_secs(self.state.presence_config.reconnect_grace_secs);
        let stale = self.state.presence.stale(grace).await?;

        let mut removed = 0;
        for (room, username) in stale {
            let status = self.state.presence.get_status(&room, &username).await?;
            if status != PresenceStatus::Disconnected {
                tracing::debug!(%room, player = %username, %status, "reconnected before cleanup");
                continue;
            }

            match self.player_left(&room, username.clone()).await {
                Ok(()) => {
                    tracing::info!(%room, player = %username, "disconnected player removed");
                    removed += 1;
                }
                Err(KutobError::Game(GameError::RoomNotFound(_) | GameError::PlayerNotFound(_))) => {
                    self.state
                        .presence
                        .set_status(&room, &username, PresenceStatus::Unknown)
                        .await?;
                    tracing::debug!(%room, player = %username, "stale presence forgotten");
                }
                Err(err) => {
                    tracing::warn!(%room, player = %username, %err, "could not remove player");
                }
            }
        }
        Ok(removed)
    }

    /// Spawns a task that calls [`reap_once`](Self::reap_once) every reap
    /// interval until aborted.
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        let server = self.clone();
        let interval = self.state.reap_interval;
        tokio::spawn(async move {
            tracing::info!(interval_ms = interval.as_millis() as u64, "presence reaper started");
            loop {
                tokio::time::sleep(interval).await;
                if let Err(err) = server.reap_once().await {
                    tracing::warn!(%err, "presence sweep failed");
                }
            }
        })
    }
}
