//! # Kutob
//!
//! Backend for the aswang party game: a room of players moves through a
//! day/night cycle where hidden aswang hunt at night and the village votes
//! by day.
//!
//! This crate wires the layers together:
//!
//! - [`GameServer`] owns the `GameManager`, the store, the broadcaster and
//!   the presence tracker, and exposes every entrypoint.
//! - [`GameServer::handle_action`] is the transport-agnostic boundary: bytes
//!   in ([`ClientAction`]), bytes out ([`ActionResponse`]).
//! - [`GameServer::spawn_reaper`] removes players who stayed disconnected
//!   past the grace period.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kutob::prelude::*;
//!
//! # async fn demo() -> Result<(), KutobError> {
//! let server = GameServer::builder().build_in_memory();
//! let code = RoomCode::new("ABC123");
//! server.store().create_room(code.clone(), Username::new("ana"), 5).await?;
//! // ...four more players join...
//! server.start_game(&code).await?;
//! # Ok(())
//! # }
//! ```

mod actions;
mod error;
mod server;

pub use actions::{ActionResponse, ClientAction};
pub use error::KutobError;
pub use server::{GameServer, GameServerBuilder};

/// Installs a `tracing` subscriber that honours `RUST_LOG`, falling back to
/// `default_filter` (for example `"info"`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub mod prelude {
    pub use crate::{ActionResponse, ClientAction, GameServer, GameServerBuilder, KutobError};
    pub use kutob_engine::{
        BroadcastHub, Broadcaster, EngineConfig, GameError, InMemoryStore, PhaseTimings,
        RoomStore, Turn,
    };
    pub use kutob_presence::{PresenceConfig, PresenceMap, PresenceStatus, PresenceTracker};
    pub use kutob_tick::{Countdown, CountdownConfig, CountdownTick};
    pub use kutob_protocol::{
        Codec, GameEvent, JsonCodec, Phase, Role, RoomCode, Topic, Username, Winners,
    };
}
