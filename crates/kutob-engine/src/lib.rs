//! The Kutob game phase engine.
//!
//! A room moves through a fixed day/night cycle. Each room runs as an
//! isolated Tokio task (actor) that owns its countdown and is the only
//! writer of that room's state.
//!
//! # Layers
//!
//! - **Collaborators** ([`RoomStore`], [`Broadcaster`], and the presence
//!   tracker from `kutob-presence`) are injected, never global. In-memory
//!   versions ([`InMemoryStore`], [`BroadcastHub`]) ship with the crate.
//! - **Pure rules** work on a loaded [`Game`] snapshot:
//!   [`assign_roles`], the night-turn resolution in [`night`], the vote
//!   [`tally`], and [`check_winner`].
//! - **The phase machine** ([`cycle`]) applies entry actions for each
//!   phase and says what should be scheduled next.
//! - **The actor shell** ([`RoomHandle`]) feeds commands and countdown ticks
//!   into the phase machine and persists the result.
//! - [`GameManager`] routes entrypoints to the right room, spawning
//!   controllers on first use.

#![allow(async_fn_in_trait)]

mod assignment;
mod broadcast;
mod config;
mod controller;
pub mod cycle;
mod error;
mod manager;
mod model;
pub mod night;
mod store;
mod vote;
mod win;

pub use assignment::{assign_roles, deal_roles};
pub use broadcast::{BroadcastHub, Broadcaster, Outbox};
pub use config::{EngineConfig, PhaseTimings};
pub use controller::RoomHandle;
pub use cycle::Schedule;
pub use error::{GameError, StoreError};
pub use manager::GameManager;
pub use model::{Game, Player, ProtectorState, Room, RoundState, aswang_limit_for};
pub use night::{NightEffect, NightRole, Turn};
pub use store::{InMemoryStore, PlayerQuery, RoomStore};
pub use vote::{TallyOutcome, VoteResult, resolve_votes, tally, vote_counts};
pub use win::{check_winner, evaluate};
