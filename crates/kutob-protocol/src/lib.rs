//! Shared vocabulary for Kutob.
//!
//! Everything the engine, its collaborators and its clients agree on lives
//! here:
//!
//! - **Identity** ([`RoomCode`], [`Username`]): how rooms and players are
//!   addressed.
//! - **Game vocabulary** ([`Role`], [`AswangKind`], [`Faction`], [`Phase`],
//!   [`Winners`]): the closed sets the state machine works over.
//! - **Broadcasts** ([`Topic`], [`GameEvent`]): what gets pushed to clients
//!   and where.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how payloads become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The crate has no notion of rooms running or timers firing. It only
//! describes data.

mod codec;
mod error;
mod event;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::GameEvent;
pub use types::{
    AswangKind, Faction, Phase, Role, RoomCode, Topic, Username, Winners,
};
