//! Codec trait and implementations for turning payloads into bytes.
//!
//! The engine publishes structured [`GameEvent`](crate::GameEvent)s and
//! accepts structured actions. Wire encoding is the edge's business, so the
//! edge picks a [`Codec`]. [`JsonCodec`] is the only one shipped: browsers
//! speak JSON and the event shapes were designed around it.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because a codec lives inside the long-running
/// server state and is used from many tasks at once.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use kutob_protocol::{Codec, GameEvent, JsonCodec};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&GameEvent::NightCount { count: 2 }).unwrap();
/// assert_eq!(bytes, br#"{"type":"night_count","count":2}"#);
///
/// let decoded: GameEvent = codec.decode(&bytes).unwrap();
/// assert_eq!(decoded, GameEvent::NightCount { count: 2 });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{GameEvent, Phase};

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<GameEvent, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_encodes_phase_as_number() {
        let bytes = JsonCodec
            .encode(&GameEvent::NextPhase { phase: Phase::Voting })
            .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"type":"next_phase","phase":7}"#);
    }
}
