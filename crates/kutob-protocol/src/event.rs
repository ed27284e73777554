//! Events pushed to clients through the broadcast channel.
//!
//! Every event is an internally tagged object, `{ "type": ..., ...fields }`,
//! because the browser client switches on `type` to decide which part of the
//! UI to update.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Phase, Role, Username, Winners};

/// A payload published to a room topic or a player topic.
///
/// Within one phase transition the controller publishes, in order: any
/// role/turn update, then [`GameEvent::NextPhase`], then phase-specific
/// state. Clients rely on that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Roles have been dealt; clients move from the lobby to the game view.
    GameStart { message: String },

    /// Private: the receiving player's role.
    RoleShow { role: Role },

    NightCount { count: u32 },

    DayCount { count: u32 },

    /// Seconds left before the current phase ends.
    Countdown { countdown: u32 },

    AlivePlayersList { player_list: Vec<Username> },

    /// Whose night turn it is.
    #[serde(rename = "update_roleTurn")]
    UpdateRoleTurn {
        role: Role,
        player: Username,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Private: the receiving player must pick a target from `targets`.
    PlayerSelectTarget { role: Role, targets: Vec<Username> },

    /// Private: the protector is disabled for this night.
    TurnSkipped { message: String },

    /// Night casualties, revealed at the day announcement.
    Announce {
        player_count: usize,
        players: Vec<Username>,
        message: String,
    },

    AnnounceWinners { winners: Winners },

    NextPhase { phase: Phase },

    /// The voted-out player was an aswang.
    IsAswang { eliminated: Username, message: String },

    /// The voted-out player was not an aswang.
    NotAswang { eliminated: Username, message: String },

    /// The top two vote counts were equal, or nobody voted.
    VoteTie { message: String },

    /// Private: the seer's answer.
    GuessPicked {
        target: Username,
        role: Role,
        message: String,
    },

    /// Running vote counts per target.
    UpdateVotes { votes: BTreeMap<Username, usize> },

    /// The owner ended the game early.
    GameAborted { message: String },

    /// A member left the room for good.
    PlayerLeft { player: Username },
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The client switches on exact `type` strings, so these tests pin the
    //! JSON shape of the events whose names are easy to get wrong.

    use super::*;
    use crate::AswangKind;

    #[test]
    fn test_update_role_turn_keeps_camel_case_tag() {
        let event = GameEvent::UpdateRoleTurn {
            role: Role::Aswang(AswangKind::Berbalang),
            player: Username::new("lito"),
            message: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "update_roleTurn");
        assert_eq!(json["role"], "aswang-berbalang");
        assert_eq!(json["player"], "lito");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_announce_winners_json_format() {
        let json = serde_json::to_value(GameEvent::AnnounceWinners {
            winners: Winners::Aswang,
        })
        .unwrap();
        assert_eq!(json["type"], "announce_winners");
        assert_eq!(json["winners"], "Aswang");
    }

    #[test]
    fn test_alive_players_list_json_format() {
        let json = serde_json::to_value(GameEvent::AlivePlayersList {
            player_list: vec![Username::new("a"), Username::new("b")],
        })
        .unwrap();
        assert_eq!(json["type"], "alive_players_list");
        assert_eq!(json["player_list"], serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_update_votes_uses_usernames_as_keys() {
        let mut votes = BTreeMap::new();
        votes.insert(Username::new("ana"), 3);
        let json = serde_json::to_value(GameEvent::UpdateVotes { votes }).unwrap();
        assert_eq!(json["type"], "update_votes");
        assert_eq!(json["votes"]["ana"], 3);
    }

    #[test]
    fn test_guess_picked_decodes_from_client_shape() {
        let raw = r#"{"type":"guess_picked","target":"ben","role":"babaylan","message":"x"}"#;
        let event: GameEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(
            event,
            GameEvent::GuessPicked {
                target: Username::new("ben"),
                role: Role::Babaylan,
                message: "x".into(),
            }
        );
    }
}
