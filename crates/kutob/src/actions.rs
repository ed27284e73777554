//! Client actions and the responses they get.
//!
//! These are the only things a client submits. Broadcast events travel the
//! other way, through the broadcaster.

use kutob_protocol::{Role, RoomCode, Username};
use serde::{Deserialize, Serialize};

/// An action submitted by a client.
///
/// Tagged by `action`:
///
/// ```json
/// {"action":"select_target","room":"ABC123","username":"ana","role":"mangangaso","target":"ben"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    StartGame {
        room: RoomCode,
    },
    SelectTarget {
        room: RoomCode,
        username: Username,
        role: Role,
        target: Username,
    },
    Vote {
        room: RoomCode,
        voter: Username,
        target: Username,
    },
    AbortGame {
        room: RoomCode,
    },
}

impl ClientAction {
    pub fn room(&self) -> &RoomCode {
        match self {
            ClientAction::StartGame { room }
            | ClientAction::SelectTarget { room, .. }
            | ClientAction::Vote { room, .. }
            | ClientAction::AbortGame { room } => room,
        }
    }
}

/// The answer to a [`ClientAction`]. A rejected action changed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResponse {
    Accepted { message: String },
    Rejected { reason: String },
}

impl ActionResponse {
    pub fn accepted(message: impl Into<String>) -> Self {
        ActionResponse::Accepted {
            message: message.into(),
        }
    }

    pub fn rejected(reason: impl ToString) -> Self {
        ActionResponse::Rejected {
            reason: reason.to_string(),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ActionResponse::Accepted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_action_decodes_select_target() {
        let json = r#"{"action":"select_target","room":"ABC123","username":"ana","role":"aswang-berbalang","target":"ben"}"#;
        let action: ClientAction = serde_json::from_str(json).unwrap();
        assert_eq!(
            action,
            ClientAction::SelectTarget {
                room: RoomCode::new("ABC123"),
                username: Username::new("ana"),
                role: Role::Aswang(kutob_protocol::AswangKind::Berbalang),
                target: Username::new("ben"),
            }
        );
        assert_eq!(action.room(), &RoomCode::new("ABC123"));
    }

    #[test]
    fn test_client_action_unknown_role_rejected() {
        let json = r#"{"action":"select_target","room":"A","username":"a","role":"wizard","target":"b"}"#;
        assert!(serde_json::from_str::<ClientAction>(json).is_err());
    }

    #[test]
    fn test_action_response_encodes_status_tag() {
        let json = serde_json::to_string(&ActionResponse::rejected("nope")).unwrap();
        assert_eq!(json, r#"{"status":"rejected","reason":"nope"}"#);
    }
}
