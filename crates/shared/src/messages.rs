//! WebSocket message types.
//!
//! Every frame is a JSON object whose `type` field is the event name
//! (`"hero:action"`, `"hero:update"`, ...). Fields are camelCase.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Renaming an event is a breaking change
//! - Unknown event names deserialize to `Unknown`

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use herotycoon_domain::{ActionOutcome, Guild, Hero, World};

use crate::responses::ErrorCode;

/// Room key for a guild's realtime channel.
pub fn guild_room(guild_id: Uuid) -> String {
    format!("guild:{}", guild_id)
}

/// Commands a guild master can issue over the realtime channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterCommandKind {
    /// `target` = hero id, `argument` = action kind
    AssignAction,
    /// `target` = facility type
    BuildFacility,
    /// `target` = policy flag
    SetPolicy,
    /// `target` = policy flag
    ClearPolicy,
}

// =============================================================================
// Client Messages (client -> engine)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Subscribe this connection to `guild:<guildId>`
    #[serde(rename = "join:guild")]
    JoinGuild { guild_id: Uuid },

    #[serde(rename = "leave:guild")]
    LeaveGuild { guild_id: Uuid },

    /// Ask a hero to perform an action
    #[serde(rename = "hero:action")]
    HeroAction {
        hero_id: Uuid,
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guild_id: Option<Uuid>,
    },

    /// Request a `world:state` snapshot
    #[serde(rename = "world:query")]
    WorldQuery { world_id: Uuid },

    #[serde(rename = "master:command")]
    MasterCommand {
        guild_id: Uuid,
        command: MasterCommandKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        argument: Option<String>,
    },

    #[serde(rename = "heartbeat")]
    Heartbeat,

    /// Unknown event name, for forward compatibility
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Server Messages (engine -> client)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// A hero in the room's guild resolved an action
    #[serde(rename = "hero:update")]
    HeroUpdate { hero: Hero, outcome: ActionOutcome },

    #[serde(rename = "world:state")]
    WorldState { world: World },

    /// Acknowledgement of a master command
    #[serde(rename = "master:result")]
    MasterResult {
        guild_id: Uuid,
        command: MasterCommandKind,
        success: bool,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guild: Option<Guild>,
    },

    /// Confirms a `join:guild`
    #[serde(rename = "joined:guild")]
    JoinedGuild { guild_id: Uuid },

    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },

    #[serde(rename = "pong")]
    Pong,
}

impl ServerMessage {
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_use_colon_names_and_camel_case() {
        let hero_id = Uuid::new_v4();
        let json = format!(
            r#"{{"type":"hero:action","heroId":"{}","action":"train"}}"#,
            hero_id
        );
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(
            msg,
            ClientMessage::HeroAction {
                hero_id,
                action: "train".into(),
                guild_id: None
            }
        );
    }

    #[test]
    fn master_commands_parse() {
        let guild_id = Uuid::new_v4();
        let json = format!(
            r#"{{"type":"master:command","guildId":"{}","command":"build_facility","target":"tavern"}}"#,
            guild_id
        );
        let msg: ClientMessage = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::MasterCommand {
                command: MasterCommandKind::BuildFacility,
                ..
            }
        ));
    }

    #[test]
    fn unknown_events_do_not_fail() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"quest:board"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn error_event_shape() {
        let json = serde_json::to_value(ServerMessage::error(ErrorCode::Conflict, "try again")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "error", "code": "conflict", "message": "try again"})
        );
    }

    #[test]
    fn heartbeat_round_trip() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Heartbeat);
        assert_eq!(
            serde_json::to_string(&ServerMessage::Pong).unwrap(),
            r#"{"type":"pong"}"#
        );
    }

    #[test]
    fn rooms_are_keyed_by_guild() {
        let id = Uuid::nil();
        assert_eq!(guild_room(id), format!("guild:{}", id));
    }
}
