//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Messages sent from client to server. Clients are untrusted: payloads
/// that fail to parse are dropped at the transport boundary, missing
/// input flags default to false.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join a named room; name and room are sanitized server-side
    Join {
        #[serde(default)]
        name: String,
        #[serde(default)]
        room: String,
    },

    /// Directional intent for the next tick
    Input {
        #[serde(default)]
        w: bool,
        #[serde(default)]
        a: bool,
        #[serde(default)]
        s: bool,
        #[serde(default)]
        d: bool,
        #[serde(default)]
        shift: bool,
    },

    /// Aim direction in radians
    Aim { angle: f32 },

    /// Melee attack at the current position
    Attack {},

    /// Burst of speed along the current aim angle
    Dash {},
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Join accepted (private to the joining connection)
    JoinConfirmed {},

    /// Full room state, once per tick
    Update {
        players: HashMap<Uuid, PlayerPublicState>,
    },

    /// A player swung (drives the attack animation)
    PlayerAttacked { id: Uuid },

    /// A swing connected
    Hit { id: Uuid, dmg: i32 },

    /// Impact location for the blood particle effect
    BloodEffect { x: f32, y: f32 },

    /// A player died; respawn_in is the delay until they return
    PlayerDied {
        id: Uuid,
        x: f32,
        y: f32,
        respawn_in: u64,
    },

    /// Respawn countdown (private to the dying player)
    RespawnTimer { ms_left: u64 },

    /// A dead player came back
    PlayerRespawned { id: Uuid },

    /// Complete set of health drops in the room
    HealthDropsUpdate { drops: BTreeMap<u64, DropPublic> },

    /// Round over; the room enters its reset window
    GameOver { winner_name: String },

    /// Terminal error (abuse control rejection)
    Error { code: String, message: String },
}

/// Per-player state visible to every room member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerPublicState {
    pub id: Uuid,
    pub name: String,
    /// Cosmetic color assigned at join
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Facing angle in radians
    pub angle: f32,
    pub hp: i32,
    pub score: u32,
    pub is_dead: bool,
}

/// Health drop position as broadcast to the room
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DropPublic {
    pub x: f32,
    pub y: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_missing_fields_default_to_false() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"input","w":true}"#).unwrap();
        match msg {
            ClientMsg::Input { w, a, s, d, shift } => {
                assert!(w);
                assert!(!a && !s && !d && !shift);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn garbage_payload_fails_to_parse() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"input","w":"yes"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"aim","angle":"up"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>("not json").is_err());
    }

    #[test]
    fn server_messages_tag_snake_case() {
        let json = serde_json::to_string(&ServerMsg::GameOver {
            winner_name: "Ada".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""type":"game_over""#));
        assert!(json.contains(r#""winner_name":"Ada""#));
    }
}
