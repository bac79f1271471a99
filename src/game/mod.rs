//! Game simulation modules

pub mod combat;
pub mod drops;
pub mod physics;
pub mod room;
pub mod snapshot;

pub use room::{Player, RoomHandle, RoomRegistry, RoomState};

use uuid::Uuid;

use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Message forwarded from a connection into its room task
#[derive(Debug, Clone)]
pub enum RoomInbound {
    /// Player admitted by the session registry (name already sanitized)
    Join { conn_id: Uuid, name: String },
    /// Gameplay message from a live connection
    Msg { conn_id: Uuid, msg: ClientMsg },
    /// Connection closed; remove the player immediately
    Leave { conn_id: Uuid },
}

/// Delivery scope for an outbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connection in the room
    Room,
    /// One connection only
    One(Uuid),
}

/// Outbound envelope published on a room's broadcast channel; each
/// connection's writer task filters by recipient.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub to: Recipient,
    pub msg: ServerMsg,
}

impl Outbound {
    pub fn room(msg: ServerMsg) -> Self {
        Self {
            to: Recipient::Room,
            msg,
        }
    }

    pub fn one(conn_id: Uuid, msg: ServerMsg) -> Self {
        Self {
            to: Recipient::One(conn_id),
            msg,
        }
    }
}
