//! Per-tick snapshot construction
//!
//! No delta compression or interest management: every member of a room
//! receives the room's complete public state each tick.

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ws::protocol::{PlayerPublicState, ServerMsg};

use super::drops::DropStore;
use super::room::Player;

/// Build the once-per-tick full room snapshot
pub fn room_update(players: &BTreeMap<Uuid, Player>) -> ServerMsg {
    let players = players
        .iter()
        .map(|(id, p)| (*id, public_state(p)))
        .collect();
    ServerMsg::Update { players }
}

/// Build the full drop-set broadcast for a room
pub fn drops_update(drops: &DropStore) -> ServerMsg {
    ServerMsg::HealthDropsUpdate {
        drops: drops.public_state(),
    }
}

fn public_state(p: &Player) -> PlayerPublicState {
    PlayerPublicState {
        id: p.id,
        name: p.name.clone(),
        color: p.color.clone(),
        x: p.x,
        y: p.y,
        vx: p.vx,
        vy: p.vy,
        angle: p.angle,
        hp: p.hp,
        score: p.score,
        is_dead: !p.alive,
    }
}
