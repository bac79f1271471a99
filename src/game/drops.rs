//! Health drops spawned at death locations, scoped to one room
//!
//! Ids increase monotonically within a room and the backing map is
//! ordered, so pickup tie-breaks are deterministic: the lowest id wins.

use std::collections::BTreeMap;

use crate::ws::protocol::DropPublic;

/// A pickup lying on the arena floor
#[derive(Debug, Clone, Copy)]
pub struct HealthDrop {
    pub x: f32,
    pub y: f32,
}

/// All drops owned by one room
#[derive(Debug, Default)]
pub struct DropStore {
    next_id: u64,
    drops: BTreeMap<u64, HealthDrop>,
}

impl DropStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a drop at the given location, returning its id
    pub fn spawn(&mut self, x: f32, y: f32) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.drops.insert(id, HealthDrop { x, y });
        id
    }

    /// Remove and return the first drop within `radius` of the position,
    /// in id order. At most one drop is consumed per call.
    pub fn take_within(&mut self, x: f32, y: f32, radius: f32) -> Option<u64> {
        let id = self.drops.iter().find_map(|(id, drop)| {
            let dx = x - drop.x;
            let dy = y - drop.y;
            ((dx * dx + dy * dy).sqrt() < radius).then_some(*id)
        })?;
        self.drops.remove(&id);
        Some(id)
    }

    /// Remove every drop (room reset)
    pub fn clear(&mut self) {
        self.drops.clear();
    }

    pub fn len(&self) -> usize {
        self.drops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drops.is_empty()
    }

    /// Broadcastable view of the current drop set
    pub fn public_state(&self) -> BTreeMap<u64, DropPublic> {
        self.drops
            .iter()
            .map(|(id, d)| (*id, DropPublic { x: d.x, y: d.y }))
            .collect()
    }
}
