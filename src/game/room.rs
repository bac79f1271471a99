//! Room state and authoritative tick loop
//!
//! Each room is an isolated simulation owned by a single tokio task:
//! inbound messages are drained at the top of a tick, attacks buffered
//! during the drain resolve only after that tick's physics settles, and
//! the finished state is broadcast once per tick. Rooms are created on
//! first join and never destroyed; an empty room just stops producing
//! broadcasts.

use dashmap::DashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::util::time::{tick_period, unix_millis};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::drops::DropStore;
use super::{combat, physics, snapshot, Outbound, RoomInbound};

/// Maximum health; respawns and room resets restore to this
pub const MAX_HP: i32 = 100;

/// Directional intent buffered from the last input message
#[derive(Debug, Clone, Copy, Default)]
pub struct Controls {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
}

/// Authoritative per-player state
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    /// Cosmetic color assigned at join
    pub color: String,

    // Kinematics
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub angle: f32,

    // Combat
    pub hp: i32,
    pub score: u32,
    pub alive: bool,
    /// Valid only while dead
    pub respawn_due: u64,
    pub last_attack: u64,
    pub last_dash: u64,

    // Control surface
    pub controls: Controls,
    pub pending_dash: bool,
}

impl Player {
    pub fn new(id: Uuid, name: String, color: String) -> Self {
        Self {
            id,
            name,
            color,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            angle: 0.0,
            hp: MAX_HP,
            score: 0,
            alive: true,
            respawn_due: 0,
            last_attack: 0,
            last_dash: 0,
            controls: Controls::default(),
            pending_dash: false,
        }
    }
}

/// Display names: alphanumeric and spaces, at most 12 chars
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .take(12)
        .collect();
    if cleaned.trim().is_empty() {
        "Gladiator".to_string()
    } else {
        cleaned
    }
}

/// Room ids: alphanumeric only, at most 6 chars
pub fn sanitize_room(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect();
    if cleaned.is_empty() {
        "global".to_string()
    } else {
        cleaned
    }
}

/// Simulation state owned by one room task. Pure with respect to time:
/// every entry point takes `now` in unix milliseconds so the pipeline is
/// testable without a clock.
pub struct RoomState {
    pub name: String,
    pub cfg: GameConfig,
    pub players: BTreeMap<Uuid, Player>,
    pub drops: DropStore,
    pub resetting: bool,
    reset_due: u64,
    pending_attacks: Vec<Uuid>,
    rng: ChaCha8Rng,
}

impl RoomState {
    pub fn new(name: String, cfg: GameConfig, seed: u64) -> Self {
        Self {
            name,
            cfg,
            players: BTreeMap::new(),
            drops: DropStore::new(),
            resetting: false,
            reset_due: 0,
            pending_attacks: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Apply one inbound message. Only control-surface state changes
    /// here; attacks and dashes are buffered for the next tick.
    pub fn handle(&mut self, inbound: RoomInbound) -> Vec<Outbound> {
        match inbound {
            RoomInbound::Join { conn_id, name } => {
                let color = random_color(&mut self.rng);
                info!(room = %self.name, conn_id = %conn_id, name = %name, "Player joined room");
                self.players.insert(conn_id, Player::new(conn_id, name, color));
                vec![
                    Outbound::one(conn_id, ServerMsg::JoinConfirmed {}),
                    Outbound::one(conn_id, snapshot::drops_update(&self.drops)),
                ]
            }
            RoomInbound::Msg { conn_id, msg } => {
                // Lifecycle race: messages from an already-removed player are no-ops
                let Some(p) = self.players.get_mut(&conn_id) else {
                    return Vec::new();
                };
                match msg {
                    ClientMsg::Input { w, a, s, d, shift } => {
                        p.controls = Controls {
                            up: w,
                            down: s,
                            left: a,
                            right: d,
                            sprint: shift,
                        };
                    }
                    ClientMsg::Aim { angle } => {
                        if angle.is_finite() {
                            p.angle = angle;
                        }
                    }
                    ClientMsg::Attack {} => {
                        self.pending_attacks.push(conn_id);
                    }
                    ClientMsg::Dash {} => {
                        p.pending_dash = true;
                    }
                    // The session layer never forwards a second join
                    ClientMsg::Join { .. } => {}
                }
                Vec::new()
            }
            RoomInbound::Leave { conn_id } => {
                if self.players.remove(&conn_id).is_some() {
                    info!(room = %self.name, conn_id = %conn_id, "Player left room");
                }
                Vec::new()
            }
        }
    }

    /// Advance the simulation one tick: physics and respawns, then the
    /// buffered attacks, then pickups, then the room snapshot.
    pub fn tick(&mut self, now: u64) -> Vec<Outbound> {
        let mut out = Vec::new();

        if self.resetting {
            // Frozen window: no physics, combat or pickups
            self.pending_attacks.clear();
            if now >= self.reset_due {
                self.finish_reset();
                debug!(room = %self.name, "Round reset complete");
            }
            if !self.players.is_empty() {
                out.push(Outbound::room(snapshot::room_update(&self.players)));
            }
            return out;
        }

        let mut respawned = Vec::new();
        for p in self.players.values_mut() {
            if !p.alive {
                p.pending_dash = false;
                if now >= p.respawn_due {
                    p.alive = true;
                    p.hp = MAX_HP;
                    let (x, y) = physics::respawn_position(&mut self.rng, self.cfg.arena_radius);
                    p.x = x;
                    p.y = y;
                    p.vx = 0.0;
                    p.vy = 0.0;
                    respawned.push(p.id);
                }
                continue;
            }

            if p.pending_dash && combat::dash_ready(now, p.last_dash, &self.cfg) {
                p.last_dash = now;
                physics::apply_dash(p, &self.cfg);
            } else {
                physics::apply_controls(p, &self.cfg);
            }
            p.pending_dash = false;
            physics::integrate(p, &self.cfg);
        }
        for id in respawned {
            out.push(Outbound::room(ServerMsg::PlayerRespawned { id }));
        }

        let attacks = std::mem::take(&mut self.pending_attacks);
        for attacker_id in attacks {
            out.extend(self.resolve_attack(attacker_id, now));
        }

        if !self.drops.is_empty() {
            let ids: Vec<Uuid> = self.players.keys().copied().collect();
            for id in ids {
                let Some(p) = self.players.get_mut(&id) else { continue };
                if !p.alive || p.hp >= MAX_HP {
                    continue;
                }
                if self
                    .drops
                    .take_within(p.x, p.y, self.cfg.pickup_radius)
                    .is_some()
                {
                    p.hp = (p.hp + self.cfg.heal_amount).min(MAX_HP);
                    out.push(Outbound::room(snapshot::drops_update(&self.drops)));
                }
            }
        }

        if !self.players.is_empty() {
            out.push(Outbound::room(snapshot::room_update(&self.players)));
        }
        out
    }

    /// Resolve one buffered attack against every living player in range
    fn resolve_attack(&mut self, attacker_id: Uuid, now: u64) -> Vec<Outbound> {
        let mut out = Vec::new();
        if self.resetting {
            return out;
        }
        let Some(attacker) = self.players.get_mut(&attacker_id) else {
            return out;
        };
        if !attacker.alive || !combat::cooldown_elapsed(now, attacker.last_attack, &self.cfg) {
            return out;
        }
        attacker.last_attack = now;
        let (ax, ay) = (attacker.x, attacker.y);
        let speed = (attacker.vx * attacker.vx + attacker.vy * attacker.vy).sqrt();

        out.push(Outbound::room(ServerMsg::PlayerAttacked { id: attacker_id }));

        let damage = combat::damage_for_speed(speed, &self.cfg);
        let knockback = combat::knockback_for_speed(speed, &self.cfg);

        let target_ids: Vec<Uuid> = self
            .players
            .keys()
            .copied()
            .filter(|id| *id != attacker_id)
            .collect();

        let mut kills = 0u32;
        for target_id in target_ids {
            let Some(target) = self.players.get_mut(&target_id) else {
                continue;
            };
            if !target.alive {
                continue;
            }
            let dx = target.x - ax;
            let dy = target.y - ay;
            if (dx * dx + dy * dy).sqrt() >= self.cfg.attack_radius {
                continue;
            }

            target.hp -= damage;
            let hit_angle = dy.atan2(dx);
            target.vx += hit_angle.cos() * knockback;
            target.vy += hit_angle.sin() * knockback;

            out.push(Outbound::room(ServerMsg::Hit {
                id: target_id,
                dmg: damage,
            }));
            out.push(Outbound::room(ServerMsg::BloodEffect {
                x: target.x,
                y: target.y,
            }));

            if target.hp <= 0 {
                target.hp = 0;
                target.alive = false;
                target.vx = 0.0;
                target.vy = 0.0;
                target.respawn_due = now + self.cfg.respawn_delay_ms;
                let (death_x, death_y) = (target.x, target.y);
                kills += 1;

                self.drops.spawn(death_x, death_y);
                out.push(Outbound::room(snapshot::drops_update(&self.drops)));
                out.push(Outbound::room(ServerMsg::PlayerDied {
                    id: target_id,
                    x: death_x,
                    y: death_y,
                    respawn_in: self.cfg.respawn_delay_ms,
                }));
                out.push(Outbound::one(
                    target_id,
                    ServerMsg::RespawnTimer {
                        ms_left: self.cfg.respawn_delay_ms,
                    },
                ));
            }
        }

        if kills > 0 {
            let mut winner = None;
            if let Some(attacker) = self.players.get_mut(&attacker_id) {
                attacker.score += kills;
                if attacker.score >= self.cfg.win_score {
                    winner = Some(attacker.name.clone());
                }
            }
            if let Some(winner_name) = winner {
                out.extend(self.begin_reset(winner_name, now));
            }
        }
        out
    }

    /// Active -> Resetting. Fires at most once per round.
    fn begin_reset(&mut self, winner_name: String, now: u64) -> Vec<Outbound> {
        if self.resetting {
            return Vec::new();
        }
        info!(room = %self.name, winner = %winner_name, "Round over, resetting");
        self.resetting = true;
        self.reset_due = now + self.cfg.reset_delay_ms;
        self.drops.clear();
        vec![
            Outbound::room(ServerMsg::GameOver { winner_name }),
            Outbound::room(snapshot::drops_update(&self.drops)),
        ]
    }

    /// Resetting -> Active. Idempotent: safe to run on an already-reset room.
    fn finish_reset(&mut self) {
        for p in self.players.values_mut() {
            p.score = 0;
            p.hp = MAX_HP;
            p.alive = true;
            p.x = 0.0;
            p.y = 0.0;
            p.vx = 0.0;
            p.vy = 0.0;
        }
        self.resetting = false;
    }
}

/// Random armor/leather cosmetic color
fn random_color(rng: &mut ChaCha8Rng) -> String {
    if rng.gen_bool(0.5) {
        format!(
            "hsl(210, {:.0}%, {:.0}%)",
            rng.gen_range(0.0..15.0f32),
            40.0 + rng.gen_range(0.0..30.0f32)
        )
    } else {
        format!(
            "hsl({:.0}, {:.0}%, {:.0}%)",
            25.0 + rng.gen_range(0.0..15.0f32),
            50.0 + rng.gen_range(0.0..30.0f32),
            30.0 + rng.gen_range(0.0..20.0f32)
        )
    }
}

/// Handle to a running room task
#[derive(Clone)]
pub struct RoomHandle {
    pub name: String,
    pub input_tx: mpsc::Sender<RoomInbound>,
    pub outbound_tx: broadcast::Sender<Outbound>,
    player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// One room's tick task: drains inbound messages, advances the
/// simulation and publishes the outbound envelopes.
pub struct GameRoom {
    state: RoomState,
    input_rx: mpsc::Receiver<RoomInbound>,
    outbound_tx: broadcast::Sender<Outbound>,
    player_count: Arc<AtomicUsize>,
}

impl GameRoom {
    pub fn new(name: String, cfg: GameConfig) -> (Self, RoomHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (outbound_tx, _) = broadcast::channel(256);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            name: name.clone(),
            input_tx,
            outbound_tx: outbound_tx.clone(),
            player_count: player_count.clone(),
        };

        let room = Self {
            state: RoomState::new(name, cfg, rand::random()),
            input_rx,
            outbound_tx,
            player_count,
        };

        (room, handle)
    }

    /// Run the fixed-rate tick loop. The task holds exclusive ownership
    /// of the room state; it never exits because the registry keeps a
    /// sender alive for future joins.
    pub async fn run(mut self) {
        info!(room = %self.state.name, "Room task started");

        let mut ticker = interval(tick_period(self.state.cfg.tick_rate));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let now = unix_millis();

            let mut out = Vec::new();
            while let Ok(inbound) = self.input_rx.try_recv() {
                out.extend(self.state.handle(inbound));
            }

            out.extend(self.state.tick(now));

            self.player_count
                .store(self.state.players.len(), Ordering::Relaxed);

            for envelope in out {
                // Err means no connected receivers; an empty room is fine
                let _ = self.outbound_tx.send(envelope);
            }
        }
    }
}

/// Registry of all live rooms, keyed by sanitized room id
pub struct RoomRegistry {
    cfg: GameConfig,
    rooms: DashMap<String, RoomHandle>,
}

impl RoomRegistry {
    pub fn new(cfg: GameConfig) -> Self {
        Self {
            cfg,
            rooms: DashMap::new(),
        }
    }

    /// Look up a room, spawning its task on first reference
    pub fn get_or_create(&self, room: &str) -> RoomHandle {
        self.rooms
            .entry(room.to_string())
            .or_insert_with(|| {
                let (game_room, handle) = GameRoom::new(room.to_string(), self.cfg);
                tokio::spawn(game_room.run());
                handle
            })
            .clone()
    }

    /// Admit a connection into a room: sanitizes the requested name and
    /// room id, registers the player, and returns the channels the
    /// connection uses from then on. The outbound subscription is taken
    /// before the join is enqueued so the confirmation is not missed.
    pub async fn join(
        &self,
        conn_id: Uuid,
        raw_name: &str,
        raw_room: &str,
    ) -> (mpsc::Sender<RoomInbound>, broadcast::Receiver<Outbound>) {
        let name = sanitize_name(raw_name);
        let room = sanitize_room(raw_room);
        let handle = self.get_or_create(&room);
        let outbound_rx = handle.outbound_tx.subscribe();
        let _ = handle
            .input_tx
            .send(RoomInbound::Join { conn_id, name })
            .await;
        (handle.input_tx.clone(), outbound_rx)
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }
}
