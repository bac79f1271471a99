//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origin for CORS ("*" allows any)
    pub client_origin: String,

    /// Maximum concurrent connections per client origin address
    pub max_connections_per_origin: u32,
    /// Maximum inbound messages per second per connection
    pub max_messages_per_second: u32,

    /// Gameplay tunables shared by every room
    pub game: GameConfig,
}

/// Gameplay tunables. Velocity and acceleration are in units per tick,
/// matching the fixed-step integrator.
#[derive(Clone, Copy, Debug)]
pub struct GameConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Radius of the circular arena
    pub arena_radius: f32,
    /// Player collision radius
    pub player_radius: f32,
    /// Speed cap while walking
    pub walk_speed: f32,
    /// Speed cap while sprinting
    pub run_speed: f32,
    /// Per-axis acceleration per tick while a direction key is held
    pub acceleration: f32,
    /// Multiplicative velocity decay per tick
    pub friction: f32,
    /// Minimum interval between melee attacks
    pub attack_cooldown_ms: u64,
    /// Melee hit radius around the attacker
    pub attack_radius: f32,
    /// Minimum interval between dashes
    pub dash_cooldown_ms: u64,
    /// Velocity magnitude set by a dash
    pub dash_speed: f32,
    /// Delay between death and respawn
    pub respawn_delay_ms: u64,
    /// Length of the post-win reset window
    pub reset_delay_ms: u64,
    /// Score needed to win a round
    pub win_score: u32,
    /// Radius within which a health drop is consumed
    pub pickup_radius: f32,
    /// Health restored by one drop
    pub heal_amount: i32,
    /// Base knockback impulse on hit
    pub knockback_base: f32,
    /// Knockback added per unit of attacker speed
    pub knockback_scale: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            arena_radius: 470.0,
            player_radius: 25.0,
            walk_speed: 7.0,
            run_speed: 21.0,
            acceleration: 2.0,
            friction: 0.85,
            attack_cooldown_ms: 400,
            attack_radius: 60.0,
            dash_cooldown_ms: 800,
            dash_speed: 35.0,
            respawn_delay_ms: 3000,
            reset_delay_ms: 5000,
            win_score: 5,
            pickup_radius: 30.0,
            heal_amount: 50,
            knockback_base: 20.0,
            knockback_scale: 1.5,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let defaults = GameConfig::default();
        let game = GameConfig {
            tick_rate: var_or("TICK_RATE", defaults.tick_rate)?,
            arena_radius: var_or("ARENA_RADIUS", defaults.arena_radius)?,
            player_radius: var_or("PLAYER_RADIUS", defaults.player_radius)?,
            walk_speed: var_or("WALK_SPEED", defaults.walk_speed)?,
            run_speed: var_or("RUN_SPEED", defaults.run_speed)?,
            acceleration: var_or("ACCELERATION", defaults.acceleration)?,
            friction: var_or("FRICTION", defaults.friction)?,
            attack_cooldown_ms: var_or("ATTACK_COOLDOWN_MS", defaults.attack_cooldown_ms)?,
            attack_radius: var_or("ATTACK_RADIUS", defaults.attack_radius)?,
            dash_cooldown_ms: var_or("DASH_COOLDOWN_MS", defaults.dash_cooldown_ms)?,
            dash_speed: var_or("DASH_SPEED", defaults.dash_speed)?,
            respawn_delay_ms: var_or("RESPAWN_DELAY_MS", defaults.respawn_delay_ms)?,
            reset_delay_ms: var_or("RESET_DELAY_MS", defaults.reset_delay_ms)?,
            win_score: var_or("WIN_SCORE", defaults.win_score)?,
            pickup_radius: var_or("PICKUP_RADIUS", defaults.pickup_radius)?,
            heal_amount: var_or("HEAL_AMOUNT", defaults.heal_amount)?,
            knockback_base: var_or("KNOCKBACK_BASE", defaults.knockback_base)?,
            knockback_scale: var_or("KNOCKBACK_SCALE", defaults.knockback_scale)?,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            max_connections_per_origin: var_or("MAX_CONNECTIONS_PER_ORIGIN", 10)?,
            max_messages_per_second: var_or("MAX_MESSAGES_PER_SECOND", 500)?,

            game,
        })
    }
}

/// Parse an environment variable, falling back to a default when unset
fn var_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_game_rules() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.tick_rate, 60);
        assert_eq!(cfg.win_score, 5);
        assert_eq!(cfg.attack_cooldown_ms, 400);
        assert!(cfg.run_speed > cfg.walk_speed);
        assert!(cfg.friction < 1.0);
    }
}
