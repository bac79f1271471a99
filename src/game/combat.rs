//! Melee combat math: damage, knockback and cooldown gating
//!
//! Attack resolution over a room's player set lives in the room module;
//! the formulas here are pure so the numbers stay testable in isolation.

use crate::config::GameConfig;

/// Damage for a swing at the given attacker speed, in integer hit points.
/// Faster attackers deal more, bounded to [10, 30]. Speed above the
/// sprint cap (a dash) still counts toward the bonus.
pub fn damage_for_speed(speed: f32, cfg: &GameConfig) -> i32 {
    let raw = 10.0 + (speed / cfg.run_speed) * 20.0;
    raw.clamp(10.0, 30.0).floor() as i32
}

/// Knockback impulse magnitude for a swing at the given attacker speed
pub fn knockback_for_speed(speed: f32, cfg: &GameConfig) -> f32 {
    cfg.knockback_base + speed * cfg.knockback_scale
}

/// Whether enough time has passed since the attacker's last swing
pub fn cooldown_elapsed(now: u64, last_attack: u64, cfg: &GameConfig) -> bool {
    now.saturating_sub(last_attack) >= cfg.attack_cooldown_ms
}

/// Whether enough time has passed since the player's last dash
pub fn dash_ready(now: u64, last_dash: u64, cfg: &GameConfig) -> bool {
    now.saturating_sub(last_dash) >= cfg.dash_cooldown_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn cfg() -> GameConfig {
        GameConfig::default()
    }

    #[test]
    fn standing_attack_deals_base_damage() {
        assert_eq!(damage_for_speed(0.0, &cfg()), 10);
    }

    #[test]
    fn sprint_speed_attack_deals_max_damage() {
        let cfg = cfg();
        assert_eq!(damage_for_speed(cfg.run_speed, &cfg), 30);
    }

    #[test]
    fn damage_is_clamped_above_sprint_speed() {
        let cfg = cfg();
        // Dash speed exceeds the sprint cap but damage stays bounded
        assert_eq!(damage_for_speed(cfg.dash_speed, &cfg), 30);
        assert_eq!(damage_for_speed(1000.0, &cfg), 30);
    }

    #[test]
    fn mid_speed_damage_is_floored() {
        let cfg = cfg();
        // 10 + (10.5/21)*20 = 20.0
        assert_eq!(damage_for_speed(cfg.run_speed / 2.0, &cfg), 20);
    }

    #[test]
    fn knockback_grows_with_speed() {
        let cfg = cfg();
        assert_approx_eq!(knockback_for_speed(0.0, &cfg), cfg.knockback_base, 1e-4);
        assert_approx_eq!(
            knockback_for_speed(10.0, &cfg),
            cfg.knockback_base + 10.0 * cfg.knockback_scale,
            1e-4
        );
    }

    #[test]
    fn cooldown_gates_rapid_attacks() {
        let cfg = cfg();
        assert!(cooldown_elapsed(1000, 0, &cfg));
        assert!(cooldown_elapsed(1000, 600, &cfg));
        assert!(!cooldown_elapsed(1000, 700, &cfg));
        // Clock skew must not panic or underflow
        assert!(!cooldown_elapsed(100, 200, &cfg));
    }

    #[test]
    fn dash_has_its_own_cooldown() {
        let cfg = cfg();
        assert!(dash_ready(800, 0, &cfg));
        assert!(!dash_ready(799, 0, &cfg));
    }
}
