//! Fixed-step movement integration and arena boundary enforcement
//!
//! All constants are per-tick units: velocities are added to positions
//! once per tick with no delta-time scaling.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::config::GameConfig;

use super::room::Player;

/// Apply directional acceleration, friction and the speed cap to a live
/// player's velocity. Sprinting raises the cap; the clamp scales both
/// axes uniformly so direction is preserved.
pub fn apply_controls(p: &mut Player, cfg: &GameConfig) {
    let c = &p.controls;

    if c.up {
        p.vy -= cfg.acceleration;
    }
    if c.down {
        p.vy += cfg.acceleration;
    }
    if c.left {
        p.vx -= cfg.acceleration;
    }
    if c.right {
        p.vx += cfg.acceleration;
    }

    p.vx *= cfg.friction;
    p.vy *= cfg.friction;

    let max_speed = if c.sprint {
        cfg.run_speed
    } else {
        cfg.walk_speed
    };
    let speed = (p.vx * p.vx + p.vy * p.vy).sqrt();
    if speed > max_speed {
        let scale = max_speed / speed;
        p.vx *= scale;
        p.vy *= scale;
    }
}

/// Advance position by velocity, then push the player back inside the
/// circular arena. A boundary hit repositions the player exactly onto
/// the edge along the same radial and inverts velocity at half strength.
pub fn integrate(p: &mut Player, cfg: &GameConfig) {
    p.x += p.vx;
    p.y += p.vy;

    let dist = (p.x * p.x + p.y * p.y).sqrt();
    if dist + cfg.player_radius > cfg.arena_radius {
        let angle = p.y.atan2(p.x);
        let edge = cfg.arena_radius - cfg.player_radius;
        p.x = angle.cos() * edge;
        p.y = angle.sin() * edge;
        p.vx *= -0.5;
        p.vy *= -0.5;
    }
}

/// Replace the player's velocity with a dash impulse along the aim angle
pub fn apply_dash(p: &mut Player, cfg: &GameConfig) {
    p.vx = p.angle.cos() * cfg.dash_speed;
    p.vy = p.angle.sin() * cfg.dash_speed;
}

/// Random respawn position inside the arena, away from the edge
pub fn respawn_position(rng: &mut ChaCha8Rng, arena_radius: f32) -> (f32, f32) {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let dist = rng.gen_range(0.0..(arena_radius - 50.0).max(1.0));
    (angle.cos() * dist, angle.sin() * dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn player() -> Player {
        Player::new(Uuid::new_v4(), "Tester".to_string(), "hsl(210, 10%, 50%)".to_string())
    }

    fn cfg() -> GameConfig {
        GameConfig::default()
    }

    #[test]
    fn acceleration_follows_held_keys() {
        let cfg = cfg();
        let mut p = player();
        p.controls.up = true;
        p.controls.right = true;
        apply_controls(&mut p, &cfg);
        assert!(p.vy < 0.0, "up accelerates in -y");
        assert!(p.vx > 0.0, "right accelerates in +x");
    }

    #[test]
    fn friction_decays_velocity_when_idle() {
        let cfg = cfg();
        let mut p = player();
        p.vx = 10.0;
        p.vy = -4.0;
        apply_controls(&mut p, &cfg);
        assert!(p.vx.abs() < 10.0);
        assert!(p.vy.abs() < 4.0);
    }

    #[test]
    fn speed_clamp_preserves_direction() {
        let cfg = cfg();
        let mut p = player();
        p.vx = 300.0;
        p.vy = 400.0;
        apply_controls(&mut p, &cfg);
        let speed = (p.vx * p.vx + p.vy * p.vy).sqrt();
        assert!(speed <= cfg.walk_speed + 1e-3);
        // Direction unchanged: vy/vx ratio stays 4/3
        assert_approx_eq!(p.vy / p.vx, 400.0 / 300.0, 1e-4);
    }

    #[test]
    fn sprint_cap_exceeds_walk_cap() {
        let cfg = cfg();
        let mut walker = player();
        let mut sprinter = player();
        walker.vx = 100.0;
        sprinter.vx = 100.0;
        sprinter.controls.sprint = true;
        apply_controls(&mut walker, &cfg);
        apply_controls(&mut sprinter, &cfg);
        assert_approx_eq!(walker.vx, cfg.walk_speed, 1e-3);
        assert_approx_eq!(sprinter.vx, cfg.run_speed, 1e-3);
    }

    #[test]
    fn boundary_holds_after_integration() {
        let cfg = cfg();
        let mut p = player();
        p.x = cfg.arena_radius - cfg.player_radius - 1.0;
        p.vx = 50.0;
        integrate(&mut p, &cfg);
        let dist = (p.x * p.x + p.y * p.y).sqrt();
        assert!(dist + cfg.player_radius <= cfg.arena_radius + 1e-3);
    }

    #[test]
    fn boundary_bounce_inverts_and_dampens_velocity() {
        let cfg = cfg();
        let mut p = player();
        p.x = cfg.arena_radius;
        p.vx = 10.0;
        p.vy = 6.0;
        integrate(&mut p, &cfg);
        assert_approx_eq!(p.vx, -5.0, 1e-4);
        assert_approx_eq!(p.vy, -3.0, 1e-4);
        assert_approx_eq!(p.x, cfg.arena_radius - cfg.player_radius, 1e-2);
    }

    #[test]
    fn boundary_invariant_under_sustained_sprint() {
        let cfg = cfg();
        let mut p = player();
        p.controls.right = true;
        p.controls.sprint = true;
        for _ in 0..600 {
            apply_controls(&mut p, &cfg);
            integrate(&mut p, &cfg);
            let dist = (p.x * p.x + p.y * p.y).sqrt();
            assert!(dist + cfg.player_radius <= cfg.arena_radius + 1e-3);
        }
    }

    #[test]
    fn dash_sets_velocity_along_aim() {
        let cfg = cfg();
        let mut p = player();
        p.angle = std::f32::consts::FRAC_PI_2;
        apply_dash(&mut p, &cfg);
        assert_approx_eq!(p.vx, 0.0, 1e-4);
        assert_approx_eq!(p.vy, cfg.dash_speed, 1e-4);
    }

    #[test]
    fn respawn_position_stays_inside_arena() {
        let cfg = cfg();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..100 {
            let (x, y) = respawn_position(&mut rng, cfg.arena_radius);
            let dist = (x * x + y * y).sqrt();
            assert!(dist <= cfg.arena_radius - 50.0 + 1e-3);
        }
    }
}
