//! Vertical-only platform landing.
//!
//! Players never collide with platform sides or undersides; a platform only
//! matters when a falling player's feet sink a little way into its top.
//! Deep penetrations are treated as tunnelling and ignored.

use crate::collision::intersects;
use crate::player::Player;
use crate::world::World;
use crate::{LANDING_TOLERANCE, RESTING_EPSILON};

/// Resolves landings for one frame and returns the index of the platform the
/// player ended up standing on.
///
/// `on_ground` is cleared first and only set again by a landing this call.
/// When several platforms accept the landing, the one with the highest top
/// wins regardless of declaration order.
pub fn resolve_vertical(player: &mut Player, world: &World) -> Option<usize> {
    player.on_ground = false;

    let bounds = player.bounds();
    let bottom = bounds.bottom();
    let mut landing: Option<(usize, f32)> = None;

    for (index, platform) in world.platforms().iter().enumerate() {
        let top = platform.top();
        let accepted = if intersects(&bounds, &platform.bounds()) {
            let penetration = bottom - top;
            player.vel_y > 0.0 && penetration <= player.vel_y.abs() * LANDING_TOLERANCE
        } else {
            is_resting_on(player, bottom, platform.x, platform.x + platform.width, top)
        };

        if accepted && landing.map_or(true, |(_, best)| top < best) {
            landing = Some((index, top));
        }
    }

    let (index, top) = landing?;
    player.y = top - player.height;
    player.vel_y = 0.0;
    player.on_ground = true;
    player.coyote_time = 0.0;
    Some(index)
}

// A snapped player touches the top edge without overlapping it.
fn is_resting_on(player: &Player, bottom: f32, left: f32, right: f32, top: f32) -> bool {
    player.vel_y == 0.0
        && (bottom - top).abs() <= RESTING_EPSILON
        && player.x < right
        && player.x + player.width > left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{integrate, InputIntent};
    use crate::world::Platform;
    use assert_approx_eq::assert_approx_eq;

    fn flat_world() -> World {
        World::new(2000.0, 1000.0, 1000.0, vec![Platform::new(0.0, 500.0, 400.0, 20.0)])
    }

    fn resting_player() -> Player {
        let mut p = Player::new("p", "#fff", 100.0, 500.0 - 48.0);
        p.on_ground = true;
        p
    }

    #[test]
    fn test_rest_on_platform_scenario() {
        let world = flat_world();
        let mut p = resting_player();

        integrate(&mut p, &world, &InputIntent::default(), 0.016);
        assert_approx_eq!(p.vel_y, 32.0, 1e-4);
        assert!(p.y > 452.0);

        assert_eq!(resolve_vertical(&mut p, &world), Some(0));
        assert_eq!(p.y, 452.0);
        assert_eq!(p.vel_y, 0.0);
        assert!(p.on_ground);
        assert_eq!(p.coyote_time, 0.0);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let world = flat_world();
        let mut p = resting_player();
        integrate(&mut p, &world, &InputIntent::default(), 0.016);

        resolve_vertical(&mut p, &world);
        let first = (p.x, p.y, p.vel_y, p.on_ground);
        resolve_vertical(&mut p, &world);
        let second = (p.x, p.y, p.vel_y, p.on_ground);

        assert_eq!(first, second);
        assert!(second.3);
    }

    #[test]
    fn test_airborne_without_contact() {
        let world = flat_world();
        let mut p = Player::new("p", "#fff", 100.0, 100.0);
        p.on_ground = true;
        p.vel_y = 50.0;
        assert_eq!(resolve_vertical(&mut p, &world), None);
        assert!(!p.on_ground);
        assert_eq!(p.y, 100.0);
    }

    #[test]
    fn test_walking_off_edge_clears_ground() {
        let world = flat_world();
        let mut p = resting_player();
        p.x = 400.0;
        assert_eq!(resolve_vertical(&mut p, &world), None);
        assert!(!p.on_ground);
    }

    #[test]
    fn test_rising_through_platform_is_ignored() {
        let world = flat_world();
        let mut p = Player::new("p", "#fff", 100.0, 480.0);
        p.vel_y = -300.0;
        assert_eq!(resolve_vertical(&mut p, &world), None);
        assert_eq!(p.y, 480.0);
        assert_eq!(p.vel_y, -300.0);
    }

    #[test]
    fn test_deep_penetration_is_rejected() {
        let world = flat_world();
        let mut p = Player::new("p", "#fff", 100.0, 500.0 - 48.0 + 10.0);
        // 10px deep but only 100px/s of travel: tolerance is 2px
        p.vel_y = 100.0;
        assert_eq!(resolve_vertical(&mut p, &world), None);
        assert!(!p.on_ground);
    }

    #[test]
    fn test_shallow_penetration_snaps() {
        let world = flat_world();
        let mut p = Player::new("p", "#fff", 100.0, 500.0 - 48.0 + 1.5);
        p.vel_y = 100.0;
        assert_eq!(resolve_vertical(&mut p, &world), Some(0));
        assert_eq!(p.y, 452.0);
    }

    #[test]
    fn test_highest_platform_wins_regardless_of_order() {
        let lower = Platform::new(0.0, 505.0, 400.0, 20.0);
        let upper = Platform::new(0.0, 500.0, 400.0, 20.0);
        let forward = World::new(2000.0, 1000.0, 1000.0, vec![upper, lower]);
        let reverse = World::new(2000.0, 1000.0, 1000.0, vec![lower, upper]);

        for (world, expected) in [(forward, 0), (reverse, 1)] {
            let mut p = Player::new("p", "#fff", 100.0, 460.0);
            // bottom at 508: 8px into upper, 3px into lower; both within 0.02 * 500
            p.vel_y = 500.0;
            assert_eq!(resolve_vertical(&mut p, &world), Some(expected));
            assert_eq!(p.y, 500.0 - 48.0);
        }
    }

    #[test]
    fn test_no_side_collision() {
        let world = World::new(
            2000.0,
            1000.0,
            1000.0,
            vec![Platform::new(200.0, 0.0, 20.0, 1000.0)],
        );
        let mut p = Player::new("p", "#fff", 190.0, 300.0);
        p.vel_x = 200.0;
        resolve_vertical(&mut p, &world);
        assert_eq!(p.x, 190.0);
        assert!(!p.on_ground);
    }
}
