//! Server-minted projectiles.
//!
//! A bullet stores its spawn point and age instead of a velocity. Its
//! position at any moment is `spawn + direction * speed * age`, so anyone
//! holding the spawn data can recompute it exactly.

use crate::collision::Aabb;
use crate::player::Facing;
use crate::protocol::BulletState;
use crate::world::World;
use crate::{BULLET_HEIGHT, BULLET_LIFETIME, BULLET_SPEED, BULLET_WIDTH};

#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub id: String,
    pub owner: String,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub direction: Facing,
    pub speed: f32,
    pub width: f32,
    pub height: f32,
    pub age: f32,
    pub lifetime: f32,
}

impl Bullet {
    pub fn new(
        id: impl Into<String>,
        owner: impl Into<String>,
        x: f32,
        y: f32,
        direction: Facing,
    ) -> Self {
        Self {
            id: id.into(),
            owner: owner.into(),
            spawn_x: x,
            spawn_y: y,
            direction,
            speed: BULLET_SPEED,
            width: BULLET_WIDTH,
            height: BULLET_HEIGHT,
            age: 0.0,
            lifetime: BULLET_LIFETIME,
        }
    }

    /// Ages the bullet. Its position is derived from age, never stored.
    pub fn advance(&mut self, dt: f32) {
        self.age += dt;
    }

    /// Where the bullet is after `age` seconds of flight.
    pub fn position_at(&self, age: f32) -> (f32, f32) {
        (
            self.spawn_x + self.direction.sign() * self.speed * age,
            self.spawn_y,
        )
    }

    /// Current horizontal position.
    pub fn x(&self) -> f32 {
        self.position_at(self.age).0
    }

    pub fn y(&self) -> f32 {
        self.spawn_y
    }

    /// Hit box at the current age.
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.x(), self.y(), self.width, self.height)
    }

    /// True once the bullet has outlived [`BULLET_LIFETIME`](crate::BULLET_LIFETIME).
    pub fn is_expired(&self) -> bool {
        self.age >= self.lifetime
    }

    /// True when the bullet has left the world horizontally.
    pub fn is_out_of_bounds(&self, world: &World) -> bool {
        let x = self.x();
        x <= 0.0 || x >= world.width
    }

    /// Expired or out of bounds.
    pub fn should_cull(&self, world: &World) -> bool {
        self.is_expired() || self.is_out_of_bounds(world)
    }

    /// Wire form for snapshots.
    pub fn to_state(&self) -> BulletState {
        BulletState {
            id: self.id.clone(),
            owner_name: self.owner.clone(),
            x: self.x(),
            y: self.y(),
            direction: self.direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_position_is_function_of_age() {
        let mut b = Bullet::new("a_1", "a", 1000.0, 500.0, Facing::Right);
        for _ in 0..30 {
            b.advance(1.0 / 60.0);
        }
        assert_approx_eq!(b.x(), 1000.0 + 600.0 * 0.5, 1e-2);
        assert_eq!(b.y(), 500.0);
        assert_approx_eq!(b.x(), b.position_at(b.age).0, 1e-6);

        let left = Bullet::new("a_2", "a", 1000.0, 500.0, Facing::Left);
        assert_approx_eq!(left.position_at(0.25).0, 1000.0 - 150.0, 1e-3);
    }

    #[test]
    fn test_expiry() {
        let mut b = Bullet::new("a_1", "a", 1000.0, 500.0, Facing::Right);
        b.advance(1.5);
        assert!(!b.is_expired());
        b.advance(0.5);
        assert!(b.is_expired());
    }

    #[test]
    fn test_cull_iff_expired_or_outside() {
        let world = World::default();
        let cases = [
            // (spawn_x, direction, age, expected)
            (1000.0, Facing::Right, 0.0, false),
            (1000.0, Facing::Right, 2.0, true),
            (0.0, Facing::Right, 0.0, true),
            (3200.0, Facing::Left, 0.0, true),
            (3190.0, Facing::Right, 0.1, true),
            (10.0, Facing::Left, 0.1, true),
            (10.0, Facing::Right, 0.1, false),
        ];
        for (x, dir, age, expected) in cases {
            let mut b = Bullet::new("id", "owner", x, 100.0, dir);
            b.advance(age);
            let outside = b.x() <= 0.0 || b.x() >= world.width;
            assert_eq!(b.should_cull(&world), b.age >= b.lifetime || outside);
            assert_eq!(b.should_cull(&world), expected, "spawn {x} age {age}");
        }
    }

    #[test]
    fn test_to_state() {
        let mut b = Bullet::new("bob_7", "bob", 200.0, 40.0, Facing::Left);
        b.advance(0.1);
        let state = b.to_state();
        assert_eq!(state.id, "bob_7");
        assert_eq!(state.owner_name, "bob");
        assert_approx_eq!(state.x, 140.0, 1e-3);
        assert_eq!(state.direction, Facing::Left);
    }
}
