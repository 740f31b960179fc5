//! # Shared Simulation Library
//!
//! Everything both sides of the connection must agree on lives here: the
//! static level geometry, the physics integrator, the vertical landing
//! resolver, the player and bullet entities, and the JSON wire protocol.
//!
//! The client runs [`physics::integrate`] and [`resolve::resolve_vertical`]
//! to predict its own player, while the server uses the same entity types and
//! constants to hold the canonical state. Keeping the tuning values in one
//! place means a prediction and a server check can never disagree about what
//! a legal move or a legal shot looks like.

pub mod bullet;
pub mod collision;
pub mod physics;
pub mod player;
pub mod protocol;
pub mod resolve;
pub mod world;

pub use bullet::Bullet;
pub use collision::{intersects, Aabb};
pub use physics::{integrate, InputIntent};
pub use player::{Facing, Player};
pub use resolve::resolve_vertical;
pub use world::{Platform, World};

// World
pub const GRAVITY: f32 = 2000.0;
pub const WORLD_WIDTH: f32 = 3200.0;
pub const WORLD_HEIGHT: f32 = 1800.0;

// Movement tuning
pub const MOVE_ACCEL: f32 = 3000.0;
pub const MAX_SPEED: f32 = 400.0;
pub const JUMP_VELOCITY: f32 = -800.0;
pub const COYOTE_WINDOW: f32 = 0.1;
/// Horizontal velocity multiplier applied once per integrate call with no
/// direction held.
pub const FRICTION: f32 = 0.8;

// Landing
pub const LANDING_TOLERANCE: f32 = 0.02;
pub const RESTING_EPSILON: f32 = 1e-3;

// Player
pub const PLAYER_WIDTH: f32 = 32.0;
pub const PLAYER_HEIGHT: f32 = 48.0;
pub const MAX_HEALTH: u32 = 3;
/// Minimum seconds between two shots from the same player.
pub const FIRE_RATE: f64 = 0.25;
pub const SPAWN_POINT: (f32, f32) = (100.0, 1600.0);
pub const MAX_NAME_LEN: usize = 10;

// Bullets
pub const BULLET_SPEED: f32 = 600.0;
pub const BULLET_WIDTH: f32 = 8.0;
pub const BULLET_HEIGHT: f32 = 4.0;
pub const BULLET_LIFETIME: f32 = 2.0;
pub const BULLET_DAMAGE: u32 = 1;

// Synchronisation
/// Manhattan distance past which a snapshot overrides local prediction.
pub const TELEPORT_THRESHOLD: f32 = 500.0;
/// How close to a server-side respawn a report must land to count as caught up.
pub const RESYNC_RADIUS: f32 = 128.0;
pub const POSITION_REPORT_HZ: u32 = 30;
pub const MAX_FIRE_ORIGIN_DISTANCE: f32 = 128.0;

/// Manhattan distance between two points.
pub fn manhattan(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}
