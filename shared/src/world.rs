//! Static level geometry.
//!
//! A [`World`] is built once and never mutated afterwards. The server and
//! every client construct the same default level, so there is no need to put
//! geometry on the wire.

use crate::collision::Aabb;
use crate::{GRAVITY, WORLD_HEIGHT, WORLD_WIDTH};

/// Immutable platform rectangle. `y` is the top edge; y grows downward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Platform {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Platform {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.width, self.height)
    }

    /// Y of the walkable surface.
    pub fn top(&self) -> f32 {
        self.y
    }
}

/// Level description: gravity, extents and platforms in declaration order.
#[derive(Debug, Clone)]
pub struct World {
    pub gravity: f32,
    pub width: f32,
    pub height: f32,
    platforms: Vec<Platform>,
}

impl World {
    pub fn new(gravity: f32, width: f32, height: f32, platforms: Vec<Platform>) -> Self {
        Self {
            gravity,
            width,
            height,
            platforms,
        }
    }

    /// Platforms in declaration order. Ties between equal tops go to the earlier one.
    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }
}

const LEVEL: [Platform; 33] = [
    // Starting area
    Platform::new(0.0, 1750.0, 400.0, 50.0),
    Platform::new(350.0, 1650.0, 150.0, 20.0),
    Platform::new(500.0, 1550.0, 150.0, 20.0),
    Platform::new(650.0, 1450.0, 150.0, 20.0),
    // Floating islands
    Platform::new(850.0, 1450.0, 200.0, 20.0),
    Platform::new(1100.0, 1400.0, 180.0, 20.0),
    Platform::new(1330.0, 1450.0, 150.0, 20.0),
    Platform::new(1530.0, 1550.0, 200.0, 20.0),
    Platform::new(1780.0, 1600.0, 250.0, 20.0),
    // Tower
    Platform::new(2050.0, 1700.0, 200.0, 30.0),
    Platform::new(2150.0, 1550.0, 120.0, 20.0),
    Platform::new(2080.0, 1400.0, 120.0, 20.0),
    Platform::new(2180.0, 1250.0, 120.0, 20.0),
    Platform::new(2080.0, 1100.0, 150.0, 20.0),
    Platform::new(2280.0, 950.0, 150.0, 20.0),
    // Sky bridge
    Platform::new(2480.0, 900.0, 200.0, 20.0),
    Platform::new(2730.0, 950.0, 200.0, 20.0),
    Platform::new(2950.0, 1000.0, 200.0, 20.0),
    // Return path
    Platform::new(2850.0, 1150.0, 150.0, 20.0),
    Platform::new(2700.0, 1300.0, 150.0, 20.0),
    Platform::new(2550.0, 1450.0, 150.0, 20.0),
    Platform::new(2400.0, 1600.0, 150.0, 20.0),
    // Lower ground strips
    Platform::new(600.0, 1750.0, 400.0, 50.0),
    Platform::new(1100.0, 1750.0, 300.0, 50.0),
    Platform::new(1500.0, 1750.0, 400.0, 50.0),
    // Shortcuts
    Platform::new(250.0, 1550.0, 120.0, 20.0),
    Platform::new(450.0, 1350.0, 120.0, 20.0),
    Platform::new(1300.0, 1300.0, 150.0, 20.0),
    Platform::new(1650.0, 1400.0, 120.0, 20.0),
    Platform::new(200.0, 1200.0, 180.0, 20.0),
    Platform::new(50.0, 1050.0, 150.0, 20.0),
    // Boundary walls
    Platform::new(0.0, 0.0, 20.0, 1800.0),
    Platform::new(3180.0, 0.0, 20.0, 1800.0),
];

impl Default for World {
    /// The shipped level.
    fn default() -> Self {
        Self::new(GRAVITY, WORLD_WIDTH, WORLD_HEIGHT, LEVEL.to_vec())
    }
}
