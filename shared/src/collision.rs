//! Axis-aligned bounding boxes and the overlap test everything collides with.

/// Axis-aligned rectangle with its origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Aabb {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Returns true when the two boxes overlap on both axes.
///
/// Boxes that only share an edge do not intersect, so a player resting
/// exactly on a platform top is not "inside" it.
pub fn intersects(a: &Aabb, b: &Aabb) -> bool {
    !(a.right() <= b.x || b.right() <= a.x || a.bottom() <= b.y || b.bottom() <= a.y)
}
