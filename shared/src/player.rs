//! Player entity with health, fire-rate cooldown and respawn.

use crate::collision::Aabb;
use crate::protocol::PlayerState;
use crate::{FIRE_RATE, MAX_HEALTH, PLAYER_HEIGHT, PLAYER_WIDTH};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Horizontal facing. Encoded on the wire as `-1` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    /// `-1.0` for left, `1.0` for right.
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }
}

impl From<Facing> for i8 {
    fn from(facing: Facing) -> Self {
        match facing {
            Facing::Left => -1,
            Facing::Right => 1,
        }
    }
}

/// Rejected facing value from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidFacing(pub i8);

impl fmt::Display for InvalidFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "facing must be -1 or 1, got {}", self.0)
    }
}

impl TryFrom<i8> for Facing {
    type Error = InvalidFacing;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Facing::Left),
            1 => Ok(Facing::Right),
            other => Err(InvalidFacing(other)),
        }
    }
}

/// A player actor.
///
/// Health is unsigned and only ever changed through saturating operations,
/// so it always stays within `0..=max_health`.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub name: String,
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub width: f32,
    pub height: f32,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub on_ground: bool,
    /// Seconds spent airborne since last touching a platform.
    pub coyote_time: f32,
    pub health: u32,
    pub max_health: u32,
    pub facing: Facing,
    pub fire_rate: f64,
    pub last_shot_time: Option<f64>,
    pub kill_count: u32,
}

impl Player {
    pub fn new(name: impl Into<String>, color: impl Into<String>, spawn_x: f32, spawn_y: f32) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            x: spawn_x,
            y: spawn_y,
            vel_x: 0.0,
            vel_y: 0.0,
            width: PLAYER_WIDTH,
            height: PLAYER_HEIGHT,
            spawn_x,
            spawn_y,
            on_ground: false,
            coyote_time: 0.0,
            health: MAX_HEALTH,
            max_health: MAX_HEALTH,
            facing: Facing::Right,
            fire_rate: FIRE_RATE,
            last_shot_time: None,
            kill_count: 0,
        }
    }

    /// Hit box anchored at the top-left corner.
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.x, self.y, self.width, self.height)
    }

    /// Middle of the hit box. Fire requests are checked against this point.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }

    /// Moves the player back to its spawn point. Health is left alone.
    pub fn respawn(&mut self) {
        self.x = self.spawn_x;
        self.y = self.spawn_y;
        self.vel_x = 0.0;
        self.vel_y = 0.0;
        self.on_ground = false;
        self.coyote_time = 0.0;
    }

    /// Applies damage and returns the remaining health. Never goes below zero.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        self.health = self.health.saturating_sub(amount);
        self.health
    }

    /// Back to full health, used on respawn after a kill.
    pub fn restore_health(&mut self) {
        self.health = self.max_health;
    }

    /// True if `fire_rate` seconds passed since the last shot, or it never fired.
    pub fn can_shoot(&self, now: f64) -> bool {
        match self.last_shot_time {
            Some(last) => now - last >= self.fire_rate,
            None => true,
        }
    }

    /// Records a shot at `now` if the cooldown allows it.
    pub fn shoot(&mut self, now: f64) -> bool {
        if !self.can_shoot(now) {
            return false;
        }
        self.last_shot_time = Some(now);
        true
    }

    /// Wire form for snapshots.
    pub fn to_state(&self) -> PlayerState {
        PlayerState {
            name: self.name.clone(),
            color: self.color.clone(),
            x: self.x,
            y: self.y,
            vel_x: self.vel_x,
            vel_y: self.vel_y,
            facing: self.facing,
            on_ground: self.on_ground,
            health: self.health,
            kill_count: self.kill_count,
        }
    }

    /// Overwrites every replicated field from a snapshot entry.
    pub fn apply_state(&mut self, state: &PlayerState) {
        self.color.clone_from(&state.color);
        self.x = state.x;
        self.y = state.y;
        self.vel_x = state.vel_x;
        self.vel_y = state.vel_y;
        self.facing = state.facing;
        self.on_ground = state.on_ground;
        self.health = state.health.min(self.max_health);
        self.kill_count = state.kill_count;
    }
}
