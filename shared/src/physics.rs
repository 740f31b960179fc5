//! Per-frame movement integration shared by client prediction and tests.
//!
//! [`integrate`] only moves the player; it never looks at platforms. Landing
//! correction is a separate pass in [`crate::resolve`], so a caller always
//! runs the two back to back.

use crate::player::{Facing, Player};
use crate::world::World;
use crate::{COYOTE_WINDOW, FRICTION, JUMP_VELOCITY, MAX_SPEED, MOVE_ACCEL};

/// Boolean intents polled once per tick from whatever drives the player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputIntent {
    pub left: bool,
    pub right: bool,
    pub jump: bool,
    pub shoot: bool,
}

/// Returns true when a jump input would be honoured right now.
pub fn can_jump(player: &Player) -> bool {
    (player.on_ground || player.coyote_time < COYOTE_WINDOW) && player.vel_y >= 0.0
}

/// Advances `player` by `dt` seconds. Returns whether a jump was taken.
///
/// Friction is a flat multiplier per call rather than `FRICTION.powf(dt)`, so
/// its strength depends on the caller's step size. Both the client and the
/// bot step at a fixed 60 Hz.
pub fn integrate(player: &mut Player, world: &World, input: &InputIntent, dt: f32) -> bool {
    if player.on_ground {
        player.coyote_time = 0.0;
    } else {
        player.coyote_time += dt;
    }

    if input.left {
        player.vel_x -= MOVE_ACCEL * dt;
        player.facing = Facing::Left;
    } else if input.right {
        player.vel_x += MOVE_ACCEL * dt;
        player.facing = Facing::Right;
    } else {
        player.vel_x *= FRICTION;
    }
    player.vel_x = player.vel_x.clamp(-MAX_SPEED, MAX_SPEED);

    let jumped = input.jump && can_jump(player);
    if jumped {
        player.vel_y = JUMP_VELOCITY;
        // Consume the grace window so a second jump cannot be taken mid-air
        player.coyote_time = COYOTE_WINDOW;
    }

    player.vel_y += world.gravity * dt;

    player.x += player.vel_x * dt;
    player.y += player.vel_y * dt;

    jumped
}
