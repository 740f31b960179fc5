//! Client-side mirror of the canonical game state.
//!
//! The local player is predicted every physics tick and only snapped to the
//! server's view when the two disagree by more than [`TELEPORT_THRESHOLD`]
//! or the server has respawned it.
//! Remote players and bullets are plain mirrors of the latest snapshot.

use log::{debug, info};
use shared::protocol::{BulletState, FirePayload, PlayerState, PositionPayload, StatePayload};
use shared::{
    integrate, manhattan, resolve_vertical, Facing, InputIntent, Player, World, BULLET_WIDTH,
    SPAWN_POINT, TELEPORT_THRESHOLD,
};
use std::collections::BTreeMap;

/// What a snapshot changed in the local mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// The local player was snapped to the server position
    pub corrected: bool,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Read-only bundle handed to a renderer.
#[derive(Debug, Clone, Copy)]
pub struct RenderView<'a> {
    pub world: &'a World,
    pub local: Option<&'a Player>,
    pub remotes: &'a BTreeMap<String, Player>,
    pub bullets: &'a [BulletState],
}

#[derive(Debug, Clone)]
pub struct ClientGameState {
    world: World,
    local: Option<Player>,
    remotes: BTreeMap<String, Player>,
    bullets: Vec<BulletState>,
    /// Seconds of local simulation, used for the fire cooldown
    clock: f64,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::with_world(World::default())
    }

    /// Empty mirror simulating against a custom level.
    pub fn with_world(world: World) -> Self {
        Self {
            world,
            local: None,
            remotes: BTreeMap::new(),
            bullets: Vec::new(),
            clock: 0.0,
        }
    }

    /// Creates the local player after the server accepted the join.
    pub fn on_joined(&mut self, name: &str, color: &str) {
        info!("Joined as {} ({})", name, color);
        self.reset();
        self.local = Some(Player::new(name, color, SPAWN_POINT.0, SPAWN_POINT.1));
    }

    /// Steps the local player only. Remote mirrors are never simulated.
    pub fn predict(&mut self, input: &InputIntent, dt: f32) {
        self.clock += f64::from(dt);
        if let Some(player) = self.local.as_mut() {
            integrate(player, &self.world, input, dt);
            resolve_vertical(player, &self.world);
        }
    }

    /// Folds a snapshot into the mirror.
    pub fn reconcile(&mut self, state: &StatePayload) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let local_name = self.local.as_ref().map(|p| p.name.clone());

        for entry in &state.players {
            if local_name.as_deref() == Some(entry.name.as_str()) {
                if let Some(local) = self.local.as_mut() {
                    report.corrected = reconcile_local(local, entry, &self.world);
                }
                continue;
            }

            match self.remotes.get_mut(&entry.name) {
                Some(remote) => remote.apply_state(entry),
                None => {
                    let mut remote =
                        Player::new(entry.name.clone(), entry.color.clone(), SPAWN_POINT.0, SPAWN_POINT.1);
                    remote.apply_state(entry);
                    self.remotes.insert(entry.name.clone(), remote);
                    report.added.push(entry.name.clone());
                }
            }
        }

        self.remotes.retain(|name, _| {
            let present = state.players.iter().any(|p| &p.name == name);
            if !present {
                report.removed.push(name.clone());
            }
            present
        });

        self.bullets.clone_from(&state.bullets);

        if report.corrected {
            debug!("Local player corrected to server position");
        }
        report
    }

    /// Advisory report of the predicted local state.
    pub fn position_report(&self) -> Option<PositionPayload> {
        let player = self.local.as_ref()?;
        Some(PositionPayload {
            x: player.x,
            y: player.y,
            vel_x: player.vel_x,
            vel_y: player.vel_y,
            facing: player.facing,
            on_ground: player.on_ground,
            health: Some(player.health),
        })
    }

    /// Builds a fire request from the facing edge at mid-height if the local
    /// cooldown allows. The server checks the cooldown again.
    pub fn fire_request(&mut self) -> Option<FirePayload> {
        let now = self.clock;
        let player = self.local.as_mut()?;
        if !player.shoot(now) {
            return None;
        }
        let x = match player.facing {
            Facing::Right => player.x + player.width,
            Facing::Left => player.x - BULLET_WIDTH,
        };
        Some(FirePayload {
            x,
            y: player.y + player.height / 2.0,
            direction: player.facing,
        })
    }

    /// Everything a renderer needs for one frame.
    pub fn view(&self) -> RenderView<'_> {
        RenderView {
            world: &self.world,
            local: self.local.as_ref(),
            remotes: &self.remotes,
            bullets: &self.bullets,
        }
    }

    /// The predicted local player, once joined.
    pub fn local(&self) -> Option<&Player> {
        self.local.as_ref()
    }

    #[cfg(test)]
    pub fn local_mut(&mut self) -> Option<&mut Player> {
        self.local.as_mut()
    }

    /// Mirrors of the other players from the latest snapshot, by name.
    pub fn remotes(&self) -> &BTreeMap<String, Player> {
        &self.remotes
    }

    pub fn bullets(&self) -> &[BulletState] {
        &self.bullets
    }

    /// Seconds of predicted time since joining. Drives the fire cooldown.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Drops everything tied to the current session.
    pub fn reset(&mut self) {
        self.local = None;
        self.remotes.clear();
        self.bullets.clear();
        self.clock = 0.0;
    }
}

impl Default for ClientGameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the server's entry for the local player. Returns true on a snap.
fn reconcile_local(local: &mut Player, entry: &PlayerState, world: &World) -> bool {
    // Health only goes up when the server restores it on a respawn
    let respawned = entry.health > local.health;
    local.health = entry.health.min(local.max_health);
    local.kill_count = entry.kill_count;

    let drift = manhattan(local.position(), (entry.x, entry.y));
    // A prediction below the world never comes back by itself
    if !respawned && drift <= TELEPORT_THRESHOLD && local.y <= world.height {
        return false;
    }

    local.x = entry.x;
    local.y = entry.y;
    local.vel_x = entry.vel_x;
    local.vel_y = entry.vel_y;
    local.facing = entry.facing;
    local.on_ground = entry.on_ground;
    local.coyote_time = 0.0;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn entry(name: &str, x: f32, y: f32) -> PlayerState {
        PlayerState {
            name: name.to_string(),
            color: "#4ECDC4".to_string(),
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            facing: Facing::Left,
            on_ground: true,
            health: 2,
            kill_count: 4,
        }
    }

    fn joined(name: &str) -> ClientGameState {
        let mut game = ClientGameState::new();
        game.on_joined(name, "#FF6B6B");
        game
    }

    #[test]
    fn test_small_drift_is_kept() {
        let mut game = joined("alice");
        let (x, y) = game.local().unwrap().position();
        let state = StatePayload {
            players: vec![entry("alice", x + 10.0, y)],
            bullets: vec![],
        };

        let report = game.reconcile(&state);
        assert!(!report.corrected);
        let local = game.local().unwrap();
        assert_eq!(local.position(), (x, y));
        assert_eq!(local.health, 2);
        assert_eq!(local.kill_count, 4);
    }

    #[test]
    fn test_large_drift_is_corrected() {
        let mut game = joined("alice");
        let (x, y) = game.local().unwrap().position();
        game.local_mut().unwrap().coyote_time = 0.3;
        let state = StatePayload {
            players: vec![entry("alice", x + 600.0, y)],
            bullets: vec![],
        };

        let report = game.reconcile(&state);
        assert!(report.corrected);
        let local = game.local().unwrap();
        assert_approx_eq!(local.x, x + 600.0);
        assert_eq!(local.facing, Facing::Left);
        assert!(local.on_ground);
        assert_eq!(local.coyote_time, 0.0);
    }

    #[test]
    fn test_fallen_prediction_is_corrected() {
        let mut game = joined("alice");
        {
            let local = game.local_mut().unwrap();
            local.x = SPAWN_POINT.0;
            local.y = 1850.0;
        }
        let state = StatePayload {
            players: vec![entry("alice", SPAWN_POINT.0, SPAWN_POINT.1)],
            bullets: vec![],
        };

        assert!(game.reconcile(&state).corrected);
        assert_eq!(game.local().unwrap().y, SPAWN_POINT.1);
    }

    #[test]
    fn test_respawn_near_prediction_is_corrected() {
        let mut game = joined("alice");
        {
            let local = game.local_mut().unwrap();
            local.x = 300.0;
            local.y = 1702.0;
            local.health = 1;
        }
        // Killed and respawned a couple hundred pixels away
        let mut respawn = entry("alice", SPAWN_POINT.0, SPAWN_POINT.1);
        respawn.health = 3;
        let state = StatePayload {
            players: vec![respawn],
            bullets: vec![],
        };

        assert!(game.reconcile(&state).corrected);
        let local = game.local().unwrap();
        assert_eq!(local.position(), SPAWN_POINT);
        assert_eq!(local.health, 3);

        // The next snapshot carries no news
        let state = StatePayload {
            players: vec![{
                let mut e = entry("alice", SPAWN_POINT.0 + 5.0, SPAWN_POINT.1);
                e.health = 3;
                e
            }],
            bullets: vec![],
        };
        assert!(!game.reconcile(&state).corrected);
    }

    #[test]
    fn test_remote_mirrors_follow_snapshot() {
        let mut game = joined("alice");
        let (x, y) = game.local().unwrap().position();

        let first = StatePayload {
            players: vec![entry("alice", x, y), entry("bob", 500.0, 300.0)],
            bullets: vec![],
        };
        let report = game.reconcile(&first);
        assert_eq!(report.added, vec!["bob".to_string()]);
        let bob = &game.remotes()["bob"];
        assert_eq!(bob.position(), (500.0, 300.0));
        assert_eq!(bob.health, 2);
        assert_eq!(bob.color, "#4ECDC4");

        let second = StatePayload {
            players: vec![entry("alice", x, y), entry("bob", 900.0, 100.0)],
            bullets: vec![],
        };
        game.reconcile(&second);
        assert_eq!(game.remotes()["bob"].position(), (900.0, 100.0));

        let third = StatePayload {
            players: vec![entry("alice", x, y)],
            bullets: vec![],
        };
        let report = game.reconcile(&third);
        assert_eq!(report.removed, vec!["bob".to_string()]);
        assert!(game.remotes().is_empty());
    }

    #[test]
    fn test_bullets_are_replaced() {
        let mut game = joined("alice");
        let bullet = |id: &str| BulletState {
            id: id.to_string(),
            owner_name: "bob".to_string(),
            x: 10.0,
            y: 20.0,
            direction: Facing::Right,
        };
        game.reconcile(&StatePayload {
            players: vec![],
            bullets: vec![bullet("bob_1"), bullet("bob_2")],
        });
        assert_eq!(game.bullets().len(), 2);

        game.reconcile(&StatePayload {
            players: vec![],
            bullets: vec![bullet("bob_3")],
        });
        assert_eq!(game.bullets().len(), 1);
        assert_eq!(game.bullets()[0].id, "bob_3");
    }

    #[test]
    fn test_predict_moves_local_only() {
        let mut game = joined("alice");
        game.reconcile(&StatePayload {
            players: vec![entry("bob", 500.0, 300.0)],
            bullets: vec![],
        });
        let before = game.local().unwrap().position();

        let input = InputIntent {
            right: true,
            ..Default::default()
        };
        for _ in 0..10 {
            game.predict(&input, 1.0 / 60.0);
        }

        assert!(game.local().unwrap().x > before.0);
        assert_eq!(game.remotes()["bob"].position(), (500.0, 300.0));
        assert_approx_eq!(game.clock(), 10.0 / 60.0, 1e-6);
    }

    #[test]
    fn test_fire_request_origin_and_cooldown() {
        let mut game = joined("alice");
        let (x, y) = game.local().unwrap().position();

        let fire = game.fire_request().unwrap();
        assert_eq!(fire.direction, Facing::Right);
        assert_approx_eq!(fire.x, x + shared::PLAYER_WIDTH);
        assert_approx_eq!(fire.y, y + shared::PLAYER_HEIGHT / 2.0);

        assert!(game.fire_request().is_none());

        for _ in 0..20 {
            game.predict(&InputIntent::default(), 1.0 / 60.0);
        }
        game.local_mut().unwrap().facing = Facing::Left;
        let x = game.local().unwrap().x;
        let fire = game.fire_request().unwrap();
        assert_eq!(fire.direction, Facing::Left);
        assert_approx_eq!(fire.x, x - BULLET_WIDTH);
    }

    #[test]
    fn test_outbound_requires_local_player() {
        let mut game = ClientGameState::new();
        assert!(game.position_report().is_none());
        assert!(game.fire_request().is_none());

        game.on_joined("alice", "#FF6B6B");
        let report = game.position_report().unwrap();
        assert_eq!((report.x, report.y), SPAWN_POINT);
        assert_eq!(report.health, Some(shared::MAX_HEALTH));
    }

    #[test]
    fn test_reset_clears_session() {
        let mut game = joined("alice");
        game.reconcile(&StatePayload {
            players: vec![entry("bob", 1.0, 2.0)],
            bullets: vec![],
        });
        game.reset();
        let view = game.view();
        assert!(view.local.is_none());
        assert!(view.remotes.is_empty());
        assert!(view.bullets.is_empty());
    }
}
