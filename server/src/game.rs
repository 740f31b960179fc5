//! Canonical session state.
//!
//! `GameState` is the single source of truth for every player and bullet.
//! It is owned by the server loop and mutated only from there, one event at
//! a time, so it needs no locking of its own.

use crate::palette::ColorPalette;
use log::{debug, info};
use shared::protocol::{FirePayload, JoinedPayload, PositionPayload, StatePayload};
use shared::{
    intersects, manhattan, Bullet, Player, World, BULLET_DAMAGE, MAX_FIRE_ORIGIN_DISTANCE,
    MAX_NAME_LEN, RESYNC_RADIUS, SPAWN_POINT,
};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("Name must not be empty")]
    EmptyName,
    #[error("Name must be at most {max} characters")]
    NameTooLong { max: usize },
    #[error("Name '{0}' is already taken")]
    NameTaken(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("no player named '{0}'")]
    UnknownPlayer(String),
    #[error("position report contains non-finite values")]
    NonFinite,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FireError {
    #[error("no player named '{0}'")]
    UnknownPlayer(String),
    #[error("fire request contains non-finite values")]
    NonFinite,
    #[error("fire origin is too far from the shooter")]
    OriginTooFar,
    #[error("weapon is cooling down")]
    CooldownActive,
}

/// What happened to an accepted position report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Applied,
    /// Dropped as prediction from before a server-side respawn.
    Stale,
    /// The player fell out of the world and was respawned.
    FellOut { health: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub bullet_id: String,
    pub shooter: String,
    pub victim: String,
    pub remaining_health: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kill {
    pub killer: String,
    pub victim: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub hits: Vec<Hit>,
    pub kills: Vec<Kill>,
    pub culled: usize,
}

#[derive(Debug)]
pub struct GameState {
    pub tick: u32,
    world: World,
    players: BTreeMap<String, Player>,
    bullets: Vec<Bullet>,
    palette: ColorPalette,
    /// Players respawned by the server whose client has not caught up yet.
    awaiting_resync: HashSet<String>,
    bullet_counter: u64,
    clock: f64,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_world(World::default())
    }

    /// Empty session on a custom level.
    pub fn with_world(world: World) -> Self {
        Self {
            tick: 0,
            world,
            players: BTreeMap::new(),
            bullets: Vec::new(),
            palette: ColorPalette::new(),
            awaiting_resync: HashSet::new(),
            bullet_counter: 0,
            clock: 0.0,
        }
    }

    /// Canonical state of one player.
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    /// Live bullets in firing order.
    pub fn bullets(&self) -> &[Bullet] {
        &self.bullets
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    #[cfg(test)]
    pub fn is_awaiting_resync(&self, name: &str) -> bool {
        self.awaiting_resync.contains(name)
    }

    /// Validates a requested name and creates the canonical player at the
    /// spawn point. Names are unique per session.
    pub fn join(&mut self, requested: &str) -> Result<JoinedPayload, JoinError> {
        let name = requested.trim();
        if name.is_empty() {
            return Err(JoinError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(JoinError::NameTooLong { max: MAX_NAME_LEN });
        }
        if self.players.contains_key(name) {
            return Err(JoinError::NameTaken(name.to_string()));
        }

        let color = self.palette.assign(name);
        let player = Player::new(name, color.clone(), SPAWN_POINT.0, SPAWN_POINT.1);
        info!(
            "Player {} joined with colour {} ({} in game)",
            name,
            color,
            self.players.len() + 1
        );
        self.players.insert(name.to_string(), player);

        Ok(JoinedPayload {
            name: name.to_string(),
            color,
        })
    }

    /// Removes a player and everything it owns. Returns false if it was
    /// already gone.
    pub fn leave(&mut self, name: &str) -> bool {
        if self.players.remove(name).is_none() {
            return false;
        }
        self.palette.release(name);
        self.awaiting_resync.remove(name);
        self.bullets.retain(|b| b.owner != name);
        info!("Player {} left ({} in game)", name, self.players.len());
        true
    }

    /// Takes a client's advisory self-report as that player's latest state.
    ///
    /// Health in the report is ignored. Falling below the world costs one
    /// health and respawns the player without crediting anyone.
    pub fn report_position(
        &mut self,
        name: &str,
        report: &PositionPayload,
    ) -> Result<ReportOutcome, ReportError> {
        if !report.is_finite() {
            return Err(ReportError::NonFinite);
        }
        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| ReportError::UnknownPlayer(name.to_string()))?;

        if self.awaiting_resync.contains(name) {
            let drift = manhattan((report.x, report.y), player.position());
            // Until the client adopts the respawn its reports describe the old life
            if drift > RESYNC_RADIUS || report.y > self.world.height {
                return Ok(ReportOutcome::Stale);
            }
            self.awaiting_resync.remove(name);
        }

        player.x = report.x;
        player.y = report.y;
        player.vel_x = report.vel_x;
        player.vel_y = report.vel_y;
        player.facing = report.facing;
        player.on_ground = report.on_ground;

        if player.y > self.world.height {
            let remaining = player.take_damage(1);
            player.respawn();
            if remaining == 0 {
                player.restore_health();
            }
            info!("{} fell out of the world (health {})", name, player.health);
            self.awaiting_resync.insert(name.to_string());
            return Ok(ReportOutcome::FellOut {
                health: player.health,
            });
        }

        Ok(ReportOutcome::Applied)
    }

    /// Mints a bullet for `name` if its cooldown allows. Returns the bullet id.
    pub fn fire(&mut self, name: &str, request: &FirePayload) -> Result<String, FireError> {
        if !request.x.is_finite() || !request.y.is_finite() {
            return Err(FireError::NonFinite);
        }
        let player = self
            .players
            .get_mut(name)
            .ok_or_else(|| FireError::UnknownPlayer(name.to_string()))?;

        if manhattan((request.x, request.y), player.center()) > MAX_FIRE_ORIGIN_DISTANCE {
            return Err(FireError::OriginTooFar);
        }
        if !player.shoot(self.clock) {
            return Err(FireError::CooldownActive);
        }

        self.bullet_counter += 1;
        let id = format!("{}_{}", name, self.bullet_counter);
        self.bullets.push(Bullet::new(
            id.clone(),
            name,
            request.x,
            request.y,
            request.direction,
        ));
        debug!("{} fired {}", name, id);
        Ok(id)
    }

    /// Advances bullets, removes spent ones and applies hits.
    pub fn tick(&mut self, dt: f32) -> TickReport {
        self.tick = self.tick.wrapping_add(1);
        self.clock += f64::from(dt);

        let mut report = TickReport::default();
        let mut bullets = std::mem::take(&mut self.bullets);

        for bullet in &mut bullets {
            bullet.advance(dt);
        }
        let before = bullets.len();
        bullets.retain(|b| !b.should_cull(&self.world));
        report.culled = before - bullets.len();

        bullets.retain(|bullet| match self.struck_player(bullet) {
            Some(victim) => {
                self.apply_hit(bullet, &victim, &mut report);
                false
            }
            None => true,
        });

        self.bullets = bullets;
        report
    }

    fn struck_player(&self, bullet: &Bullet) -> Option<String> {
        let bounds = bullet.bounds();
        self.players
            .values()
            .find(|p| p.name != bullet.owner && intersects(&bounds, &p.bounds()))
            .map(|p| p.name.clone())
    }

    fn apply_hit(&mut self, bullet: &Bullet, victim_name: &str, report: &mut TickReport) {
        let Some(victim) = self.players.get_mut(victim_name) else {
            return;
        };
        let remaining = victim.take_damage(BULLET_DAMAGE);
        report.hits.push(Hit {
            bullet_id: bullet.id.clone(),
            shooter: bullet.owner.clone(),
            victim: victim_name.to_string(),
            remaining_health: remaining,
        });
        if remaining > 0 {
            return;
        }

        victim.respawn();
        victim.restore_health();
        self.awaiting_resync.insert(victim_name.to_string());

        if let Some(killer) = self.players.get_mut(&bullet.owner) {
            killer.kill_count += 1;
            info!(
                "{} killed {} (kills: {})",
                killer.name, victim_name, killer.kill_count
            );
            report.kills.push(Kill {
                killer: bullet.owner.clone(),
                victim: victim_name.to_string(),
            });
        }
    }

    /// Builds the canonical snapshot. Players come out in name order.
    pub fn snapshot(&self) -> StatePayload {
        StatePayload {
            players: self.players.values().map(Player::to_state).collect(),
            bullets: self.bullets.iter().map(Bullet::to_state).collect(),
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
