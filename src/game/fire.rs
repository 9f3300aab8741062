//! Weapon trigger state machine and projectile spawn requests

use std::time::Duration;

use crate::ws::protocol::{Aim, CharacterId, ControllerId, ProjectileId, Vec3};

/// Distance from the character origin to the muzzle along the aim direction
pub const MUZZLE_FORWARD_OFFSET: f32 = 100.0;
/// Vertical offset from the character origin to the muzzle
pub const MUZZLE_VERTICAL_OFFSET: f32 = 50.0;

/// Errors raised at fire control construction
#[derive(Debug, thiserror::Error)]
pub enum FireSetupError {
    #[error("fire rate must be positive and finite, got {0}")]
    InvalidFireRate(f32),
}

/// Cooldown to arm against the clock service after a successful trigger
/// pull. The generation token identifies the pull; an expiry carrying a
/// stale generation is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireCooldown {
    pub generation: u64,
    pub duration: Duration,
}

/// Input contract of the external projectile spawn service
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileSpawn {
    pub location: Vec3,
    pub rotation: Aim,
    pub instigator: ControllerId,
    pub owner: CharacterId,
}

impl ProjectileSpawn {
    /// Build a spawn request from the firing character's transform. The
    /// muzzle sits ahead of the character along its aim, raised by the
    /// vertical offset; the projectile flies along the aim direction.
    pub fn from_transform(
        position: Vec3,
        aim: Aim,
        instigator: ControllerId,
        owner: CharacterId,
    ) -> Self {
        let location =
            position + aim.direction() * MUZZLE_FORWARD_OFFSET + Vec3::UP * MUZZLE_VERTICAL_OFFSET;
        Self {
            location,
            rotation: aim,
            instigator,
            owner,
        }
    }
}

/// External spawn service consumed by the session. Returns `None` when no
/// projectile archetype is configured; callers treat that as a benign no-op.
pub trait ProjectileSpawner {
    fn spawn_projectile(&mut self, request: ProjectileSpawn) -> Option<ProjectileId>;
}

/// Spawn service with no projectile archetype configured. Every request
/// degrades to a no-op instead of failing.
pub struct UnconfiguredSpawner;

impl ProjectileSpawner for UnconfiguredSpawner {
    fn spawn_projectile(&mut self, _request: ProjectileSpawn) -> Option<ProjectileId> {
        None
    }
}

/// Rate-limited weapon trigger.
///
/// A trigger pull while the previous cooldown is still running is a no-op;
/// that is the whole rate limiter. State is entity-local and never
/// replicated - only the spawned projectile is visible to peers.
#[derive(Debug)]
pub struct FireControl {
    is_firing: bool,
    fire_rate: f32,
    generation: u64,
}

impl FireControl {
    pub fn new(fire_rate: f32) -> Result<Self, FireSetupError> {
        if !(fire_rate > 0.0) || !fire_rate.is_finite() {
            return Err(FireSetupError::InvalidFireRate(fire_rate));
        }
        Ok(Self {
            is_firing: false,
            fire_rate,
            generation: 0,
        })
    }

    pub fn is_firing(&self) -> bool {
        self.is_firing
    }

    pub fn fire_rate(&self) -> f32 {
        self.fire_rate
    }

    /// Pull the trigger. Returns the cooldown to arm when the pull is
    /// accepted; `None` while a previous cooldown is still running.
    pub fn start_fire(&mut self) -> Option<FireCooldown> {
        if self.is_firing {
            return None;
        }
        self.is_firing = true;
        self.generation += 1;
        Some(FireCooldown {
            generation: self.generation,
            duration: Duration::from_secs_f32(self.fire_rate),
        })
    }

    /// Cooldown expiry callback. A stale generation (the control was reset
    /// after the timer was armed) is ignored; returns whether the expiry
    /// applied.
    pub fn stop_fire(&mut self, generation: u64) -> bool {
        if generation != self.generation || !self.is_firing {
            return false;
        }
        self.is_firing = false;
        true
    }
}
