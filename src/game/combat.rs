//! Combat state - health tracking, damage application, death transition

use tracing::debug;

use super::replication::ReplicatedField;
use super::Role;

/// Result of a health mutation, consumed by the owning entity to drive the
/// death transition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthChange {
    /// Post-clamp health value
    pub health: f32,
    /// True exactly once per life, on the Alive -> Dead transition
    pub newly_dead: bool,
}

/// Errors raised at combat state construction
#[derive(Debug, thiserror::Error)]
pub enum CombatSetupError {
    #[error("max health must be positive and finite, got {0}")]
    InvalidMaxHealth(f32),
}

/// Health and death state for one character life.
///
/// Health is a replicated field: only the authoritative instance accepts
/// writes, observers mirror the committed value via [`ingest_health`].
/// Death latches on the first transition to zero health and never unlatches;
/// a respawn builds a fresh `CombatState`.
///
/// [`ingest_health`]: CombatState::ingest_health
#[derive(Debug)]
pub struct CombatState {
    max_health: f32,
    health: ReplicatedField<f32>,
    dead: bool,
}

impl CombatState {
    /// Create a combat state at full health.
    pub fn new(role: Role, max_health: f32) -> Result<Self, CombatSetupError> {
        if !(max_health > 0.0) || !max_health.is_finite() {
            return Err(CombatSetupError::InvalidMaxHealth(max_health));
        }
        Ok(Self {
            max_health,
            health: ReplicatedField::new(role, max_health),
            dead: false,
        })
    }

    pub fn role(&self) -> Role {
        self.health.role()
    }

    pub fn max_health(&self) -> f32 {
        self.max_health
    }

    pub fn current_health(&self) -> f32 {
        *self.health.get()
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Register a listener on the replicated health field. The listener
    /// immediately receives the current value, then every later change in
    /// commit order.
    pub fn on_health_changed<F>(&mut self, listener: F)
    where
        F: FnMut(&f32) + Send + 'static,
    {
        self.health.subscribe(listener);
    }

    /// Apply damage on the authoritative instance. The amount is
    /// deliberately not clamped: a negative amount heals, symmetric with
    /// damage. Returns the post-clamp health; on a non-authoritative
    /// instance the call is a no-op and the unchanged health is returned.
    pub fn apply_damage(&mut self, amount: f32) -> f32 {
        let target = self.current_health() - amount;
        self.set_health(target);
        self.current_health()
    }

    /// Authoritative health write. Clamps into `[0, max_health]`, commits to
    /// the replicated field, and reports the transition. Returns `None` when
    /// invoked on a non-authoritative instance (silent write rejection).
    pub fn set_health(&mut self, value: f32) -> Option<HealthChange> {
        if !self.role().is_authority() {
            debug!("set_health rejected on non-authoritative combat state");
            return None;
        }
        let clamped = value.clamp(0.0, self.max_health);
        self.health.commit(clamped);
        Some(self.register_transition(clamped))
    }

    /// Observer-side entry point for a replicated health value. Runs the
    /// same death check the authority ran, so every peer transitions
    /// locally.
    pub fn ingest_health(&mut self, value: f32) -> HealthChange {
        let clamped = value.clamp(0.0, self.max_health);
        self.health.ingest(clamped);
        self.register_transition(clamped)
    }

    fn register_transition(&mut self, health: f32) -> HealthChange {
        let newly_dead = !self.dead && health <= 0.0;
        if newly_dead {
            self.dead = true;
        }
        HealthChange { health, newly_dead }
    }
}
