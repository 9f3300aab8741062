//! Character entity - one life of a player-controlled combatant

use tracing::debug;

use super::combat::{CombatSetupError, CombatState};
use super::fire::{FireControl, FireSetupError};
use super::Role;
use crate::ws::protocol::{Aim, CharacterId, CharacterInfo, ControllerId, Vec3};

/// Errors raised when assembling a character
#[derive(Debug, thiserror::Error)]
pub enum CharacterSetupError {
    #[error(transparent)]
    Combat(#[from] CombatSetupError),
    #[error(transparent)]
    Fire(#[from] FireSetupError),
}

/// A spawned character. Owns its combat and fire state; the controller
/// association is id-based and resolved through the session maps.
#[derive(Debug)]
pub struct Character {
    pub id: CharacterId,
    pub controller_id: ControllerId,
    pub position: Vec3,
    pub aim: Aim,
    pub combat: CombatState,
    pub fire: FireControl,
    ragdoll: bool,
    lifespan_remaining: Option<f32>,
    last_input_seq: u32,
}

impl Character {
    pub fn new(
        id: CharacterId,
        controller_id: ControllerId,
        role: Role,
        max_health: f32,
        fire_rate: f32,
        position: Vec3,
    ) -> Result<Self, CharacterSetupError> {
        Ok(Self {
            id,
            controller_id,
            position,
            aim: Aim::default(),
            combat: CombatState::new(role, max_health)?,
            fire: FireControl::new(fire_rate)?,
            ragdoll: false,
            lifespan_remaining: None,
            last_input_seq: 0,
        })
    }

    pub fn is_ragdoll(&self) -> bool {
        self.ragdoll
    }

    /// Terminal death transition: the character stops reacting to input and
    /// lingers as a ragdoll for `lifespan` seconds before destruction.
    /// Re-entrant calls are ignored, the transition fires once per life.
    pub fn enter_ragdoll(&mut self, lifespan: f32) {
        if self.ragdoll {
            return;
        }
        self.ragdoll = true;
        self.lifespan_remaining = Some(lifespan.max(0.0));
        debug!(character_id = %self.id, lifespan, "character entered ragdoll");
    }

    /// Count down the post-death lifespan. Returns true once the lifespan
    /// has elapsed and the character should be destroyed.
    pub fn tick_lifespan(&mut self, dt: f32) -> bool {
        match self.lifespan_remaining.as_mut() {
            Some(remaining) => {
                *remaining -= dt;
                *remaining <= 0.0
            }
            None => false,
        }
    }

    /// Apply per-tick input. Stale sequence numbers are discarded; a
    /// ragdolled character no longer reacts to input at all.
    pub fn apply_input(&mut self, seq: u32, aim_yaw: f32, aim_pitch: f32) -> bool {
        if self.ragdoll || seq <= self.last_input_seq {
            return false;
        }
        self.last_input_seq = seq;
        self.aim = Aim::new(aim_yaw, aim_pitch);
        true
    }

    /// Wire-level view of this character
    pub fn info(&self) -> CharacterInfo {
        CharacterInfo {
            character_id: self.id,
            controller_id: self.controller_id,
            position: self.position,
            health: self.combat.current_health(),
            max_health: self.combat.max_health(),
            ragdoll: self.ragdoll,
        }
    }
}
