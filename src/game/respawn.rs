//! Respawn coordination - restarting controllers left without a character

use tracing::{debug, info};

use super::Role;
use crate::ws::protocol::{CharacterId, ControllerId};

/// Controller enumeration service the coordinator scans over. The session
/// implements this; tests substitute a fixture.
pub trait ControllerWorld {
    /// Ids of all active controllers, in unspecified order
    fn controller_ids(&self) -> Vec<ControllerId>;
    /// Whether the controller currently possesses a character
    fn has_possessed_character(&self, controller_id: ControllerId) -> bool;
    /// Issue a restart: spawn and possess a fresh character
    fn restart(&mut self, controller_id: ControllerId);
}

/// Stateless scan-and-act respawn procedure
pub struct RespawnCoordinator;

impl RespawnCoordinator {
    /// Entry point for the character-destroyed lifecycle event. Runs the
    /// respawn scan; returns the number of restarts issued.
    pub fn on_character_destroyed<W: ControllerWorld>(
        role: Role,
        world: &mut W,
        character_id: CharacterId,
    ) -> usize {
        debug!(character_id = %character_id, "character destroyed, scanning for dead players");
        Self::restart_dead_players(role, world)
    }

    /// Restart every controller that possesses no character. Authority-only:
    /// on a remote instance the scan is a no-op. Controllers that already
    /// possess a character are skipped, so the call is idempotent for them.
    pub fn restart_dead_players<W: ControllerWorld>(role: Role, world: &mut W) -> usize {
        if !role.is_authority() {
            return 0;
        }

        let mut restarted = 0;
        for controller_id in world.controller_ids() {
            if !world.has_possessed_character(controller_id) {
                world.restart(controller_id);
                restarted += 1;
            }
        }

        if restarted > 0 {
            info!(restarted, "restarted dead players");
        }
        restarted
    }
}
