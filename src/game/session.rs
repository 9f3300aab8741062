//! Authoritative session state and tick loop
//!
//! One session per server process. All mutation flows through the command
//! channel into the sequential tick loop; WebSocket tasks and timers never
//! touch session state directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::util::time::{tick_delta, TICK_DURATION_MICROS};
use crate::ws::protocol::{
    CharacterId, ControllerId, PlayerId, ProjectileId, RosterEntry, ServerMsg, Vec3,
};

use super::character::Character;
use super::fire::{FireCooldown, ProjectileSpawn, ProjectileSpawner};
use super::ledger::{PlayerRecord, Roster};
use super::respawn::{ControllerWorld, RespawnCoordinator};
use super::{Role, SessionCommand};

/// Spawn ring for fresh characters
const SPAWN_RING_MIN: f32 = 200.0;
const SPAWN_RING_MAX: f32 = 1200.0;

/// Tunables for one session, derived from server configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Starting and maximum health per character life
    pub max_health: f32,
    /// Seconds between accepted trigger pulls
    pub fire_rate: f32,
    /// Seconds a dead character lingers as a ragdoll before destruction
    pub death_lifespan: f32,
    /// Seed for deterministic spawn point selection
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            fire_rate: 0.25,
            death_lifespan: 3.0,
            seed: 0,
        }
    }
}

/// Occupancy counters shared with the HTTP surface
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub tick: u64,
    pub controllers: usize,
    pub alive_characters: usize,
    pub total_deaths: f32,
}

/// A connected controller. Possession is id-based; the character itself
/// lives in the session's character map.
#[derive(Debug, Clone)]
pub struct Controller {
    pub id: ControllerId,
    pub player_id: PlayerId,
    pub character: Option<CharacterId>,
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub command_tx: mpsc::Sender<SessionCommand>,
    pub events_tx: broadcast::Sender<ServerMsg>,
    pub stats: Arc<RwLock<SessionStats>>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }
}

/// Default spawn service: creating a projectile makes it visible to every
/// peer through the session event stream.
pub struct BroadcastSpawner {
    events_tx: broadcast::Sender<ServerMsg>,
}

impl BroadcastSpawner {
    pub fn new(events_tx: broadcast::Sender<ServerMsg>) -> Self {
        Self { events_tx }
    }
}

impl ProjectileSpawner for BroadcastSpawner {
    fn spawn_projectile(&mut self, request: ProjectileSpawn) -> Option<ProjectileId> {
        let projectile_id = Uuid::new_v4();
        let _ = self.events_tx.send(ServerMsg::ProjectileSpawned {
            projectile_id,
            location: request.location,
            rotation: request.rotation,
            instigator: request.instigator,
            owner: request.owner,
        });
        Some(projectile_id)
    }
}

/// The authoritative session
pub struct Session {
    id: Uuid,
    role: Role,
    config: SessionConfig,
    tick: u64,
    controllers: HashMap<ControllerId, Controller>,
    characters: HashMap<CharacterId, Character>,
    roster: Arc<Roster>,
    spawner: Box<dyn ProjectileSpawner + Send>,
    rng: ChaCha8Rng,
    command_rx: mpsc::Receiver<SessionCommand>,
    command_tx: mpsc::Sender<SessionCommand>,
    events_tx: broadcast::Sender<ServerMsg>,
    stats: Arc<RwLock<SessionStats>>,
    /// Cooldowns accepted this tick, armed against the clock after the tick
    pending_cooldowns: Vec<(CharacterId, FireCooldown)>,
}

impl Session {
    /// Create a session and its handle
    pub fn new(config: SessionConfig, roster: Arc<Roster>) -> (Self, SessionHandle) {
        let id = Uuid::new_v4();
        let (command_tx, command_rx) = mpsc::channel(256);
        let (events_tx, _) = broadcast::channel(256);
        let stats = Arc::new(RwLock::new(SessionStats::default()));

        let handle = SessionHandle {
            id,
            command_tx: command_tx.clone(),
            events_tx: events_tx.clone(),
            stats: stats.clone(),
        };

        let seed = config.seed;
        let session = Self {
            id,
            role: Role::Authority,
            config,
            tick: 0,
            controllers: HashMap::new(),
            characters: HashMap::new(),
            roster,
            spawner: Box::new(BroadcastSpawner::new(events_tx.clone())),
            rng: ChaCha8Rng::seed_from_u64(seed),
            command_rx,
            command_tx,
            events_tx,
            stats,
            pending_cooldowns: Vec::new(),
        };

        (session, handle)
    }

    /// Replace the projectile spawn service
    pub fn with_spawner(mut self, spawner: Box<dyn ProjectileSpawner + Send>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Run the authoritative tick loop
    pub async fn run(mut self) {
        info!(session_id = %self.id, "session started");

        let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain the command queue
            while let Ok(command) = self.command_rx.try_recv() {
                self.handle_command(command);
            }

            // Run simulation tick
            self.run_tick();

            // Arm fire cooldowns accepted this tick
            self.arm_cooldowns();

            self.publish_stats();
        }
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Join {
                controller_id,
                player_id,
                display_name,
            } => self.handle_join(controller_id, player_id, display_name),
            SessionCommand::Leave { controller_id } => self.handle_leave(controller_id),
            SessionCommand::Input {
                controller_id,
                seq,
                aim_yaw,
                aim_pitch,
                fire,
            } => self.handle_input(controller_id, seq, aim_yaw, aim_pitch, fire),
            SessionCommand::Damage {
                target,
                amount,
                instigator,
            } => self.handle_damage(target, amount, instigator),
            SessionCommand::CooldownElapsed {
                character_id,
                generation,
            } => self.handle_cooldown_elapsed(character_id, generation),
            SessionCommand::Ping { t } => {
                let _ = self.events_tx.send(ServerMsg::Pong { t });
            }
        }
    }

    /// Handle controller join: create the player record, the controller,
    /// and the first character
    fn handle_join(&mut self, controller_id: ControllerId, player_id: PlayerId, display_name: String) {
        if self.controllers.contains_key(&controller_id) {
            warn!(controller_id = %controller_id, "controller already in session");
            let _ = self.events_tx.send(ServerMsg::Error {
                code: "already_joined".to_string(),
                message: "Controller already joined this session".to_string(),
            });
            return;
        }

        self.roster
            .insert(PlayerRecord::new(player_id, display_name.clone()));
        self.controllers.insert(
            controller_id,
            Controller {
                id: controller_id,
                player_id,
                character: None,
            },
        );

        let _ = self.events_tx.send(ServerMsg::PlayerJoined {
            player: RosterEntry {
                player_id,
                controller_id,
                display_name: display_name.clone(),
                death_count: 0.0,
                score: 0,
            },
        });

        self.spawn_character_for(controller_id);

        let _ = self.events_tx.send(ServerMsg::SessionJoined {
            session_id: self.id,
            players: self.roster_entries(),
            characters: self.characters.values().map(Character::info).collect(),
        });

        info!(
            session_id = %self.id,
            controller_id = %controller_id,
            player = %display_name,
            controllers = self.controllers.len(),
            "player joined session"
        );
    }

    fn handle_leave(&mut self, controller_id: ControllerId) {
        let Some(controller) = self.controllers.remove(&controller_id) else {
            return;
        };

        if let Some(character_id) = controller.character {
            self.destroy_character(character_id);
        }
        self.roster.remove(controller.player_id);

        let _ = self.events_tx.send(ServerMsg::PlayerLeft {
            controller_id,
            player_id: controller.player_id,
        });

        info!(
            session_id = %self.id,
            controller_id = %controller_id,
            "player left session"
        );
    }

    fn handle_input(
        &mut self,
        controller_id: ControllerId,
        seq: u32,
        aim_yaw: f32,
        aim_pitch: f32,
        fire: bool,
    ) {
        let Some(character_id) = self
            .controllers
            .get(&controller_id)
            .and_then(|c| c.character)
        else {
            return;
        };
        let Some(character) = self.characters.get_mut(&character_id) else {
            return;
        };

        if character.apply_input(seq, aim_yaw, aim_pitch) && fire {
            self.handle_fire(character_id);
        }
    }

    /// Trigger pull for a character. The fire control decides whether the
    /// pull is accepted; an accepted pull requests one projectile spawn and
    /// arms the cooldown timer.
    fn handle_fire(&mut self, character_id: CharacterId) {
        let Some(character) = self.characters.get_mut(&character_id) else {
            return;
        };
        let Some(cooldown) = character.fire.start_fire() else {
            return;
        };

        let request = ProjectileSpawn::from_transform(
            character.position,
            character.aim,
            character.controller_id,
            character.id,
        );

        match self.spawner.spawn_projectile(request) {
            Some(projectile_id) => {
                debug!(
                    character_id = %character_id,
                    projectile_id = %projectile_id,
                    "projectile spawned"
                );
            }
            None => {
                debug!(character_id = %character_id, "no projectile archetype, spawn skipped");
            }
        }

        self.pending_cooldowns.push((character_id, cooldown));
    }

    /// Damage entry point for the hit-detection collaborator. Damage for a
    /// character destroyed mid-flight is dropped.
    fn handle_damage(
        &mut self,
        target: CharacterId,
        amount: f32,
        instigator: Option<ControllerId>,
    ) {
        let Some(character) = self.characters.get_mut(&target) else {
            debug!(character_id = %target, "damage for missing character");
            return;
        };

        let was_dead = character.combat.is_dead();
        let health = character.combat.apply_damage(amount);
        let newly_dead = !was_dead && character.combat.is_dead();

        debug!(character_id = %target, health, amount, "damage applied");

        if newly_dead {
            self.handle_death(target, instigator);
        }
    }

    /// Death transition side effects: ragdoll, owner feedback, ledger
    /// increment, kill credit
    fn handle_death(&mut self, character_id: CharacterId, instigator: Option<ControllerId>) {
        let Some(character) = self.characters.get_mut(&character_id) else {
            return;
        };
        character.enter_ragdoll(self.config.death_lifespan);
        let controller_id = character.controller_id;

        let _ = self.events_tx.send(ServerMsg::DeathNotice {
            controller_id,
            message: "You have been killed.".to_string(),
        });

        match self.controllers.get(&controller_id).map(|c| c.player_id) {
            Some(player_id) => match self.roster.add_death_count(player_id, 1.0) {
                Some(total) => {
                    info!(
                        character_id = %character_id,
                        player_id = %player_id,
                        death_count = total,
                        "death recorded"
                    );
                    let _ = self.events_tx.send(ServerMsg::DeathCountChanged {
                        player_id,
                        death_count: total,
                    });
                }
                None => {
                    warn!(controller_id = %controller_id, "controller has no player record, death not counted");
                }
            },
            None => {
                warn!(character_id = %character_id, "death with no resolvable controller");
            }
        }

        if let Some(instigator_id) = instigator.filter(|id| *id != controller_id) {
            if let Some(player_id) = self.controllers.get(&instigator_id).map(|c| c.player_id) {
                if let Some(score) = self.roster.add_score(player_id, 1) {
                    let _ = self
                        .events_tx
                        .send(ServerMsg::ScoreChanged { player_id, score });
                }
            }
        }
    }

    /// Cooldown expiry. The character may be gone or the control may have
    /// been reset since the timer was armed; both are benign no-ops.
    fn handle_cooldown_elapsed(&mut self, character_id: CharacterId, generation: u64) {
        match self.characters.get_mut(&character_id) {
            Some(character) => {
                if !character.fire.stop_fire(generation) {
                    debug!(character_id = %character_id, generation, "stale fire cooldown ignored");
                }
            }
            None => {
                debug!(character_id = %character_id, "fire cooldown for destroyed character");
            }
        }
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) {
        self.tick += 1;
        let dt = tick_delta();

        // Count down post-death lifespans and destroy elapsed characters
        let expired: Vec<CharacterId> = self
            .characters
            .values_mut()
            .filter_map(|c| c.tick_lifespan(dt).then_some(c.id))
            .collect();

        for character_id in expired {
            self.destroy_character(character_id);
        }
    }

    /// End a character's lifecycle: detach the controller, announce, and
    /// run the respawn scan
    fn destroy_character(&mut self, character_id: CharacterId) {
        let Some(character) = self.characters.remove(&character_id) else {
            return;
        };
        let controller_id = character.controller_id;

        if let Some(controller) = self.controllers.get_mut(&controller_id) {
            if controller.character == Some(character_id) {
                controller.character = None;
            }
        }

        let _ = self.events_tx.send(ServerMsg::CharacterDestroyed {
            character_id,
            controller_id,
        });

        let role = self.role;
        RespawnCoordinator::on_character_destroyed(role, self, character_id);
    }

    /// Spawn a fresh character and possess it
    fn spawn_character_for(&mut self, controller_id: ControllerId) {
        if !self.controllers.contains_key(&controller_id) {
            return;
        }

        let character_id = Uuid::new_v4();
        let position = self.spawn_point();
        let mut character = match Character::new(
            character_id,
            controller_id,
            self.role,
            self.config.max_health,
            self.config.fire_rate,
            position,
        ) {
            Ok(character) => character,
            Err(e) => {
                error!(error = %e, "character spawn rejected by configuration");
                return;
            }
        };

        let _ = self.events_tx.send(ServerMsg::CharacterSpawned {
            character: character.info(),
        });

        // Replication fan-out: every committed health value reaches the
        // event stream in commit order
        let events_tx = self.events_tx.clone();
        character.combat.on_health_changed(move |health| {
            let _ = events_tx.send(ServerMsg::HealthUpdate {
                character_id,
                health: *health,
            });
        });

        if let Some(controller) = self.controllers.get_mut(&controller_id) {
            controller.character = Some(character_id);
        }
        self.characters.insert(character_id, character);

        debug!(
            controller_id = %controller_id,
            character_id = %character_id,
            "character spawned"
        );
    }

    /// Generate a spawn position on the spawn ring
    fn spawn_point(&mut self) -> Vec3 {
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = self.rng.gen_range(SPAWN_RING_MIN..SPAWN_RING_MAX);
        Vec3::new(angle.cos() * distance, angle.sin() * distance, 0.0)
    }

    fn roster_entries(&self) -> Vec<RosterEntry> {
        let by_player: HashMap<PlayerId, ControllerId> = self
            .controllers
            .values()
            .map(|c| (c.player_id, c.id))
            .collect();
        self.roster.entries(|player_id| by_player.get(&player_id).copied())
    }

    /// Arm accepted cooldowns against the clock service. Expiry posts back
    /// into the command channel; the generation token makes late expiries
    /// harmless.
    fn arm_cooldowns(&mut self) {
        for (character_id, cooldown) in self.pending_cooldowns.drain(..) {
            let command_tx = self.command_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(cooldown.duration).await;
                let _ = command_tx
                    .send(SessionCommand::CooldownElapsed {
                        character_id,
                        generation: cooldown.generation,
                    })
                    .await;
            });
        }
    }

    fn publish_stats(&self) {
        let mut stats = self.stats.write();
        stats.tick = self.tick;
        stats.controllers = self.controllers.len();
        stats.alive_characters = self
            .characters
            .values()
            .filter(|c| !c.is_ragdoll())
            .count();
        stats.total_deaths = self.roster.total_deaths();
    }
}

impl ControllerWorld for Session {
    fn controller_ids(&self) -> Vec<ControllerId> {
        self.controllers.keys().copied().collect()
    }

    fn has_possessed_character(&self, controller_id: ControllerId) -> bool {
        self.controllers
            .get(&controller_id)
            .and_then(|c| c.character)
            .map(|character_id| self.characters.contains_key(&character_id))
            .unwrap_or(false)
    }

    fn restart(&mut self, controller_id: ControllerId) {
        self.spawn_character_for(controller_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::fire::UnconfiguredSpawner;
    use assert_approx_eq::assert_approx_eq;

    struct Peer {
        controller_id: ControllerId,
        player_id: PlayerId,
    }

    fn join(session: &mut Session, name: &str) -> Peer {
        let peer = Peer {
            controller_id: Uuid::new_v4(),
            player_id: Uuid::new_v4(),
        };
        session.handle_command(SessionCommand::Join {
            controller_id: peer.controller_id,
            player_id: peer.player_id,
            display_name: name.to_string(),
        });
        peer
    }

    fn character_of(session: &Session, peer: &Peer) -> CharacterId {
        session
            .controllers
            .get(&peer.controller_id)
            .and_then(|c| c.character)
            .expect("controller possesses a character")
    }

    fn damage(session: &mut Session, target: CharacterId, amount: f32) {
        session.handle_command(SessionCommand::Damage {
            target,
            amount,
            instigator: None,
        });
    }

    fn drain_events(rx: &mut broadcast::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut events = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            events.push(msg);
        }
        events
    }

    fn new_session() -> (Session, SessionHandle) {
        Session::new(SessionConfig::default(), Arc::new(Roster::new()))
    }

    #[test]
    fn join_spawns_and_possesses_a_character() {
        let (mut session, handle) = new_session();
        let mut rx = handle.subscribe();

        let peer = join(&mut session, "alice");
        let character_id = character_of(&session, &peer);

        let character = &session.characters[&character_id];
        assert_approx_eq!(character.combat.current_health(), 100.0);
        assert!(!character.is_ragdoll());
        assert_eq!(session.roster.death_count(peer.player_id), Some(0.0));

        let events = drain_events(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerMsg::CharacterSpawned { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerMsg::SessionJoined { .. })));
    }

    #[test]
    fn damage_death_and_ledger_lifecycle() {
        let (mut session, handle) = new_session();
        let peer = join(&mut session, "alice");
        let character_id = character_of(&session, &peer);
        let mut rx = handle.subscribe();

        damage(&mut session, character_id, 40.0);
        {
            let character = &session.characters[&character_id];
            assert_approx_eq!(character.combat.current_health(), 60.0);
            assert!(!character.combat.is_dead());
        }

        damage(&mut session, character_id, 70.0);
        {
            let character = &session.characters[&character_id];
            assert_approx_eq!(character.combat.current_health(), 0.0);
            assert!(character.combat.is_dead());
            assert!(character.is_ragdoll());
        }
        assert_approx_eq!(session.roster.death_count(peer.player_id).unwrap(), 1.0);

        // Further damage on the corpse changes nothing
        damage(&mut session, character_id, 10.0);
        assert_approx_eq!(
            session.characters[&character_id].combat.current_health(),
            0.0
        );
        assert_approx_eq!(session.roster.death_count(peer.player_id).unwrap(), 1.0);

        let events = drain_events(&mut rx);
        let death_notices = events
            .iter()
            .filter(|e| matches!(e, ServerMsg::DeathNotice { .. }))
            .count();
        assert_eq!(death_notices, 1);
        assert!(events.iter().any(|e| matches!(
            e,
            ServerMsg::DeathNotice { controller_id, .. } if *controller_id == peer.controller_id
        )));
    }

    #[test]
    fn health_updates_reach_the_event_stream_in_commit_order() {
        let (mut session, handle) = new_session();
        let peer = join(&mut session, "alice");
        let character_id = character_of(&session, &peer);
        let mut rx = handle.subscribe();

        damage(&mut session, character_id, 25.0);
        damage(&mut session, character_id, 25.0);
        damage(&mut session, character_id, -10.0);

        let healths: Vec<f32> = drain_events(&mut rx)
            .into_iter()
            .filter_map(|e| match e {
                ServerMsg::HealthUpdate { health, .. } => Some(health),
                _ => None,
            })
            .collect();
        assert_eq!(healths, vec![75.0, 50.0, 60.0]);
    }

    #[test]
    fn fire_is_rate_limited_until_cooldown_elapses() {
        let (mut session, handle) = new_session();
        let peer = join(&mut session, "alice");
        let character_id = character_of(&session, &peer);
        let mut rx = handle.subscribe();

        let fire_input = |seq| SessionCommand::Input {
            controller_id: peer.controller_id,
            seq,
            aim_yaw: 0.0,
            aim_pitch: 0.0,
            fire: true,
        };

        session.handle_command(fire_input(1));
        session.handle_command(fire_input(2));

        let spawned = drain_events(&mut rx)
            .iter()
            .filter(|e| matches!(e, ServerMsg::ProjectileSpawned { .. }))
            .count();
        assert_eq!(spawned, 1, "second pull within cooldown must not spawn");
        assert_eq!(session.pending_cooldowns.len(), 1);

        // Cooldown expires, next pull is accepted
        let (_, cooldown) = session.pending_cooldowns.pop().unwrap();
        session.handle_command(SessionCommand::CooldownElapsed {
            character_id,
            generation: cooldown.generation,
        });
        session.handle_command(fire_input(3));

        let spawned = drain_events(&mut rx)
            .iter()
            .filter(|e| matches!(e, ServerMsg::ProjectileSpawned { .. }))
            .count();
        assert_eq!(spawned, 1);
    }

    #[test]
    fn unconfigured_spawner_degrades_without_spawning() {
        let (session, handle) = new_session();
        let mut session = session.with_spawner(Box::new(UnconfiguredSpawner));
        let peer = join(&mut session, "alice");
        let mut rx = handle.subscribe();

        session.handle_command(SessionCommand::Input {
            controller_id: peer.controller_id,
            seq: 1,
            aim_yaw: 0.0,
            aim_pitch: 0.0,
            fire: true,
        });

        assert!(!drain_events(&mut rx)
            .iter()
            .any(|e| matches!(e, ServerMsg::ProjectileSpawned { .. })));
        // The trigger still cycles; only the spawn degraded
        assert_eq!(session.pending_cooldowns.len(), 1);
    }

    #[test]
    fn ragdoll_lifespan_elapses_into_respawn() {
        let (mut session, handle) = new_session();
        let alice = join(&mut session, "alice");
        let bob = join(&mut session, "bob");
        let alice_character = character_of(&session, &alice);
        let bob_character = character_of(&session, &bob);
        let mut rx = handle.subscribe();

        damage(&mut session, alice_character, 200.0);

        // Tick until the ragdoll lifespan elapses
        let ticks = (SessionConfig::default().death_lifespan / tick_delta()).ceil() as usize + 1;
        for _ in 0..ticks {
            session.run_tick();
        }

        assert!(!session.characters.contains_key(&alice_character));
        let respawned = character_of(&session, &alice);
        assert_ne!(respawned, alice_character);
        assert!(!session.characters[&respawned].is_ragdoll());
        assert_approx_eq!(
            session.characters[&respawned].combat.current_health(),
            100.0
        );

        // The surviving character is untouched by the respawn scan
        assert_eq!(character_of(&session, &bob), bob_character);

        let events = drain_events(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            ServerMsg::CharacterDestroyed { character_id, .. } if *character_id == alice_character
        )));
        let spawns = events
            .iter()
            .filter(|e| matches!(e, ServerMsg::CharacterSpawned { .. }))
            .count();
        assert_eq!(spawns, 1, "only the dead controller is restarted");
    }

    #[test]
    fn stale_cooldown_after_destruction_is_benign() {
        let (mut session, _handle) = new_session();
        let peer = join(&mut session, "alice");
        let character_id = character_of(&session, &peer);

        session.handle_command(SessionCommand::Input {
            controller_id: peer.controller_id,
            seq: 1,
            aim_yaw: 0.0,
            aim_pitch: 0.0,
            fire: true,
        });
        let (_, cooldown) = session.pending_cooldowns.pop().unwrap();

        // Character is gone by the time the timer fires
        session.handle_command(SessionCommand::Leave {
            controller_id: peer.controller_id,
        });
        session.handle_command(SessionCommand::CooldownElapsed {
            character_id,
            generation: cooldown.generation,
        });
    }

    #[test]
    fn kill_credit_goes_to_the_instigator() {
        let (mut session, handle) = new_session();
        let alice = join(&mut session, "alice");
        let bob = join(&mut session, "bob");
        let bob_character = character_of(&session, &bob);
        let mut rx = handle.subscribe();

        session.handle_command(SessionCommand::Damage {
            target: bob_character,
            amount: 150.0,
            instigator: Some(alice.controller_id),
        });

        assert_eq!(session.roster.score(alice.player_id), Some(1));
        assert_approx_eq!(session.roster.death_count(bob.player_id).unwrap(), 1.0);
        assert!(drain_events(&mut rx).iter().any(|e| matches!(
            e,
            ServerMsg::ScoreChanged { player_id, score: 1 } if *player_id == alice.player_id
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn armed_cooldown_reopens_fire_after_fire_rate() {
        let (mut session, handle) = new_session();
        let peer = join(&mut session, "alice");
        let mut rx = handle.subscribe();

        let fire_input = |seq| SessionCommand::Input {
            controller_id: peer.controller_id,
            seq,
            aim_yaw: 0.0,
            aim_pitch: 0.0,
            fire: true,
        };

        session.handle_command(fire_input(1));
        session.arm_cooldowns();

        // Still inside the cooldown window
        tokio::time::advance(Duration::from_millis(100)).await;
        session.handle_command(fire_input(2));

        // Cross the fire-rate boundary; the timer posts the expiry back
        // into the command channel
        tokio::time::advance(Duration::from_millis(200)).await;
        let expiry = session.command_rx.recv().await.expect("cooldown expiry");
        session.handle_command(expiry);
        session.handle_command(fire_input(3));

        let spawned = drain_events(&mut rx)
            .iter()
            .filter(|e| matches!(e, ServerMsg::ProjectileSpawned { .. }))
            .count();
        assert_eq!(spawned, 2, "one spawn per accepted trigger pull");
    }

    #[test]
    fn damage_for_missing_character_is_dropped() {
        let (mut session, _handle) = new_session();
        join(&mut session, "alice");
        damage(&mut session, Uuid::new_v4(), 50.0);
    }

    #[test]
    fn leaving_removes_controller_record_and_character() {
        let (mut session, _handle) = new_session();
        let peer = join(&mut session, "alice");

        session.handle_command(SessionCommand::Leave {
            controller_id: peer.controller_id,
        });

        assert!(session.controllers.is_empty());
        assert!(session.characters.is_empty());
        assert!(session.roster.death_count(peer.player_id).is_none());
    }
}
