//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a player's persistent session record
pub type PlayerId = Uuid;
/// Identity of a controller (one per connection, outlives characters)
pub type ControllerId = Uuid;
/// Identity of a spawned character (one per life)
pub type CharacterId = Uuid;
/// Identity of a spawned projectile
pub type ProjectileId = Uuid;

/// World position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const UP: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Aim direction in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Aim {
    /// Horizontal angle
    pub yaw: f32,
    /// Vertical angle
    pub pitch: f32,
}

impl Aim {
    pub fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }

    /// Unit direction vector for this aim
    pub fn direction(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(cos_pitch * cos_yaw, cos_pitch * sin_yaw, sin_pitch)
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Join the running session
    Join,

    /// Player input for current tick
    InputTick {
        /// Sequence number, stale inputs are discarded
        seq: u32,
        /// Aim yaw in radians
        aim_yaw: f32,
        /// Aim pitch in radians
        aim_pitch: f32,
        /// Weapon trigger held this tick
        fire: bool,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the session
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        player_id: PlayerId,
        controller_id: ControllerId,
        server_time: u64,
    },

    /// Confirmation of session join, with current occupancy
    SessionJoined {
        session_id: Uuid,
        players: Vec<RosterEntry>,
        characters: Vec<CharacterInfo>,
    },

    /// Another player joined the session
    PlayerJoined {
        player: RosterEntry,
    },

    /// Player left the session
    PlayerLeft {
        controller_id: ControllerId,
        player_id: PlayerId,
    },

    /// A fresh character was spawned and possessed
    CharacterSpawned {
        character: CharacterInfo,
    },

    /// Replicated health changed (delivered in commit order)
    HealthUpdate {
        character_id: CharacterId,
        health: f32,
    },

    /// Death feedback for the locally-controlled peer only
    DeathNotice {
        controller_id: ControllerId,
        message: String,
    },

    /// A player's death counter changed
    DeathCountChanged {
        player_id: PlayerId,
        death_count: f32,
    },

    /// A player's score changed
    ScoreChanged {
        player_id: PlayerId,
        score: u32,
    },

    /// A projectile was spawned by the firing character
    ProjectileSpawned {
        projectile_id: ProjectileId,
        location: Vec3,
        rotation: Aim,
        instigator: ControllerId,
        owner: CharacterId,
    },

    /// A character's lifecycle ended (ragdoll lifespan elapsed or despawn)
    CharacterDestroyed {
        character_id: CharacterId,
        controller_id: ControllerId,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Roster entry for session join / scoreboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player_id: PlayerId,
    pub controller_id: ControllerId,
    pub display_name: String,
    pub death_count: f32,
    pub score: u32,
}

/// Character state as seen on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterInfo {
    pub character_id: CharacterId,
    pub controller_id: ControllerId,
    pub position: Vec3,
    pub health: f32,
    pub max_health: f32,
    pub ragdoll: bool,
}
