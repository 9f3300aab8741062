//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::game::SessionConfig;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origin for CORS (comma-separated list)
    pub client_origin: String,

    /// Starting and maximum health per character life
    pub max_health: f32,
    /// Seconds between accepted weapon trigger pulls
    pub fire_rate: f32,
    /// Seconds a dead character lingers as a ragdoll before destruction
    pub death_lifespan: f32,
    /// Seed for deterministic spawn point selection; random when unset
    pub session_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables. Gameplay tunables are
    /// validated here so a bad deployment fails at startup, not mid-match.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let max_health = parse_or("MAX_HEALTH", 100.0)?;
        if !(max_health > 0.0) || !max_health.is_finite() {
            return Err(ConfigError::InvalidMaxHealth(max_health));
        }

        let fire_rate = parse_or("FIRE_RATE", 0.25)?;
        if !(fire_rate > 0.0) || !fire_rate.is_finite() {
            return Err(ConfigError::InvalidFireRate(fire_rate));
        }

        let death_lifespan = parse_or("DEATH_LIFESPAN_SECS", 3.0)?;
        if !(death_lifespan >= 0.0) || !death_lifespan.is_finite() {
            return Err(ConfigError::InvalidDeathLifespan(death_lifespan));
        }

        let session_seed = match env::var("SESSION_SEED") {
            Ok(raw) => Some(
                raw.parse()
                    .map_err(|_| ConfigError::InvalidNumber("SESSION_SEED"))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            max_health,
            fire_rate,
            death_lifespan,
            session_seed,
        })
    }

    /// Session tunables derived from this configuration
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            max_health: self.max_health,
            fire_rate: self.fire_rate,
            death_lifespan: self.death_lifespan,
            seed: self.session_seed.unwrap_or_else(rand::random),
        }
    }
}

fn parse_or(var: &'static str, default: f32) -> Result<f32, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidNumber(var)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Environment variable {0} is not a valid number")]
    InvalidNumber(&'static str),

    #[error("Max health must be positive and finite, got {0}")]
    InvalidMaxHealth(f32),

    #[error("Fire rate must be positive and finite, got {0}")]
    InvalidFireRate(f32),

    #[error("Death lifespan must be non-negative and finite, got {0}")]
    InvalidDeathLifespan(f32),
}
