//! Per-player persistent counters - deaths and score
//!
//! Records outlive individual character lives and are dropped when the
//! player's session ends. Mutation happens only on the authoritative side
//! (the session loop); the HTTP surface holds a read-only view.

use dashmap::DashMap;
use tracing::debug;

use crate::ws::protocol::{ControllerId, PlayerId, RosterEntry};

/// Persistent per-player record for one session
#[derive(Debug, Clone)]
pub struct PlayerRecord {
    pub player_id: PlayerId,
    pub display_name: String,
    death_count: f32,
    score: u32,
}

impl PlayerRecord {
    pub fn new(player_id: PlayerId, display_name: String) -> Self {
        Self {
            player_id,
            display_name,
            death_count: 0.0,
            score: 0,
        }
    }

    pub fn death_count(&self) -> f32 {
        self.death_count
    }

    /// Add to the death counter. The delta's sign is not validated,
    /// symmetric with damage application; callers only pass positive deltas
    /// on death.
    pub fn add_death_count(&mut self, delta: f32) {
        self.death_count += delta;
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn add_score(&mut self, delta: u32) {
        self.score += delta;
    }
}

/// All player records of the running session, keyed by player id
#[derive(Debug, Default)]
pub struct Roster {
    records: DashMap<PlayerId, PlayerRecord>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: PlayerRecord) {
        self.records.insert(record.player_id, record);
    }

    pub fn remove(&self, player_id: PlayerId) -> Option<PlayerRecord> {
        self.records.remove(&player_id).map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn death_count(&self, player_id: PlayerId) -> Option<f32> {
        self.records.get(&player_id).map(|r| r.death_count())
    }

    pub fn score(&self, player_id: PlayerId) -> Option<u32> {
        self.records.get(&player_id).map(|r| r.score())
    }

    /// Add to a player's death counter, returning the new total. A missing
    /// record is a no-op, not a failure - death handling degrades
    /// gracefully when a controller has no resolvable player record.
    pub fn add_death_count(&self, player_id: PlayerId, delta: f32) -> Option<f32> {
        match self.records.get_mut(&player_id) {
            Some(mut record) => {
                record.add_death_count(delta);
                Some(record.death_count())
            }
            None => {
                debug!(player_id = %player_id, "death count update for unknown player record");
                None
            }
        }
    }

    /// Add to a player's score, returning the new total. Missing records
    /// no-op like `add_death_count`.
    pub fn add_score(&self, player_id: PlayerId, delta: u32) -> Option<u32> {
        match self.records.get_mut(&player_id) {
            Some(mut record) => {
                record.add_score(delta);
                Some(record.score())
            }
            None => {
                debug!(player_id = %player_id, "score update for unknown player record");
                None
            }
        }
    }

    /// Clone all records, for read-only views outside the session loop
    pub fn snapshot(&self) -> Vec<PlayerRecord> {
        self.records.iter().map(|r| r.clone()).collect()
    }

    /// Sum of all death counters, for occupancy stats
    pub fn total_deaths(&self) -> f32 {
        self.records.iter().map(|r| r.death_count()).sum()
    }

    /// Snapshot all records as wire roster entries. `controllers` maps each
    /// player to its controller for the wire view.
    pub fn entries<F>(&self, controllers: F) -> Vec<RosterEntry>
    where
        F: Fn(PlayerId) -> Option<ControllerId>,
    {
        self.records
            .iter()
            .filter_map(|r| {
                controllers(r.player_id).map(|controller_id| RosterEntry {
                    player_id: r.player_id,
                    controller_id,
                    display_name: r.display_name.clone(),
                    death_count: r.death_count(),
                    score: r.score(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use uuid::Uuid;

    #[test]
    fn death_count_accumulates() {
        let roster = Roster::new();
        let id = Uuid::new_v4();
        roster.insert(PlayerRecord::new(id, "alice".into()));

        assert_approx_eq!(roster.add_death_count(id, 1.0).unwrap(), 1.0);
        assert_approx_eq!(roster.add_death_count(id, 1.0).unwrap(), 2.0);
        // Negative delta is permitted by contract
        assert_approx_eq!(roster.add_death_count(id, -0.5).unwrap(), 1.5);
    }

    #[test]
    fn missing_record_is_a_no_op() {
        let roster = Roster::new();
        assert!(roster.add_death_count(Uuid::new_v4(), 1.0).is_none());
        assert!(roster.add_score(Uuid::new_v4(), 1).is_none());
    }

    #[test]
    fn score_accumulates() {
        let roster = Roster::new();
        let id = Uuid::new_v4();
        roster.insert(PlayerRecord::new(id, "bob".into()));

        assert_eq!(roster.add_score(id, 1).unwrap(), 1);
        assert_eq!(roster.add_score(id, 2).unwrap(), 3);
        assert_eq!(roster.score(id), Some(3));
    }

    #[test]
    fn remove_drops_the_record() {
        let roster = Roster::new();
        let id = Uuid::new_v4();
        roster.insert(PlayerRecord::new(id, "carol".into()));

        assert_eq!(roster.len(), 1);
        assert!(roster.remove(id).is_some());
        assert!(roster.is_empty());
        assert!(roster.death_count(id).is_none());
    }
}
