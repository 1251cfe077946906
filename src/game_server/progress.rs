//! Progress - Distance, rank, score and HUD speed

use serde::{Deserialize, Serialize};

use crate::game_server::opponent::OpponentState;

/// Race figures derived from positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub distance: f32,
    /// 1 = leading
    pub rank: u32,
    pub score: u32,
    /// km/h
    pub speed: f32,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    last_z: f32,
}

impl ProgressTracker {
    const MIN_DELTA: f32 = 0.0001;
    const KMH_PER_UNIT: f32 = 3.6;
    const POINTS_PER_UNIT: f32 = 0.2;
    const FINISH_BASE: f32 = 10_000.0;
    const FINISH_PENALTY_PER_SECOND: f32 = 100.0;

    pub fn new(start_z: f32) -> Self {
        Self { last_z: start_z }
    }

    pub fn reset(&mut self, start_z: f32) {
        self.last_z = start_z;
    }

    /// Recompute figures after the player moved to `player_z` over `delta` seconds
    pub fn update(&mut self, player_z: f32, opponents: &[OpponentState], delta: f32) -> Progress {
        let dz = player_z - self.last_z;
        self.last_z = player_z;

        let distance = (-player_z).max(0.0);
        Progress {
            distance,
            rank: Self::rank(player_z, opponents),
            score: Self::running_score(distance),
            speed: (dz / delta.max(Self::MIN_DELTA)).abs() * Self::KMH_PER_UNIT,
        }
    }

    /// 1 + cars further down the track. Equal z counts as behind.
    pub fn rank(player_z: f32, opponents: &[OpponentState]) -> u32 {
        let ahead = opponents
            .iter()
            .filter(|car| car.position.z < player_z)
            .count();
        1 + ahead as u32
    }

    /// Score shown while racing
    pub fn running_score(distance: f32) -> u32 {
        (distance * Self::POINTS_PER_UNIT).floor().max(0.0) as u32
    }

    /// Score awarded on crossing the line; faster runs score higher
    pub fn finish_score(race_time: f32) -> u32 {
        (Self::FINISH_BASE - race_time * Self::FINISH_PENALTY_PER_SECOND)
            .floor()
            .max(0.0) as u32
    }
}
