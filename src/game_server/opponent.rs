//! Opponent - AI traffic
//!
//! Opponents drive straight down the track at a fixed per-car speed while
//! weaving around their lane. Cars that drop too far behind the player are
//! recycled ahead of it, so a handful of cars gives endless traffic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game_server::vehicle::Vec3;

/// State of a single AI car
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpponentState {
    pub id: u32,
    pub position: Vec3,
    /// Lateral anchor the car weaves around
    pub lane_offset: f32,
    /// Forward speed (units/s), fixed at spawn
    pub speed: f32,
    /// How far behind the player (in +z) the car may fall before being recycled
    pub respawn_threshold: f32,
}

/// All AI cars of a race plus the RNG used to place them
#[derive(Debug, Clone)]
pub struct Traffic {
    opponents: Vec<OpponentState>,
    rng: StdRng,
}

impl Traffic {
    const LANES: [f32; 5] = [-10.0, -5.0, 0.0, 5.0, 10.0];
    const RIDE_HEIGHT: f32 = 1.0;
    const FIRST_SPAWN_Z: f32 = -50.0;
    const SPAWN_SPACING: f32 = 35.0;
    const SPEED_SPREAD: f32 = 3.0;
    const RESPAWN_THRESHOLD: f32 = 30.0;
    const RESPAWN_MIN_AHEAD: f32 = 80.0;
    const RESPAWN_SPREAD: f32 = 200.0;
    const WEAVE_FREQUENCY: f32 = 0.5;
    const WEAVE_AMPLITUDE: f32 = 1.5;

    /// Create an empty field; `seed` makes spawning and recycling reproducible
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            opponents: Vec::new(),
            rng,
        }
    }

    /// Lanes that fit inside the track
    pub fn lanes(track_half_width: f32) -> Vec<f32> {
        Self::LANES
            .iter()
            .copied()
            .filter(|lane| lane.abs() <= track_half_width)
            .collect()
    }

    /// Replace the field with `count` cars in staggered rows ahead of the start
    pub fn spawn(&mut self, count: u32, track_half_width: f32, base_speed: f32) {
        let lanes = Self::lanes(track_half_width);
        self.opponents.clear();

        for i in 0..count {
            let lane_offset = if lanes.is_empty() {
                0.0
            } else {
                lanes[i as usize % lanes.len()]
            };
            let z = Self::FIRST_SPAWN_Z - i as f32 * Self::SPAWN_SPACING;
            let speed = base_speed + self.rng.gen::<f32>() * Self::SPEED_SPREAD;

            self.opponents.push(OpponentState {
                id: i,
                position: Vec3::new(lane_offset, Self::RIDE_HEIGHT, z),
                lane_offset,
                speed,
                respawn_threshold: Self::RESPAWN_THRESHOLD,
            });
        }
    }

    /// Advance every car by `delta` seconds. `elapsed` drives the shared
    /// weave; `player_z` is the player's position after this frame's move.
    /// Returns how many cars were recycled.
    pub fn update(&mut self, delta: f32, elapsed: f32, player_z: f32) -> usize {
        if !(delta > 0.0) {
            return 0;
        }

        let weave = (elapsed * Self::WEAVE_FREQUENCY).sin() * Self::WEAVE_AMPLITUDE;
        let mut recycled = 0;

        for car in &mut self.opponents {
            car.position.z -= car.speed * delta;
            car.position.x = car.lane_offset + weave;

            if car.position.z > player_z + car.respawn_threshold {
                let ahead = Self::RESPAWN_MIN_AHEAD + self.rng.gen::<f32>() * Self::RESPAWN_SPREAD;
                car.position.z = player_z - ahead;
                recycled += 1;
            }
        }

        recycled
    }

    pub fn opponents(&self) -> &[OpponentState] {
        &self.opponents
    }

    pub fn len(&self) -> usize {
        self.opponents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opponents.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn opponents_mut(&mut self) -> &mut Vec<OpponentState> {
        &mut self.opponents
    }
}

/// Compact opponent state for the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpponentSnapshot {
    pub id: u32,
    pub x: f32,
    pub z: f32,
}

impl From<&OpponentState> for OpponentSnapshot {
    fn from(state: &OpponentState) -> Self {
        Self {
            id: state.id,
            x: state.position.x,
            z: state.position.z,
        }
    }
}
