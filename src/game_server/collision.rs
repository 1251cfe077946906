//! Collision - Player vs opponent proximity test
//!
//! Planar circle test (x/z only). At most one contact is reported per frame
//! and, once reported, the detector stays latched until the race is reset.

use serde::{Deserialize, Serialize};

use crate::game_server::opponent::OpponentState;
use crate::game_server::vehicle::Vec3;

/// First contact found in a frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    pub opponent_id: u32,
    pub distance_sq: f32,
}

#[derive(Debug, Clone)]
pub struct CollisionDetector {
    radius: f32,
    armed: bool,
    latched: bool,
}

impl CollisionDetector {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            armed: false,
            latched: false,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Enable detection; only the active phase arms the detector
    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Clear the latch for a new race
    pub fn reset(&mut self) {
        self.armed = false;
        self.latched = false;
    }

    /// Scan opponents in order and stop at the first one inside the radius
    pub fn check(&mut self, player: &Vec3, opponents: &[OpponentState]) -> Option<CollisionEvent> {
        if !self.armed || self.latched {
            return None;
        }

        let radius_sq = self.radius * self.radius;
        let hit = opponents.iter().find_map(|car| {
            let dx = car.position.x - player.x;
            let dz = car.position.z - player.z;
            let distance_sq = dx * dx + dz * dz;
            (distance_sq <= radius_sq).then_some(CollisionEvent {
                opponent_id: car.id,
                distance_sq,
            })
        })?;

        self.latched = true;
        Some(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(id: u32, x: f32, z: f32) -> OpponentState {
        OpponentState {
            id,
            position: Vec3::new(x, 1.0, z),
            lane_offset: x,
            speed: 6.0,
            respawn_threshold: 30.0,
        }
    }

    #[test]
    fn overlapping_car_raises_one_event() {
        let mut detector = CollisionDetector::new(2.0);
        detector.arm();
        let player = Vec3::new(3.0, 1.0, -20.0);
        let cars = [car(0, 3.0, -20.0), car(1, 3.5, -20.5)];

        let event = detector.check(&player, &cars).expect("contact");
        assert_eq!(event.opponent_id, 0);
        assert_eq!(event.distance_sq, 0.0);
        assert!(detector.is_latched());
    }

    #[test]
    fn latch_suppresses_further_events() {
        let mut detector = CollisionDetector::new(2.0);
        detector.arm();
        let player = Vec3::new(0.0, 1.0, 0.0);
        let cars = [car(0, 0.0, 1.0)];

        assert!(detector.check(&player, &cars).is_some());
        for _ in 0..10 {
            assert!(detector.check(&player, &cars).is_none());
        }

        detector.reset();
        detector.arm();
        assert!(detector.check(&player, &cars).is_some());
    }

    #[test]
    fn ride_height_is_ignored_and_radius_is_inclusive() {
        let mut detector = CollisionDetector::new(2.0);
        detector.arm();
        let player = Vec3::new(0.0, 50.0, 0.0);
        assert!(detector.check(&player, &[car(0, 2.0, 0.0)]).is_some());
    }

    #[test]
    fn nothing_reported_when_disarmed_or_clear() {
        let mut detector = CollisionDetector::new(2.2);
        let player = Vec3::new(0.0, 1.0, 0.0);
        assert!(detector.check(&player, &[car(0, 0.0, 0.0)]).is_none());

        detector.arm();
        assert!(detector.check(&player, &[car(0, 2.0, 1.0)]).is_none());
        assert!(!detector.is_latched());
    }
}
