//! Vehicle - Player car kinematics
//!
//! Each frame the held controls and the car's performance ratings are
//! integrated into a new position and speed. The model is arcade-style:
//! steering moves the car sideways directly and the car always travels
//! along the fixed track direction (negative z).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Plain 3D position. x = lateral offset, y = ride height, z = progress (negative is forward).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Car ratings on a 0-100 scale, as chosen in the garage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarPerformanceStats {
    pub speed_rating: f32,
    pub acceleration_rating: f32,
    pub handling_rating: f32,
    /// Carried for the garage; nitro in a race is a fixed number of charges
    pub nitro_capacity: f32,
}

impl CarPerformanceStats {
    pub fn new(speed: f32, acceleration: f32, handling: f32, nitro: f32) -> Self {
        let rating = |v: f32| if v.is_finite() { v.clamp(0.0, 100.0) } else { 0.0 };
        Self {
            speed_rating: rating(speed),
            acceleration_rating: rating(acceleration),
            handling_rating: rating(handling),
            nitro_capacity: rating(nitro),
        }
    }

    /// Top speed without nitro (units/s)
    pub fn max_speed(&self) -> f32 {
        self.speed_rating / 100.0 * 40.0
    }

    /// Units/s²
    pub fn accel_rate(&self) -> f32 {
        self.acceleration_rating / 100.0 * 30.0
    }

    /// Lateral units/s while a steering key is held
    pub fn turn_speed(&self) -> f32 {
        self.handling_rating / 100.0 * 12.0
    }

    /// Absolute speed ceiling, reached only under nitro
    pub fn speed_ceiling(&self) -> f32 {
        self.max_speed() * Vehicle::NITRO_SPEED_FACTOR
    }
}

impl Default for CarPerformanceStats {
    fn default() -> Self {
        Self::new(100.0, 100.0, 100.0, 100.0)
    }
}

/// One of the six driving commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    Forward,
    Backward,
    Left,
    Right,
    Brake,
    Nitro,
}

impl FromStr for Control {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "forward" => Ok(Self::Forward),
            "backward" => Ok(Self::Backward),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "brake" => Ok(Self::Brake),
            "nitro" => Ok(Self::Nitro),
            other => Err(format!("unknown control '{other}'")),
        }
    }
}

/// Held driving commands for the current frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlVector {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub brake: bool,
    pub nitro: bool,
}

impl ControlVector {
    /// Last write wins per control
    pub fn set(&mut self, control: Control, pressed: bool) {
        match control {
            Control::Forward => self.forward = pressed,
            Control::Backward => self.backward = pressed,
            Control::Left => self.left = pressed,
            Control::Right => self.right = pressed,
            Control::Brake => self.brake = pressed,
            Control::Nitro => self.nitro = pressed,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Kinematic state of a single car
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    pub position: Vec3,
    /// Cosmetic roll toward the steering side (radians)
    pub heading: f32,
    /// Signed speed along the track (units/s, positive is forward)
    pub longitudinal_speed: f32,
    /// Lateral speed applied by steering this frame (units/s, positive is right)
    pub lateral_velocity_bias: f32,
    pub nitro_active: bool,
    pub nitro_time_remaining: f32,
}

impl VehicleState {
    /// Car at rest on the start line
    pub fn at_start() -> Self {
        Self::at(Vehicle::SPAWN)
    }

    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            heading: 0.0,
            longitudinal_speed: 0.0,
            lateral_velocity_bias: 0.0,
            nitro_active: false,
            nitro_time_remaining: 0.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.heading.is_finite()
            && self.longitudinal_speed.is_finite()
            && self.nitro_time_remaining.is_finite()
    }
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::at_start()
    }
}

/// Vehicle dynamics
pub struct Vehicle;

impl Vehicle {
    pub const SPAWN: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    /// Rate constants below are defined per tick of a notional 60 Hz loop
    pub const REFERENCE_HZ: f32 = 60.0;
    const FRICTION: f32 = 0.98;
    const BRAKE_FACTOR: f32 = 0.9;
    const REVERSE_FACTOR: f32 = 0.4;
    pub const NITRO_SPEED_FACTOR: f32 = 1.5;
    pub const NITRO_DURATION: f32 = 2.0;
    const NITRO_EPSILON: f32 = 1e-4;
    const TILT: f32 = 0.2;
    const TILT_BLEND: f32 = 0.1;

    /// Advance one car by `delta` seconds.
    ///
    /// `nitro_charges` is the race's remaining boost count; one charge is
    /// consumed whenever a boost starts. A non-positive (or NaN) `delta`
    /// leaves the state untouched.
    pub fn step(
        state: &mut VehicleState,
        controls: &ControlVector,
        stats: &CarPerformanceStats,
        nitro_charges: &mut u32,
        track_half_width: f32,
        delta: f32,
    ) {
        if !(delta > 0.0) {
            return;
        }

        let max_speed = stats.max_speed();
        let accel = stats.accel_rate() * delta;
        let ref_frames = delta * Self::REFERENCE_HZ;
        let mut speed = state.longitudinal_speed;

        // Nitro arbitration
        if controls.nitro && *nitro_charges > 0 && !state.nitro_active {
            state.nitro_active = true;
            state.nitro_time_remaining = Self::NITRO_DURATION;
            *nitro_charges -= 1;
        }

        // Throttle, reverse or coast
        if controls.forward {
            speed = (speed + accel).min(max_speed);
        } else if controls.backward {
            speed = (speed - accel).max(-max_speed * Self::REVERSE_FACTOR);
        } else {
            speed *= Self::FRICTION.powf(ref_frames);
        }

        // Nitro override
        if state.nitro_active {
            speed = stats.speed_ceiling();
            state.nitro_time_remaining -= delta;
            if state.nitro_time_remaining <= Self::NITRO_EPSILON {
                state.nitro_active = false;
                state.nitro_time_remaining = 0.0;
            }
        }

        if controls.brake {
            speed *= Self::BRAKE_FACTOR.powf(ref_frames);
        }

        let ceiling = stats.speed_ceiling();
        speed = speed.clamp(-ceiling, ceiling);

        // Direct lateral control, no inertia
        let steer = match (controls.left, controls.right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        };
        state.lateral_velocity_bias = steer * stats.turn_speed();
        state.position.x += state.lateral_velocity_bias * delta;

        // Forward is -z
        state.position.z -= speed * delta;
        state.position.x = state.position.x.clamp(-track_half_width, track_half_width);
        state.longitudinal_speed = speed;

        let tilt_target = -steer * Self::TILT;
        let blend = 1.0 - (1.0 - Self::TILT_BLEND).powf(ref_frames);
        state.heading += (tilt_target - state.heading) * blend;
    }
}

/// Compact vehicle state for the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub tilt: f32,
    pub speed: f32,
    pub nitro_active: bool,
}

impl From<&VehicleState> for VehicleSnapshot {
    fn from(state: &VehicleState) -> Self {
        Self {
            x: state.position.x,
            y: state.position.y,
            z: state.position.z,
            tilt: state.heading,
            speed: state.longitudinal_speed,
            nitro_active: state.nitro_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF_WIDTH: f32 = 14.0;

    fn drive(
        state: &mut VehicleState,
        controls: ControlVector,
        stats: &CarPerformanceStats,
        charges: &mut u32,
        seconds: f32,
        delta: f32,
    ) {
        let frames = (seconds / delta).round() as usize;
        for _ in 0..frames {
            Vehicle::step(state, &controls, stats, charges, HALF_WIDTH, delta);
        }
    }

    fn held(f: impl FnOnce(&mut ControlVector)) -> ControlVector {
        let mut c = ControlVector::default();
        f(&mut c);
        c
    }

    #[test]
    fn ratings_scale_linearly() {
        let stats = CarPerformanceStats::new(50.0, 100.0, 25.0, 0.0);
        assert_eq!(stats.max_speed(), 20.0);
        assert_eq!(stats.accel_rate(), 30.0);
        assert_eq!(stats.turn_speed(), 3.0);
        assert_eq!(stats.speed_ceiling(), 30.0);

        let clamped = CarPerformanceStats::new(250.0, -3.0, f32::NAN, 100.0);
        assert_eq!(clamped.speed_rating, 100.0);
        assert_eq!(clamped.acceleration_rating, 0.0);
        assert_eq!(clamped.handling_rating, 0.0);
    }

    #[test]
    fn control_names_parse() {
        assert_eq!("forward".parse::<Control>(), Ok(Control::Forward));
        assert_eq!("NITRO".parse::<Control>(), Ok(Control::Nitro));
        assert!("jump".parse::<Control>().is_err());

        let mut controls = ControlVector::default();
        controls.set(Control::Left, true);
        controls.set(Control::Left, true);
        controls.set(Control::Left, false);
        assert!(!controls.left);
    }

    #[test]
    fn full_throttle_saturates_at_max_speed() {
        let stats = CarPerformanceStats::default();
        let mut state = VehicleState::at_start();
        let mut charges = 3;
        drive(&mut state, held(|c| c.forward = true), &stats, &mut charges, 5.0, 1.0 / 60.0);

        assert!((state.longitudinal_speed - 40.0).abs() < 1e-3);
        assert!(state.position.z < 0.0);
        assert_eq!(charges, 3);
    }

    #[test]
    fn reverse_is_capped_at_forty_percent() {
        let stats = CarPerformanceStats::default();
        let mut state = VehicleState::at_start();
        let mut charges = 0;
        drive(&mut state, held(|c| c.backward = true), &stats, &mut charges, 3.0, 0.05);

        assert!((state.longitudinal_speed + 16.0).abs() < 1e-3);
        assert!(state.position.z > 0.0);
    }

    #[test]
    fn coasting_decay_does_not_depend_on_frame_rate() {
        let stats = CarPerformanceStats::default();
        let mut charges = 0;
        let mut fast = VehicleState::at_start();
        fast.longitudinal_speed = 30.0;
        let mut slow = fast;

        drive(&mut fast, ControlVector::default(), &stats, &mut charges, 1.0, 1.0 / 120.0);
        drive(&mut slow, ControlVector::default(), &stats, &mut charges, 1.0, 1.0 / 20.0);

        let expected = 30.0 * 0.98f32.powf(60.0);
        assert!((fast.longitudinal_speed - expected).abs() < 1e-2);
        assert!((slow.longitudinal_speed - expected).abs() < 1e-2);
    }

    #[test]
    fn nitro_holds_ceiling_for_two_seconds_and_spends_one_charge() {
        let stats = CarPerformanceStats::default();
        let mut state = VehicleState::at_start();
        let mut charges = 3;
        let controls = held(|c| {
            c.nitro = true;
            c.backward = true;
        });

        // 8 frames of 0.25s cover the boost exactly
        for frame in 0..8 {
            Vehicle::step(&mut state, &controls, &stats, &mut charges, HALF_WIDTH, 0.25);
            assert_eq!(state.longitudinal_speed, 60.0, "frame {frame}");
        }
        assert_eq!(charges, 2);
        assert!(!state.nitro_active);

        // Still holding nitro re-arms with the next charge
        Vehicle::step(&mut state, &controls, &stats, &mut charges, HALF_WIDTH, 0.25);
        assert!(state.nitro_active);
        assert_eq!(charges, 1);
    }

    #[test]
    fn nitro_without_charges_does_nothing() {
        let stats = CarPerformanceStats::default();
        let mut state = VehicleState::at_start();
        let mut charges = 0;
        Vehicle::step(&mut state, &held(|c| c.nitro = true), &stats, &mut charges, HALF_WIDTH, 0.1);
        assert!(!state.nitro_active);
        assert_eq!(state.longitudinal_speed, 0.0);
    }

    #[test]
    fn brake_decays_harder_than_coasting() {
        let stats = CarPerformanceStats::default();
        let mut charges = 0;
        let mut braking = VehicleState::at_start();
        braking.longitudinal_speed = 40.0;
        let mut coasting = braking;

        drive(&mut braking, held(|c| c.brake = true), &stats, &mut charges, 0.5, 1.0 / 60.0);
        drive(&mut coasting, ControlVector::default(), &stats, &mut charges, 0.5, 1.0 / 60.0);

        assert!(braking.longitudinal_speed < coasting.longitudinal_speed);
        assert!((braking.longitudinal_speed - 40.0 * 0.98f32.powf(30.0) * 0.9f32.powf(30.0)).abs() < 1e-2);
    }

    #[test]
    fn steering_is_clamped_to_track() {
        let stats = CarPerformanceStats::default();
        let mut state = VehicleState::at_start();
        let mut charges = 0;
        drive(&mut state, held(|c| c.right = true), &stats, &mut charges, 4.0, 1.0 / 30.0);
        assert_eq!(state.position.x, HALF_WIDTH);
        assert!(state.heading < 0.0);

        drive(&mut state, held(|c| c.left = true), &stats, &mut charges, 0.5, 0.1);
        assert!((state.position.x - (HALF_WIDTH - 6.0)).abs() < 1e-3);
        assert_eq!(state.lateral_velocity_bias, -12.0);
    }

    #[test]
    fn non_positive_delta_is_a_no_op() {
        let stats = CarPerformanceStats::default();
        let mut state = VehicleState::at_start();
        state.longitudinal_speed = 12.0;
        let before = state;
        let mut charges = 3;
        let controls = held(|c| {
            c.forward = true;
            c.nitro = true;
        });

        for delta in [0.0, -0.5, f32::NAN] {
            Vehicle::step(&mut state, &controls, &stats, &mut charges, HALF_WIDTH, delta);
        }
        assert_eq!(state, before);
        assert_eq!(charges, 3);
    }

    #[test]
    fn speed_never_exceeds_nitro_ceiling() {
        let stats = CarPerformanceStats::new(80.0, 100.0, 100.0, 100.0);
        let mut state = VehicleState::at_start();
        let mut charges = 3;
        let ceiling = stats.speed_ceiling();

        for i in 0..2_000u32 {
            let controls = ControlVector {
                forward: i % 3 == 0,
                backward: i % 7 == 0,
                left: i % 5 == 0,
                right: i % 11 == 0,
                brake: i % 13 == 0,
                nitro: i % 17 == 0,
            };
            let delta = [1.0 / 144.0, 1.0 / 30.0, 0.1, 2.5][(i % 4) as usize];
            Vehicle::step(&mut state, &controls, &stats, &mut charges, HALF_WIDTH, delta);
            assert!(state.longitudinal_speed.abs() <= ceiling + 1e-4);
            assert!(state.position.x.abs() <= HALF_WIDTH);
        }
    }
}
