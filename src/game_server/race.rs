//! Race - Configuration, lifecycle and the per-frame pipeline
//!
//! `RaceSession` owns every piece of race state. Each frame it collects due
//! phase timers, runs dynamics, traffic, progress and collision in that
//! order (only while `Active`), then applies the collected timers. Terminal
//! phases are guarded by one-shot latches, finish before crash.

use serde::{Deserialize, Serialize};

use crate::game_server::backend::{SessionCompletion, SessionRequest, SessionStart};
use crate::game_server::collision::{CollisionDetector, CollisionEvent};
use crate::game_server::error::RaceError;
use crate::game_server::opponent::{OpponentSnapshot, Traffic};
use crate::game_server::progress::{Progress, ProgressTracker};
use crate::game_server::timer::{FiredTimer, PhaseTimers, TimerKind};
use crate::game_server::vehicle::{
    CarPerformanceStats, Control, ControlVector, Vehicle, VehicleSnapshot, VehicleState,
};

/// Track data supplied by the level collaborator, read at race start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub level_number: u32,
    /// Track length in units; the finish line sits near its midpoint
    pub track_length: f32,
    pub opponents_count: u32,
    pub track_half_width: f32,
    /// Coins awarded for a win
    pub reward_coins: u32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            level_number: 1,
            track_length: 5000.0,
            opponents_count: 5,
            track_half_width: 14.0,
            reward_coins: 0,
        }
    }
}

impl LevelConfig {
    const FINISH_MARGIN: f32 = 30.0;

    /// Parse level data; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, RaceError> {
        let level: Self = serde_json::from_str(json)?;
        level.validate()?;
        Ok(level)
    }

    pub fn validate(&self) -> Result<(), RaceError> {
        if !(self.track_length > 0.0) {
            return Err(RaceError::Config(format!(
                "track_length must be positive, got {}",
                self.track_length
            )));
        }
        if !(self.track_half_width > 0.0) {
            return Err(RaceError::Config(format!(
                "track_half_width must be positive, got {}",
                self.track_half_width
            )));
        }
        Ok(())
    }

    /// The player finishes on reaching z <= finish_z
    pub fn finish_z(&self) -> f32 {
        -(self.track_length / 2.0 - Self::FINISH_MARGIN)
    }
}

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    pub collision_radius: f32,
    /// Longest frame the engine will simulate (seconds)
    pub max_frame_dt: f32,
    pub countdown_ticks: u32,
    pub settle_delay: f32,
    pub finish_display_delay: f32,
    /// Seconds offered to retry after a crash
    pub crash_countdown: u32,
    pub opponent_base_speed: f32,
    pub nitro_charges: u32,
    /// Seed for opponent placement; random when absent
    pub seed: Option<u64>,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            collision_radius: 2.2,
            max_frame_dt: 0.1,
            countdown_ticks: 3,
            settle_delay: 0.6,
            finish_display_delay: 1.5,
            crash_countdown: 10,
            opponent_base_speed: 6.0,
            nitro_charges: 3,
            seed: None,
        }
    }
}

/// Race lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    Idle,
    Countdown,
    Active,
    Finished,
    Crashed,
}

impl RacePhase {
    /// Transitions the state machine may take (reset to Idle is always allowed)
    pub fn can_become(self, next: RacePhase) -> bool {
        use RacePhase::*;
        matches!(
            (self, next),
            (_, Idle)
                | (Idle, Countdown)
                | (Crashed, Countdown)
                | (Countdown, Active)
                | (Active, Finished)
                | (Active, Crashed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RacePhase::Finished | RacePhase::Crashed)
    }
}

/// Who is racing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: String,
    pub username: String,
}

/// The vehicle picked in the garage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarProfile {
    pub id: String,
    pub stats: CarPerformanceStats,
}

/// Outcome of a finished or crashed race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceResult {
    pub won: bool,
    pub position: u32,
    pub time: f32,
    pub score: u32,
    pub distance: f32,
    pub collisions: u32,
    pub nitro_used: u32,
    pub coins_earned: u32,
}

/// Read model published to the renderer and HUD every frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub phase: RacePhase,
    pub paused: bool,
    pub distance: f32,
    /// km/h
    pub speed: f32,
    /// Rank, 1 = leading
    pub position: u32,
    pub score: u32,
    pub time: f32,
    pub collision_count: u32,
    pub nitro_remaining: u32,
    /// Seconds left in the 3-2-1 countdown
    pub countdown: Option<u32>,
    /// Seconds left to retry after a crash
    pub crash_countdown: Option<u32>,
    pub finish_z: f32,
    pub player: VehicleSnapshot,
    pub opponents: Vec<OpponentSnapshot>,
}

/// Complete race state
#[derive(Debug, Clone)]
pub struct RaceSession {
    config: RaceConfig,
    /// Level used for the next race
    level: LevelConfig,
    /// Level the current race was started with
    track: LevelConfig,
    phase: RacePhase,
    paused: bool,
    player: Option<PlayerProfile>,
    car: Option<CarProfile>,
    /// Car the current race was started with
    race_car: Option<CarProfile>,
    controls: ControlVector,
    vehicle: VehicleState,
    nitro_charges: u32,
    traffic: Traffic,
    detector: CollisionDetector,
    tracker: ProgressTracker,
    progress: Progress,
    timers: PhaseTimers,
    countdown: Option<u32>,
    crash_countdown: Option<u32>,
    /// Session clock (seconds), drives the opponent weave
    elapsed: f32,
    /// Seconds spent in `Active`
    race_time: f32,
    collisions: u32,
    finish_triggered: bool,
    crash_triggered: bool,
    result: Option<RaceResult>,
    outbox: Vec<SessionRequest>,
}

impl RaceSession {
    /// Create an idle session
    pub fn new(config: RaceConfig, level: LevelConfig) -> Self {
        Self {
            traffic: Traffic::new(config.seed),
            detector: CollisionDetector::new(config.collision_radius),
            nitro_charges: config.nitro_charges,
            tracker: ProgressTracker::new(Vehicle::SPAWN.z),
            track: level.clone(),
            level,
            config,
            phase: RacePhase::Idle,
            paused: false,
            player: None,
            car: None,
            race_car: None,
            controls: ControlVector::default(),
            vehicle: VehicleState::at_start(),
            progress: Progress::default(),
            timers: PhaseTimers::new(),
            countdown: None,
            crash_countdown: None,
            elapsed: 0.0,
            race_time: 0.0,
            collisions: 0,
            finish_triggered: false,
            crash_triggered: false,
            result: None,
            outbox: Vec::new(),
        }
    }

    pub fn select_player(&mut self, player: PlayerProfile) {
        self.player = Some(player);
    }

    /// Takes effect at the next race start
    pub fn select_car(&mut self, car: CarProfile) {
        self.car = Some(car);
    }

    /// Takes effect at the next race start
    pub fn set_level(&mut self, level: LevelConfig) {
        self.level = level;
    }

    /// Begin the countdown for a new race
    pub fn start(&mut self) -> Result<(), RaceError> {
        if self.phase != RacePhase::Idle {
            return Err(RaceError::InvalidPhase {
                action: "start a race",
                phase: self.phase,
            });
        }
        let request = self.session_start(self.car.as_ref(), self.level.level_number)?;
        self.track = self.level.clone();
        self.race_car = self.car.clone();
        self.begin_countdown();
        self.outbox.push(SessionRequest::Start(request));
        log::info!(
            "Race started on level {} with {} opponents",
            self.track.level_number,
            self.traffic.len()
        );
        Ok(())
    }

    /// Restart from the crash screen with a fresh car
    pub fn retry(&mut self) -> Result<(), RaceError> {
        if self.phase != RacePhase::Crashed {
            return Err(RaceError::InvalidPhase {
                action: "retry",
                phase: self.phase,
            });
        }
        let request = self.session_start(self.race_car.as_ref(), self.track.level_number)?;
        self.begin_countdown();
        self.outbox.push(SessionRequest::Start(request));
        log::info!("Race retried after crash #{}", self.collisions);
        Ok(())
    }

    /// Back to `Idle` from any phase, clearing all race figures
    pub fn reset(&mut self) {
        self.transition(RacePhase::Idle);
        self.paused = false;
        self.controls.clear();
        self.vehicle = VehicleState::at_start();
        self.nitro_charges = self.config.nitro_charges;
        self.traffic.spawn(0, self.track.track_half_width, self.config.opponent_base_speed);
        self.detector.reset();
        self.tracker.reset(Vehicle::SPAWN.z);
        self.progress = Progress::default();
        self.countdown = None;
        self.crash_countdown = None;
        self.race_time = 0.0;
        self.collisions = 0;
        self.finish_triggered = false;
        self.crash_triggered = false;
        self.result = None;
        log::info!("Race reset");
    }

    /// Freeze the simulation; only meaningful inside a race
    pub fn pause(&mut self) -> Result<(), RaceError> {
        if self.phase == RacePhase::Idle {
            return Err(RaceError::InvalidPhase {
                action: "pause",
                phase: self.phase,
            });
        }
        self.paused = true;
        Ok(())
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Record a key/touch change; last write wins per control
    pub fn set_control(&mut self, control: Control, pressed: bool) {
        self.controls.set(control, pressed);
    }

    /// Advance the race by `delta` seconds.
    ///
    /// If the frame leaves the state corrupted the race is reset to `Idle`
    /// and the violation is returned.
    pub fn update(&mut self, delta: f32) -> Result<(), RaceError> {
        if self.paused || !(delta > 0.0) {
            return Ok(());
        }
        let delta = delta.min(self.config.max_frame_dt);
        self.elapsed += delta;

        // Timers scheduled during this frame's pipeline start counting next frame
        let fired = self.timers.advance(delta);
        if self.phase == RacePhase::Active {
            self.run_active_frame(delta);
        }
        for timer in fired {
            self.on_timer(timer);
        }

        if let Err(err) = self.check_invariants() {
            log::error!("{}; resetting race", err);
            self.reset();
            return Err(err);
        }
        Ok(())
    }

    fn run_active_frame(&mut self, delta: f32) {
        let stats = self.car_stats();
        Vehicle::step(
            &mut self.vehicle,
            &self.controls,
            &stats,
            &mut self.nitro_charges,
            self.track.track_half_width,
            delta,
        );
        self.race_time += delta;

        let player_z = self.vehicle.position.z;
        self.traffic.update(delta, self.elapsed, player_z);
        self.progress = self.tracker.update(player_z, self.traffic.opponents(), delta);

        if self.finish_triggered || self.crash_triggered {
            return;
        }
        if player_z <= self.track.finish_z() {
            self.finish();
        } else if let Some(event) = self
            .detector
            .check(&self.vehicle.position, self.traffic.opponents())
        {
            self.crash(event);
        }
    }

    fn finish(&mut self) {
        self.finish_triggered = true;
        self.progress.score = ProgressTracker::finish_score(self.race_time);
        self.transition(RacePhase::Finished);
        self.conclude(true);
        self.timers
            .schedule(TimerKind::FinishDisplay, self.config.finish_display_delay);
        log::info!(
            "Race finished in {:.2}s, score {}",
            self.race_time,
            self.progress.score
        );
    }

    fn crash(&mut self, event: CollisionEvent) {
        self.crash_triggered = true;
        self.collisions += 1;
        self.progress.score = 0;
        self.transition(RacePhase::Crashed);
        self.conclude(false);
        self.crash_countdown = Some(self.config.crash_countdown);
        self.timers.schedule(TimerKind::CrashTick, 1.0);
        log::info!(
            "Crashed into opponent {} at {:.0}m",
            event.opponent_id,
            self.progress.distance
        );
    }

    /// Store the result and queue the session completion
    fn conclude(&mut self, won: bool) {
        let result = RaceResult {
            won,
            position: self.progress.rank,
            time: self.race_time,
            score: self.progress.score,
            distance: self.progress.distance,
            collisions: self.collisions,
            nitro_used: self.config.nitro_charges.saturating_sub(self.nitro_charges),
            coins_earned: if won { self.track.reward_coins } else { 0 },
        };
        self.outbox.push(SessionRequest::Complete(SessionCompletion {
            won,
            score: result.score,
            distance_traveled: result.distance,
            collisions: result.collisions,
            nitro_used: result.nitro_used,
        }));
        self.result = Some(result);
    }

    fn on_timer(&mut self, fired: FiredTimer) {
        if let Err(err) = self.timers.validate(&fired.handle) {
            log::debug!("{}", err);
            return;
        }
        let carry = fired.overshoot;

        match fired.handle.kind {
            TimerKind::CountdownTick => {
                let left = self.countdown.unwrap_or(0).saturating_sub(1);
                self.countdown = Some(left);
                log::debug!("Countdown {}", left);
                if left == 0 {
                    self.timers
                        .schedule(TimerKind::Settle, self.config.settle_delay - carry);
                } else {
                    self.timers.schedule(TimerKind::CountdownTick, 1.0 - carry);
                }
            }
            TimerKind::Settle => {
                self.countdown = None;
                self.transition(RacePhase::Active);
                log::info!("Race is live");
            }
            TimerKind::FinishDisplay => self.reset(),
            TimerKind::CrashTick => {
                let left = self.crash_countdown.unwrap_or(0).saturating_sub(1);
                if left == 0 {
                    log::info!("Retry window expired");
                    self.reset();
                } else {
                    self.crash_countdown = Some(left);
                    self.timers.schedule(TimerKind::CrashTick, 1.0 - carry);
                }
            }
        }
    }

    /// Fresh car, fresh traffic, 3-2-1
    fn begin_countdown(&mut self) {
        self.transition(RacePhase::Countdown);
        self.paused = false;
        self.controls.clear();
        self.vehicle = VehicleState::at_start();
        self.nitro_charges = self.config.nitro_charges;
        self.traffic.spawn(
            self.track.opponents_count,
            self.track.track_half_width,
            self.config.opponent_base_speed,
        );
        self.detector.reset();
        self.tracker.reset(Vehicle::SPAWN.z);
        self.progress = Progress {
            rank: ProgressTracker::rank(Vehicle::SPAWN.z, self.traffic.opponents()),
            ..Progress::default()
        };
        self.race_time = 0.0;
        self.finish_triggered = false;
        self.crash_triggered = false;
        self.crash_countdown = None;
        self.result = None;

        if self.config.countdown_ticks == 0 {
            self.countdown = Some(0);
            self.timers
                .schedule(TimerKind::Settle, self.config.settle_delay);
        } else {
            self.countdown = Some(self.config.countdown_ticks);
            self.timers.schedule(TimerKind::CountdownTick, 1.0);
        }
    }

    /// Every phase change cancels outstanding timers
    fn transition(&mut self, next: RacePhase) {
        debug_assert!(
            self.phase.can_become(next),
            "illegal transition {:?} -> {:?}",
            self.phase,
            next
        );
        self.timers.invalidate();
        if next == RacePhase::Active {
            self.detector.arm();
        } else {
            self.detector.disarm();
        }
        log::debug!("Phase {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    fn session_start(
        &self,
        car: Option<&CarProfile>,
        level_number: u32,
    ) -> Result<SessionStart, RaceError> {
        let player = self
            .player
            .as_ref()
            .ok_or(RaceError::Precondition { missing: "player" })?;
        let car = car.ok_or(RaceError::Precondition { missing: "vehicle" })?;
        Ok(SessionStart {
            player_id: player.id.clone(),
            car_id: car.id.clone(),
            level_number,
        })
    }

    fn car_stats(&self) -> CarPerformanceStats {
        self.race_car.as_ref().map(|c| c.stats).unwrap_or_default()
    }

    fn check_invariants(&self) -> Result<(), RaceError> {
        let violation =
            |detail: String| -> Result<(), RaceError> { Err(RaceError::InvariantViolation { detail }) };

        if !self.vehicle.is_finite() {
            return violation(format!("non-finite player state {:?}", self.vehicle));
        }
        if self.vehicle.position.x.abs() > self.track.track_half_width {
            return violation(format!("player off track at x={}", self.vehicle.position.x));
        }
        let ceiling = self.car_stats().speed_ceiling();
        if self.vehicle.longitudinal_speed.abs() > ceiling + 1e-3 {
            return violation(format!(
                "speed {} above ceiling {}",
                self.vehicle.longitudinal_speed, ceiling
            ));
        }
        if let Some(car) = self
            .traffic
            .opponents()
            .iter()
            .find(|car| !car.position.is_finite())
        {
            return violation(format!("non-finite opponent {}", car.id));
        }
        Ok(())
    }

    /// Hand queued session requests to the caller
    pub fn drain_requests(&mut self) -> Vec<SessionRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Get compact snapshot for the renderer/HUD
    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            phase: self.phase,
            paused: self.paused,
            distance: self.progress.distance,
            speed: self.progress.speed,
            position: self.progress.rank,
            score: self.progress.score,
            time: self.race_time,
            collision_count: self.collisions,
            nitro_remaining: self.nitro_charges,
            countdown: self.countdown,
            crash_countdown: self.crash_countdown,
            finish_z: self.track.finish_z(),
            player: VehicleSnapshot::from(&self.vehicle),
            opponents: self
                .traffic
                .opponents()
                .iter()
                .map(OpponentSnapshot::from)
                .collect(),
        }
    }

    pub fn phase(&self) -> RacePhase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn result(&self) -> Option<&RaceResult> {
        self.result.as_ref()
    }

    pub fn vehicle(&self) -> &VehicleState {
        &self.vehicle
    }

    pub fn traffic(&self) -> &Traffic {
        &self.traffic
    }

    pub fn controls(&self) -> &ControlVector {
        &self.controls
    }

    pub fn level(&self) -> &LevelConfig {
        &self.level
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn vehicle_mut(&mut self) -> &mut VehicleState {
        &mut self.vehicle
    }

    #[cfg(test)]
    pub(crate) fn traffic_mut(&mut self) -> &mut Traffic {
        &mut self.traffic
    }
}
