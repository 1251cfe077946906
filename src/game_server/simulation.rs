//! Simulation - Game server and frame driver
//!
//! Owns the race session, measures wall-clock frame time, and forwards the
//! session requests queued by the race to the backend once the frame is
//! done.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::game_server::backend::{OfflineBackend, SessionBackend, SessionRequest};
use crate::game_server::error::RaceError;
use crate::game_server::race::{
    CarProfile, LevelConfig, PlayerProfile, RaceConfig, RacePhase, RaceResult, RaceSession,
    RaceSnapshot,
};
use crate::game_server::vehicle::Control;

/// Server statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStats {
    pub tick_count: u64,
    pub avg_tick_time_ms: f32,
    pub opponent_count: u32,
    pub phase: RacePhase,
    pub paused: bool,
}

/// Main game server
pub struct GameServer {
    race: RaceSession,
    backend: Box<dyn SessionBackend>,
    /// Backend id of the race in progress, if the backend gave us one
    session_id: Option<String>,
    /// Last tick timestamp
    last_tick: Instant,
    /// Compute time of recent ticks (ms)
    tick_times: Vec<f32>,
    tick_count: u64,
    /// Outcome of the last finished or crashed race, kept after the race resets
    last_result: Option<RaceResult>,
}

impl GameServer {
    const TICK_WINDOW: usize = 60;

    /// Create a server with default tuning and no remote backend
    pub fn new() -> Self {
        Self::with_backend(RaceConfig::default(), Box::new(OfflineBackend::default()))
    }

    pub fn with_backend(config: RaceConfig, backend: Box<dyn SessionBackend>) -> Self {
        Self {
            race: RaceSession::new(config, LevelConfig::default()),
            backend,
            session_id: None,
            last_tick: Instant::now(),
            tick_times: Vec::with_capacity(Self::TICK_WINDOW),
            tick_count: 0,
            last_result: None,
        }
    }

    pub fn select_player(&mut self, player: PlayerProfile) {
        self.race.select_player(player);
    }

    pub fn select_car(&mut self, car: CarProfile) {
        self.race.select_car(car);
    }

    pub fn load_level(&mut self, level: LevelConfig) -> Result<(), RaceError> {
        level.validate()?;
        self.race.set_level(level);
        Ok(())
    }

    /// Start the race countdown
    pub fn start_race(&mut self) -> Result<(), RaceError> {
        self.race.start()?;
        self.last_tick = Instant::now();
        self.last_result = None;
        self.dispatch_requests();
        Ok(())
    }

    pub fn retry(&mut self) -> Result<(), RaceError> {
        self.race.retry()?;
        self.last_tick = Instant::now();
        self.last_result = None;
        self.dispatch_requests();
        Ok(())
    }

    pub fn set_control(&mut self, control: Control, pressed: bool) {
        self.race.set_control(control, pressed);
    }

    /// Perform a simulation tick using wall-clock time since the previous one
    pub fn tick(&mut self) -> RaceSnapshot {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.advance(delta)
    }

    /// Perform a simulation tick of exactly `delta` seconds
    pub fn advance(&mut self, delta: f32) -> RaceSnapshot {
        let tick_start = Instant::now();

        // Violations are logged and already reset the race
        if let Err(err) = self.race.update(delta) {
            log::warn!("Frame discarded: {}", err);
        }
        if let Some(result) = self.race.result() {
            self.last_result = Some(result.clone());
        }
        self.dispatch_requests();

        let tick_time = tick_start.elapsed().as_secs_f32() * 1000.0;
        self.tick_times.push(tick_time);
        if self.tick_times.len() > Self::TICK_WINDOW {
            self.tick_times.remove(0);
        }
        self.tick_count += 1;

        self.race.snapshot()
    }

    /// Fire-and-forget delivery; failures never reach the race
    fn dispatch_requests(&mut self) {
        for request in self.race.drain_requests() {
            match request {
                SessionRequest::Start(start) => {
                    self.session_id = match self.backend.create_session(&start) {
                        Ok(id) => Some(id),
                        Err(err) => {
                            log::warn!("Could not create session: {}", err);
                            None
                        }
                    };
                }
                SessionRequest::Complete(completion) => match self.session_id.take() {
                    Some(id) => {
                        if let Err(err) = self.backend.complete_session(&id, &completion) {
                            log::warn!("Could not complete session {}: {}", id, err);
                        }
                    }
                    None => log::debug!("No backend session to complete"),
                },
            }
        }
    }

    /// Get current race snapshot
    pub fn get_snapshot(&self) -> RaceSnapshot {
        self.race.snapshot()
    }

    /// Result of the current race, or of the last one if it has already reset
    pub fn get_result(&self) -> Option<RaceResult> {
        self.race.result().cloned().or_else(|| self.last_result.clone())
    }

    /// Get server statistics
    pub fn get_stats(&self) -> ServerStats {
        let avg_tick_time = if self.tick_times.is_empty() {
            0.0
        } else {
            self.tick_times.iter().sum::<f32>() / self.tick_times.len() as f32
        };

        ServerStats {
            tick_count: self.tick_count,
            avg_tick_time_ms: avg_tick_time,
            opponent_count: self.race.traffic().len() as u32,
            phase: self.race.phase(),
            paused: self.race.is_paused(),
        }
    }

    pub fn phase(&self) -> RacePhase {
        self.race.phase()
    }

    /// Back to idle, dropping the last result; a race in flight is
    /// abandoned without a completion
    pub fn reset(&mut self) {
        if self.race.phase() != RacePhase::Idle && !self.race.phase().is_terminal() {
            log::info!("Abandoning race in {:?}", self.race.phase());
        }
        self.race.reset();
        self.session_id = None;
        self.last_result = None;
        self.tick_times.clear();
    }

    /// Pause the simulation
    pub fn pause(&mut self) -> Result<(), RaceError> {
        self.race.pause()
    }

    /// Resume the simulation; time spent paused is not simulated
    pub fn resume(&mut self) {
        self.race.resume();
        self.last_tick = Instant::now();
    }

    pub fn race(&self) -> &RaceSession {
        &self.race
    }
}

impl Default for GameServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe game server shared between the input and render sides
pub type SharedGameServer = Arc<Mutex<GameServer>>;

/// Create a new shared game server
pub fn create_shared_server() -> SharedGameServer {
    Arc::new(Mutex::new(GameServer::new()))
}
