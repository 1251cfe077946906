//! Game Server Module
//!
//! Headless arcade race engine: player dynamics, AI traffic, collisions
//! and the race lifecycle. Rendering, input devices and persistence live
//! outside and talk to it through snapshots, controls and session requests.

pub mod backend;
pub mod collision;
pub mod error;
pub mod opponent;
pub mod progress;
pub mod race;
pub mod simulation;
pub mod timer;
pub mod vehicle;

pub use backend::{OfflineBackend, SessionBackend, SessionCompletion, SessionRequest, SessionStart};
pub use error::{BackendError, RaceError};
pub use race::{
    CarProfile, LevelConfig, PlayerProfile, RaceConfig, RacePhase, RaceResult, RaceSession,
    RaceSnapshot,
};
pub use simulation::{create_shared_server, GameServer, ServerStats, SharedGameServer};
pub use vehicle::{CarPerformanceStats, Control, ControlVector, Vehicle, VehicleState};
