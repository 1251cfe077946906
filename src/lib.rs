//! Nitro Rush - Race engine backend
//!
//! Command layer for the game shell. The renderer, HUD and input handlers
//! call these with the shared server; errors come back as strings for the
//! shell to display.

pub mod game_server;

use std::sync::{Mutex, MutexGuard};

use game_server::race::{CarProfile, LevelConfig, PlayerProfile, RaceResult, RaceSnapshot};
use game_server::simulation::{GameServer, ServerStats};
use game_server::vehicle::{CarPerformanceStats, Control};

fn lock(server: &Mutex<GameServer>) -> Result<MutexGuard<'_, GameServer>, String> {
    server.lock().map_err(|e| e.to_string())
}

/// Set the racing player
pub fn select_player(server: &Mutex<GameServer>, id: String, username: String) -> Result<(), String> {
    let mut server = lock(server)?;
    log::info!("Player {} selected", username);
    server.select_player(PlayerProfile { id, username });
    Ok(())
}

/// Set the car chosen in the garage
pub fn select_car(
    server: &Mutex<GameServer>,
    id: String,
    stats: CarPerformanceStats,
) -> Result<(), String> {
    let mut server = lock(server)?;
    log::info!("Car {} selected", id);
    server.select_car(CarProfile { id, stats });
    Ok(())
}

/// Load level data as JSON; `None` uses the default track
pub fn load_level(server: &Mutex<GameServer>, level_json: Option<&str>) -> Result<(), String> {
    let level = match level_json {
        Some(json) => LevelConfig::from_json(json).map_err(|e| e.to_string())?,
        None => LevelConfig::default(),
    };
    let mut server = lock(server)?;
    let level_number = level.level_number;
    server.load_level(level).map_err(|e| e.to_string())?;
    log::info!("Level {} loaded", level_number);
    Ok(())
}

/// Start the race countdown
pub fn start_race(server: &Mutex<GameServer>) -> Result<(), String> {
    let mut server = lock(server)?;
    server.start_race().map_err(|e| {
        log::warn!("Race start rejected: {}", e);
        e.to_string()
    })
}

/// Press or release one control ("forward", "backward", "left", "right", "brake", "nitro")
pub fn set_control(server: &Mutex<GameServer>, name: &str, pressed: bool) -> Result<(), String> {
    let control: Control = name.parse()?;
    let mut server = lock(server)?;
    server.set_control(control, pressed);
    Ok(())
}

/// Perform a simulation tick on the wall clock and return the current state
pub fn tick(server: &Mutex<GameServer>) -> Result<RaceSnapshot, String> {
    let mut server = lock(server)?;
    Ok(server.tick())
}

/// Perform a simulation tick of a fixed length
pub fn advance(server: &Mutex<GameServer>, delta: f32) -> Result<RaceSnapshot, String> {
    let mut server = lock(server)?;
    Ok(server.advance(delta))
}

/// Get current race snapshot without advancing simulation
pub fn get_snapshot(server: &Mutex<GameServer>) -> Result<RaceSnapshot, String> {
    let server = lock(server)?;
    Ok(server.get_snapshot())
}

/// Current snapshot serialized for the renderer
pub fn get_snapshot_json(server: &Mutex<GameServer>) -> Result<String, String> {
    let snapshot = get_snapshot(server)?;
    serde_json::to_string(&snapshot).map_err(|e| e.to_string())
}

/// Get the result of the current or last race
pub fn get_result(server: &Mutex<GameServer>) -> Result<Option<RaceResult>, String> {
    let server = lock(server)?;
    Ok(server.get_result())
}

/// Get server statistics
pub fn get_stats(server: &Mutex<GameServer>) -> Result<ServerStats, String> {
    let server = lock(server)?;
    Ok(server.get_stats())
}

/// Pause the simulation
pub fn pause_race(server: &Mutex<GameServer>) -> Result<(), String> {
    let mut server = lock(server)?;
    server.pause().map_err(|e| e.to_string())?;
    log::info!("Race paused");
    Ok(())
}

/// Resume the simulation
pub fn resume_race(server: &Mutex<GameServer>) -> Result<(), String> {
    let mut server = lock(server)?;
    server.resume();
    log::info!("Race resumed");
    Ok(())
}

/// Retry from the crash screen
pub fn retry_race(server: &Mutex<GameServer>) -> Result<(), String> {
    let mut server = lock(server)?;
    server.retry().map_err(|e| e.to_string())
}

/// Reset to idle state
pub fn reset_race(server: &Mutex<GameServer>) -> Result<(), String> {
    let mut server = lock(server)?;
    server.reset();
    Ok(())
}
