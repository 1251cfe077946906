//! Backend - Session service seam
//!
//! The race queues session requests while simulating; the game server hands
//! them to a [`SessionBackend`] after the frame. Failures are logged and
//! dropped, the race never waits on them.

use serde::{Deserialize, Serialize};

use crate::game_server::error::BackendError;

/// Sent when a race (or retry) starts its countdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStart {
    pub player_id: String,
    pub car_id: String,
    pub level_number: u32,
}

/// Sent when a race finishes or crashes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCompletion {
    pub won: bool,
    pub score: u32,
    pub distance_traveled: f32,
    pub collisions: u32,
    pub nitro_used: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionRequest {
    Start(SessionStart),
    Complete(SessionCompletion),
}

/// Persistence collaborator (player sessions, leaderboard)
pub trait SessionBackend: Send {
    /// Returns the new session's id
    fn create_session(&mut self, request: &SessionStart) -> Result<String, BackendError>;

    fn complete_session(
        &mut self,
        session_id: &str,
        request: &SessionCompletion,
    ) -> Result<(), BackendError>;
}

/// Backend used when no service is configured: logs and hands out local ids
#[derive(Debug, Default)]
pub struct OfflineBackend {
    sessions: u64,
}

impl SessionBackend for OfflineBackend {
    fn create_session(&mut self, request: &SessionStart) -> Result<String, BackendError> {
        self.sessions += 1;
        let id = format!("offline-{}", self.sessions);
        log::info!(
            "Session {} opened for player {} (car {}, level {})",
            id,
            request.player_id,
            request.car_id,
            request.level_number
        );
        Ok(id)
    }

    fn complete_session(
        &mut self,
        session_id: &str,
        request: &SessionCompletion,
    ) -> Result<(), BackendError> {
        log::info!(
            "Session {} closed: won={} score={} distance={:.0}",
            session_id,
            request.won,
            request.score,
            request.distance_traveled
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_backend_numbers_sessions() {
        let mut backend = OfflineBackend::default();
        let start = SessionStart {
            player_id: "p1".into(),
            car_id: "c1".into(),
            level_number: 2,
        };
        assert_eq!(backend.create_session(&start).unwrap(), "offline-1");
        assert_eq!(backend.create_session(&start).unwrap(), "offline-2");

        let done = SessionCompletion {
            won: true,
            score: 100,
            distance_traveled: 2470.0,
            collisions: 0,
            nitro_used: 1,
        };
        assert!(backend.complete_session("offline-2", &done).is_ok());
    }

    #[test]
    fn requests_serialize_with_backend_field_names() {
        let start = SessionStart {
            player_id: "p1".into(),
            car_id: "c9".into(),
            level_number: 3,
        };
        let json = serde_json::to_value(&start).unwrap();
        assert_eq!(json["player_id"], "p1");
        assert_eq!(json["level_number"], 3);
    }
}
