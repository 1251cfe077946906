//! Timer - Coarse phase timers with generation tokens
//!
//! Countdown and recovery timers tick on the simulation clock. Every phase
//! transition calls [`PhaseTimers::invalidate`], which drops pending timers
//! and bumps the generation so that a handle fired earlier in the same batch
//! is recognised as stale and never applied.

use serde::{Deserialize, Serialize};

use crate::game_server::error::RaceError;

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// One second of the 3-2-1 countdown
    CountdownTick,
    /// Pause between "GO" and the race taking input
    Settle,
    /// Results shown before leaving the race
    FinishDisplay,
    /// One second of the crash retry window
    CrashTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle {
    pub kind: TimerKind,
    id: u64,
    generation: u64,
}

/// A timer that came due, and by how much it overshot its deadline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredTimer {
    pub handle: TimerHandle,
    pub overshoot: f32,
}

#[derive(Debug, Clone)]
struct PendingTimer {
    handle: TimerHandle,
    remaining: f32,
}

#[derive(Debug, Clone, Default)]
pub struct PhaseTimers {
    generation: u64,
    next_id: u64,
    pending: Vec<PendingTimer>,
}

impl PhaseTimers {
    /// Absorbs f32 drift from summing frame deltas
    const EPSILON: f32 = 1e-4;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TimerKind, delay: f32) -> TimerHandle {
        let handle = TimerHandle {
            kind,
            id: self.next_id,
            generation: self.generation,
        };
        self.next_id += 1;
        self.pending.push(PendingTimer {
            handle,
            remaining: delay.max(0.0),
        });
        log::debug!("scheduled {:?} timer #{} in {:.2}s", kind, handle.id, delay);
        handle
    }

    /// Cancel everything outstanding; handles already handed out become stale
    pub fn invalidate(&mut self) {
        self.generation += 1;
        self.pending.clear();
    }

    /// Run the clock forward and return due timers, earliest deadline first
    pub fn advance(&mut self, delta: f32) -> Vec<FiredTimer> {
        let mut fired = Vec::new();
        self.pending.retain_mut(|timer| {
            timer.remaining -= delta;
            if timer.remaining <= Self::EPSILON {
                fired.push(FiredTimer {
                    handle: timer.handle,
                    overshoot: (-timer.remaining).max(0.0),
                });
                false
            } else {
                true
            }
        });
        fired.sort_by(|a, b| b.overshoot.total_cmp(&a.overshoot));
        fired
    }

    /// Reject handles issued before the last invalidation
    pub fn validate(&self, handle: &TimerHandle) -> Result<(), RaceError> {
        if handle.generation == self.generation {
            Ok(())
        } else {
            Err(RaceError::StaleTimer { kind: handle.kind })
        }
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.pending.iter().any(|t| t.handle.kind == kind)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_when_due() {
        let mut timers = PhaseTimers::new();
        timers.schedule(TimerKind::CountdownTick, 1.0);

        for _ in 0..9 {
            assert!(timers.advance(0.1).is_empty());
        }
        let fired = timers.advance(0.1);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].handle.kind, TimerKind::CountdownTick);
        assert!(fired[0].overshoot < 1e-3);
        assert!(timers.advance(5.0).is_empty());
    }

    #[test]
    fn overshoot_is_reported() {
        let mut timers = PhaseTimers::new();
        timers.schedule(TimerKind::Settle, 0.6);
        let fired = timers.advance(1.0);
        assert!((fired[0].overshoot - 0.4).abs() < 1e-5);
    }

    #[test]
    fn earliest_deadline_comes_first() {
        let mut timers = PhaseTimers::new();
        timers.schedule(TimerKind::CrashTick, 0.5);
        timers.schedule(TimerKind::Settle, 0.2);
        let fired = timers.advance(1.0);
        let kinds: Vec<_> = fired.iter().map(|f| f.handle.kind).collect();
        assert_eq!(kinds, vec![TimerKind::Settle, TimerKind::CrashTick]);
    }

    #[test]
    fn invalidation_cancels_and_marks_stale() {
        let mut timers = PhaseTimers::new();
        let handle = timers.schedule(TimerKind::FinishDisplay, 1.5);
        assert!(timers.validate(&handle).is_ok());
        assert!(timers.is_pending(TimerKind::FinishDisplay));

        timers.invalidate();
        assert_eq!(timers.pending_count(), 0);
        assert_eq!(
            timers.validate(&handle),
            Err(RaceError::StaleTimer {
                kind: TimerKind::FinishDisplay
            })
        );
        assert!(timers.advance(10.0).is_empty());
    }
}
