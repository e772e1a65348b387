//! Heartbeat service: the turn counter and pause/resume gate every
//! background and query path runs through (spec.md §4.8, grounded on
//! `original_source/metabolism/heartbeat_service.py`).

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A snapshot taken when the service pauses, so a caller can inspect what
/// turn it stopped at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub turn_number: u64,
}

/// Turn counter plus a reference-counted pause gate (spec.md §9: "RAII-style
/// reference-counted pause/resume guard").
pub struct HeartbeatService {
    turn_number: AtomicU64,
    pause_depth: AtomicUsize,
    checkpoint: RwLock<Option<Checkpoint>>,
    running: AtomicBool,
}

impl Default for HeartbeatService {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatService {
    #[must_use]
    pub fn new() -> Self {
        Self {
            turn_number: AtomicU64::new(0),
            pause_depth: AtomicUsize::new(0),
            checkpoint: RwLock::new(None),
            running: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn turn_number(&self) -> u64 {
        self.turn_number.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Pause the service. Idempotent: if already paused, returns the
    /// existing checkpoint rather than overwriting it.
    pub fn pause(&self) -> Checkpoint {
        if let Some(existing) = self.checkpoint.read().clone() {
            return existing;
        }
        let checkpoint = Checkpoint {
            turn_number: self.turn_number(),
        };
        *self.checkpoint.write() = Some(checkpoint.clone());
        self.running.store(false, Ordering::SeqCst);
        checkpoint
    }

    /// Resume the service. A no-op if already running.
    pub fn resume(&self) {
        if self.is_running() {
            return;
        }
        *self.checkpoint.write() = None;
        self.running.store(true, Ordering::SeqCst);
    }

    /// Run one background cycle if the service is currently running.
    /// Returns `{executed: false}` (via [`StepOutcome::skipped`]) when paused.
    pub fn step(&self, cycle: impl FnOnce() -> serde_json::Value) -> StepOutcome {
        if !self.is_running() {
            return StepOutcome::skipped();
        }
        let result = cycle();
        StepOutcome {
            executed: true,
            result: Some(result),
        }
    }

    /// Advance the turn counter by exactly one and return the new value.
    pub fn advance_turn(&self) -> u64 {
        self.turn_number.fetch_add(1, Ordering::SeqCst) + 1
    }

    #[must_use]
    pub fn get_status(&self) -> HeartbeatStatus {
        HeartbeatStatus {
            turn_number: self.turn_number(),
            is_running: self.is_running(),
            checkpoint: self.checkpoint.read().clone(),
        }
    }

    /// Acquire a reference-counted pause guard: the service stays paused
    /// while at least one guard is outstanding, resuming automatically once
    /// the last one drops.
    #[must_use]
    pub fn pause_guard(self: &Arc<Self>) -> PauseGuard {
        if self.pause_depth.fetch_add(1, Ordering::SeqCst) == 0 {
            self.pause();
        }
        PauseGuard {
            service: Arc::clone(self),
        }
    }
}

/// Outcome of a single [`HeartbeatService::step`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub executed: bool,
    pub result: Option<serde_json::Value>,
}

impl StepOutcome {
    fn skipped() -> Self {
        Self {
            executed: false,
            result: None,
        }
    }
}

/// Current heartbeat status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatStatus {
    pub turn_number: u64,
    pub is_running: bool,
    pub checkpoint: Option<Checkpoint>,
}

/// RAII guard: holding one keeps the heartbeat paused; the last guard
/// dropped resumes it (spec.md §9).
pub struct PauseGuard {
    service: Arc<HeartbeatService>,
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        if self.service.pause_depth.fetch_sub(1, Ordering::SeqCst) == 1 {
            debug!("last pause guard dropped, resuming heartbeat");
            self.service.resume();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_turn_increments_by_exactly_one() {
        let hb = HeartbeatService::new();
        assert_eq!(hb.advance_turn(), 1);
        assert_eq!(hb.advance_turn(), 2);
    }

    #[test]
    fn pause_is_idempotent() {
        let hb = HeartbeatService::new();
        hb.advance_turn();
        let c1 = hb.pause();
        hb.advance_turn();
        let c2 = hb.pause();
        assert_eq!(c1, c2);
    }

    #[test]
    fn resume_is_a_no_op_when_already_running() {
        let hb = HeartbeatService::new();
        assert!(hb.is_running());
        hb.resume();
        assert!(hb.is_running());
    }

    #[test]
    fn step_is_gated_by_running_state() {
        let hb = HeartbeatService::new();
        hb.pause();
        let outcome = hb.step(|| serde_json::json!({"did": "something"}));
        assert!(!outcome.executed);

        hb.resume();
        let outcome = hb.step(|| serde_json::json!({"did": "something"}));
        assert!(outcome.executed);
    }

    #[test]
    fn pause_guard_keeps_paused_until_last_drop() {
        let hb = Arc::new(HeartbeatService::new());
        let g1 = hb.pause_guard();
        let g2 = hb.pause_guard();
        assert!(!hb.is_running());
        drop(g1);
        assert!(!hb.is_running());
        drop(g2);
        assert!(hb.is_running());
    }
}
