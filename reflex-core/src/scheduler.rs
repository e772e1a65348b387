//! Metabolism scheduler: decides when a background maintenance cycle should
//! run and dispatches it through the heartbeat (spec.md §4.9, grounded on
//! `original_source/metabolism/metabolism_scheduler.py` and
//! `background_metabolism_cycle.py`).

use crate::constants::BACKGROUND_INTERVAL;
use crate::heartbeat::HeartbeatService;
use crate::phantom::PhantomRegistry;
use crate::resonance::ResonanceWeightStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Maintenance urgency assigned by background triage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenancePriority {
    Low,
    Normal,
    High,
}

/// Which background cycle to run next (spec.md §4.9: "decay is the only
/// handler the core must implement correctly").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleType {
    Decay,
    AnalyzeSplit,
    Routine,
    Daydream,
    Sleep,
}

/// Input to a triage decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundTriageRequest {
    pub current_turn: u64,
    pub priority: MaintenancePriority,
}

/// The triage outcome: which cycle to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundTriageDecision {
    pub cycle: CycleType,
}

/// Default triage: always `decay` (spec.md §4.9). Other cycle types are
/// reachable only by constructing a decision directly — no triage condition
/// selects them yet.
#[must_use]
pub fn background_triage(_request: &BackgroundTriageRequest) -> BackgroundTriageDecision {
    BackgroundTriageDecision {
        cycle: CycleType::Decay,
    }
}

/// Result of one executed background cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundCycleResult {
    pub cycle: CycleType,
    pub turn_number: u64,
    pub detail: String,
}

fn run_background_cycle(
    decision: &BackgroundTriageDecision,
    turn_number: u64,
    resonance: &ResonanceWeightStore,
    phantoms: &PhantomRegistry,
) -> BackgroundCycleResult {
    let detail = match decision.cycle {
        CycleType::Decay => {
            resonance.advance_turn();
            phantoms.advance_cycle();
            "resonance and phantom state advanced one turn".to_string()
        }
        CycleType::AnalyzeSplit => "stub: cartridge split analysis not triggered".to_string(),
        CycleType::Routine => "stub: routine maintenance not triggered".to_string(),
        CycleType::Daydream => "stub: daydream cycle not triggered".to_string(),
        CycleType::Sleep => "stub: sleep cycle not triggered".to_string(),
    };
    BackgroundCycleResult {
        cycle: decision.cycle,
        turn_number,
        detail,
    }
}

/// Schedules and runs background metabolism cycles at a fixed turn
/// interval, forcing the first run (spec.md §4.9: `last_background_turn`
/// initialised to `-background_interval`).
pub struct MetabolismScheduler {
    background_interval: u64,
    last_background_turn: RwLock<i64>,
    heartbeat: Arc<HeartbeatService>,
    resonance: Arc<ResonanceWeightStore>,
    phantoms: Arc<PhantomRegistry>,
}

impl MetabolismScheduler {
    #[must_use]
    pub fn new(
        heartbeat: Arc<HeartbeatService>,
        resonance: Arc<ResonanceWeightStore>,
        phantoms: Arc<PhantomRegistry>,
    ) -> Self {
        Self {
            background_interval: BACKGROUND_INTERVAL,
            last_background_turn: RwLock::new(-(BACKGROUND_INTERVAL as i64)),
            heartbeat,
            resonance,
            phantoms,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.background_interval = interval;
        *self.last_background_turn.write() = -(interval as i64);
        self
    }

    /// Check whether enough turns have elapsed since the last background
    /// run; if so, run one and record the turn.
    pub fn step(&self, current_turn: u64) -> Option<BackgroundCycleResult> {
        let due = current_turn as i64 - *self.last_background_turn.read() >= self.background_interval as i64;
        if !due {
            return None;
        }

        let decision = background_triage(&BackgroundTriageRequest {
            current_turn,
            priority: MaintenancePriority::Normal,
        });

        let outcome = self.heartbeat.step(|| {
            let result = run_background_cycle(&decision, current_turn, &self.resonance, &self.phantoms);
            serde_json::to_value(&result).unwrap_or_default()
        });

        if outcome.executed {
            *self.last_background_turn.write() = current_turn as i64;
            debug!(turn = current_turn, cycle = ?decision.cycle, "background metabolism cycle ran");
            outcome
                .result
                .and_then(|v| serde_json::from_value(v).ok())
        } else {
            None
        }
    }

    #[must_use]
    pub fn get_status(&self) -> SchedulerStatus {
        SchedulerStatus {
            background_interval: self.background_interval,
            last_background_turn: *self.last_background_turn.read(),
        }
    }

    pub fn reset(&self) {
        *self.last_background_turn.write() = -(self.background_interval as i64);
    }
}

/// Scheduler status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub background_interval: u64,
    pub last_background_turn: i64,
}
