//! Phantom candidate tracking: none → transient → persistent → locked
//! (spec.md §3, §4.3).

use crate::cartridge::store::write_atomic;
use crate::constants::{LOCK_CYCLES, PERSISTENT_HISTORY_MIN_LEN, PERSISTENT_MEAN_MIN, PHANTOM_HISTORY_LIMIT};
use crate::error::Result;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Phantom lifecycle state. Ordered by maturity; never regresses
/// (spec.md §4.3: "locked is terminal").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhantomStatus {
    None,
    Transient,
    Persistent,
    Locked,
}

/// A candidate fact tracked for possible crystallisation into a grain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhantomCandidate {
    pub key: String,
    pub status: PhantomStatus,
    pub confidence_history: Vec<f64>,
    pub consecutive_persistent_cycles: u32,
    /// Hits recorded in the current, not-yet-advanced cycle.
    pub hit_count: u32,
    /// Hit counts of past cycles, most recent last, ring-limited to
    /// [`PHANTOM_HISTORY_LIMIT`] (spec.md §4.3: per-cycle hit snapshot).
    pub cycle_history: Vec<u32>,
    /// Fraction of recorded cycles in `cycle_history` with at least one hit.
    pub cycle_consistency: f64,
    /// Terms from the most recent query that produced a hit, kept for
    /// diagnostics (spec.md §4.3's `record_hit(key, query_terms, confidence)`).
    pub last_query_terms: Vec<String>,
}

impl PhantomCandidate {
    fn new(key: String) -> Self {
        Self {
            key,
            status: PhantomStatus::None,
            confidence_history: Vec::new(),
            consecutive_persistent_cycles: 0,
            hit_count: 0,
            cycle_history: Vec::new(),
            cycle_consistency: 0.0,
            last_query_terms: Vec::new(),
        }
    }

    fn mean_confidence(&self) -> f64 {
        if self.confidence_history.is_empty() {
            0.0
        } else {
            self.confidence_history.iter().sum::<f64>() / self.confidence_history.len() as f64
        }
    }

    fn push_confidence(&mut self, confidence: f64) {
        self.confidence_history.push(confidence);
        if self.confidence_history.len() > PHANTOM_HISTORY_LIMIT {
            self.confidence_history.remove(0);
        }
    }

    fn push_cycle_history(&mut self, hits: u32) {
        self.cycle_history.push(hits);
        if self.cycle_history.len() > PHANTOM_HISTORY_LIMIT {
            self.cycle_history.remove(0);
        }
        let nonzero = self.cycle_history.iter().filter(|&&h| h > 0).count();
        self.cycle_consistency = nonzero as f64 / self.cycle_history.len() as f64;
    }

    fn recompute_status(&mut self) {
        if self.status == PhantomStatus::Locked {
            return;
        }
        if self.confidence_history.len() >= PERSISTENT_HISTORY_MIN_LEN
            && self.mean_confidence() >= PERSISTENT_MEAN_MIN
        {
            self.status = PhantomStatus::Persistent;
        } else if !self.confidence_history.is_empty() {
            self.status = PhantomStatus::Transient;
        }
    }
}

/// Registry of phantom candidates keyed by an opaque string (typically a
/// cartridge/fact key or a pattern hash).
pub struct PhantomRegistry {
    candidates: RwLock<HashMap<String, PhantomCandidate>>,
}

impl Default for PhantomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PhantomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            candidates: RwLock::new(HashMap::new()),
        }
    }

    /// Record a hit with the query terms that produced it and an observed
    /// confidence. Creates the candidate on first sight (status `none` →
    /// `transient`) and bumps the current cycle's hit count.
    pub fn record_hit(&self, key: &str, query_terms: &[String], confidence: f64) -> PhantomStatus {
        let mut candidates = self.candidates.write();
        let entry = candidates
            .entry(key.to_string())
            .or_insert_with(|| PhantomCandidate::new(key.to_string()));
        entry.hit_count += 1;
        entry.last_query_terms = query_terms.to_vec();
        entry.push_confidence(confidence);
        entry.recompute_status();
        entry.status
    }

    /// Advance one cycle: snapshot each candidate's current hit count into
    /// its cycle history, reset the counter, and run the persistent/locked
    /// promotion rules. Candidates currently `persistent` accrue a
    /// consecutive-cycle count; reaching [`LOCK_CYCLES`] promotes to
    /// `locked`, which is terminal. Candidates that drop out of `persistent`
    /// have their streak reset, but never regress below their last status.
    pub fn advance_cycle(&self) {
        let mut candidates = self.candidates.write();
        for candidate in candidates.values_mut() {
            candidate.push_cycle_history(candidate.hit_count);
            candidate.hit_count = 0;

            match candidate.status {
                PhantomStatus::Persistent => {
                    candidate.consecutive_persistent_cycles += 1;
                    if candidate.consecutive_persistent_cycles >= LOCK_CYCLES {
                        candidate.status = PhantomStatus::Locked;
                        debug!(key = %candidate.key, "phantom locked");
                    }
                }
                PhantomStatus::Locked => {}
                PhantomStatus::None | PhantomStatus::Transient => {
                    candidate.consecutive_persistent_cycles = 0;
                }
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<PhantomCandidate> {
        self.candidates.read().get(key).cloned()
    }

    #[must_use]
    pub fn get_locked_phantoms(&self) -> Vec<PhantomCandidate> {
        self.candidates
            .read()
            .values()
            .filter(|c| c.status == PhantomStatus::Locked)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn get_persistent_phantoms(&self) -> Vec<PhantomCandidate> {
        self.candidates
            .read()
            .values()
            .filter(|c| c.status == PhantomStatus::Persistent)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<PhantomCandidate> {
        self.candidates.read().values().cloned().collect()
    }

    /// Replace the registry's contents with `candidates` (e.g. restoring a
    /// snapshot taken earlier in a test or a background job).
    pub fn restore(&self, candidates: Vec<PhantomCandidate>) {
        let mut guard = self.candidates.write();
        guard.clear();
        for c in candidates {
            guard.insert(c.key.clone(), c);
        }
    }

    /// Persist every candidate to `path` as JSON, atomically.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&self.snapshot())?;
        write_atomic(path.as_ref(), &bytes)
    }

    /// Load a registry previously written by [`Self::save`]. A missing file
    /// is treated as an empty registry, matching a fresh-install startup.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let registry = Self::new();
        if !path.exists() {
            return Ok(registry);
        }
        let bytes = fs::read(path)?;
        let candidates: Vec<PhantomCandidate> = serde_json::from_slice(&bytes)?;
        registry.restore(candidates);
        Ok(registry)
    }
}
