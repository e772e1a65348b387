//! Shared types used across cartridge, grain, and spotlight modules.

use serde::{Deserialize, Serialize};

/// The six epistemic layers a spotlight organises facts into (spec.md §3, §4.10).
///
/// Confidence bands below are informational context carried over from
/// `original_source/src/redis_spotlight.py`'s `EpistemicLevel` docstring;
/// the core does not enforce them, only the six ordered lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EpistemicLevel {
    /// L0: verified empirical facts (typically 0.90-1.0 confidence).
    L0Empirical,
    /// L1: axioms / rules (typically 0.85-0.99 confidence).
    L1Axiomatic,
    /// L2: narrative / identity (typically 0.60-0.90 confidence).
    L2Narrative,
    /// L3: heuristic / folk wisdom (typically 0.50-0.80 confidence).
    L3Heuristic,
    /// L4: intent / values / goals (typically 0.40-0.75 confidence).
    L4Intent,
    /// L5: mask / persona (typically 0.30-0.70 confidence).
    L5Mask,
}

impl EpistemicLevel {
    /// All six levels in L0..L5 order.
    pub const ALL: [EpistemicLevel; 6] = [
        EpistemicLevel::L0Empirical,
        EpistemicLevel::L1Axiomatic,
        EpistemicLevel::L2Narrative,
        EpistemicLevel::L3Heuristic,
        EpistemicLevel::L4Intent,
        EpistemicLevel::L5Mask,
    ];

    /// Short key used in persistence and substrate namespacing, e.g. `L0_empirical`.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            EpistemicLevel::L0Empirical => "L0_empirical",
            EpistemicLevel::L1Axiomatic => "L1_axiomatic",
            EpistemicLevel::L2Narrative => "L2_narrative",
            EpistemicLevel::L3Heuristic => "L3_heuristic",
            EpistemicLevel::L4Intent => "L4_intent",
            EpistemicLevel::L5Mask => "L5_mask",
        }
    }
}

/// Fact status (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactStatus {
    Active,
    Retired,
}

impl Default for FactStatus {
    fn default() -> Self {
        FactStatus::Active
    }
}

/// A structured derivation attached to a fact's annotation (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    /// Derivation kind, e.g. `dependency`, `negation`, `independent`, `boundary`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The concept this derivation points at.
    pub target: String,
    /// Optional strength in \[0,1\].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
}

/// Temporal validity interval for a fact (spec.md §3, §6 grammar).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalValidity {
    /// ISO-8601 start, `None` for unbounded past.
    pub start: Option<String>,
    /// ISO-8601 end, `None` for unbounded future.
    pub end: Option<String>,
    /// Whether bounds are approximate (e.g. `~5_years`).
    pub approximate: bool,
}

/// Coupling delta severities, totally ordered PASS < LOW < MEDIUM < HIGH < CRITICAL
/// (spec.md §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Pass,
    Low,
    Medium,
    High,
    Critical,
}
