//! Sicherman validation gates for crystallisation (spec.md §4.4, grounded on
//! `original_source/src/axiom_validator.py`).

use crate::constants::{
    SICHERMAN_INDEPENDENCE_SINGLE_MIN, SICHERMAN_INDEPENDENCE_VARIANCE_MAX,
    SICHERMAN_RESISTANCE_MEAN_MIN,
};
use serde::{Deserialize, Serialize};

/// Result of one named gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateResult {
    pub gate: &'static str,
    pub passed: bool,
    pub reason: String,
}

/// Outcome of running all gates against a candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub gates: Vec<GateResult>,
}

impl ValidationReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.gates.iter().all(|g| g.passed)
    }

    #[must_use]
    pub fn failure_reasons(&self) -> Vec<String> {
        self.gates
            .iter()
            .filter(|g| !g.passed)
            .map(|g| format!("{}: {}", g.gate, g.reason))
            .collect()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Gate 1: the fact must actually resolve (non-empty confidence history).
#[must_use]
pub fn gate_persistence(confidence_history: &[f64]) -> GateResult {
    let passed = !confidence_history.is_empty();
    GateResult {
        gate: "persistence",
        passed,
        reason: if passed {
            "fact has a resolved confidence history".to_string()
        } else {
            "fact has no confidence history".to_string()
        },
    }
}

/// Gate 2: "least resistance" — mean confidence must exceed the threshold.
#[must_use]
pub fn gate_least_resistance(confidence_history: &[f64]) -> GateResult {
    let m = mean(confidence_history);
    let passed = m > SICHERMAN_RESISTANCE_MEAN_MIN;
    GateResult {
        gate: "least_resistance",
        passed,
        reason: format!(
            "mean confidence {m:.4} {} threshold {SICHERMAN_RESISTANCE_MEAN_MIN}",
            if passed { ">" } else { "<=" }
        ),
    }
}

/// Gate 3: "independence" — low variance across observations, or a single
/// observation above a higher single-sample bar.
#[must_use]
pub fn gate_independence(confidence_history: &[f64]) -> GateResult {
    if confidence_history.len() == 1 {
        let c = confidence_history[0];
        let passed = c > SICHERMAN_INDEPENDENCE_SINGLE_MIN;
        return GateResult {
            gate: "independence",
            passed,
            reason: format!(
                "single observation {c:.4} {} threshold {SICHERMAN_INDEPENDENCE_SINGLE_MIN}",
                if passed { ">" } else { "<=" }
            ),
        };
    }
    let v = variance(confidence_history);
    let passed = v < SICHERMAN_INDEPENDENCE_VARIANCE_MAX;
    GateResult {
        gate: "independence",
        passed,
        reason: format!(
            "variance {v:.6} {} threshold {SICHERMAN_INDEPENDENCE_VARIANCE_MAX}",
            if passed { "<" } else { ">=" }
        ),
    }
}

/// Run all three gates over a candidate's confidence history.
#[must_use]
pub fn validate(confidence_history: &[f64]) -> ValidationReport {
    ValidationReport {
        gates: vec![
            gate_persistence(confidence_history),
            gate_least_resistance(confidence_history),
            gate_independence(confidence_history),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history_fails_persistence() {
        let report = validate(&[]);
        assert!(!report.passed());
        assert!(!report.gates[0].passed);
    }

    #[test]
    fn low_mean_confidence_fails_least_resistance() {
        let report = validate(&[0.5, 0.6, 0.55]);
        assert!(!report.passed());
        let gate = report.gates.iter().find(|g| g.gate == "least_resistance").unwrap();
        assert!(!gate.passed);
    }

    #[test]
    fn high_variance_fails_independence() {
        let report = validate(&[0.95, 0.99, 0.5, 0.98]);
        let gate = report.gates.iter().find(|g| g.gate == "independence").unwrap();
        assert!(!gate.passed);
    }

    #[test]
    fn single_high_confidence_observation_passes_independence() {
        let gate = gate_independence(&[0.95]);
        assert!(gate.passed);
    }

    #[test]
    fn single_borderline_observation_fails_independence() {
        let gate = gate_independence(&[0.90]);
        assert!(!gate.passed);
    }

    #[test]
    fn all_gates_pass_for_tight_high_confidence_history() {
        let report = validate(&[0.95, 0.96, 0.94, 0.95, 0.96]);
        assert!(report.passed());
    }

    #[test]
    fn failure_reasons_only_include_failed_gates() {
        let report = validate(&[0.5]);
        let reasons = report.failure_reasons();
        assert!(reasons.iter().any(|r| r.starts_with("least_resistance")));
        assert!(!reasons.iter().any(|r| r.starts_with("persistence")));
    }
}
