//! Cartridge manifest (spec.md §3, §4.1, §6).

use serde::{Deserialize, Serialize};

/// Split status of a cartridge (tracked for future `analyze_split` background
/// maintenance, spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStatus {
    Unsplit,
    SplitPending,
    Split,
}

impl Default for SplitStatus {
    fn default() -> Self {
        SplitStatus::Unsplit
    }
}

/// Cartridge-level metadata (spec.md §3: "manifest").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub version: u64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub fact_count: u64,
    pub average_confidence: f64,
    #[serde(default)]
    pub split_status: SplitStatus,
    /// grain_id → summary, populated by the crystallisation pipeline
    /// (spec.md §4.4: "update the manifest's `grain_inventory`").
    #[serde(default)]
    pub grain_inventory: std::collections::BTreeMap<String, GrainInventoryEntry>,
}

/// One entry in a manifest's `grain_inventory` map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrainInventoryEntry {
    pub fact_id: u64,
    pub confidence: f64,
    pub weight: f64,
    pub timestamp: String,
}

impl Manifest {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            name: name.into(),
            version: 1,
            created_at: now.clone(),
            updated_at: now,
            domains: Vec::new(),
            tags: Vec::new(),
            fact_count: 0,
            average_confidence: 0.0,
            split_status: SplitStatus::Unsplit,
            grain_inventory: std::collections::BTreeMap::new(),
        }
    }

    /// Recompute `fact_count`/`average_confidence`/`updated_at` from a live
    /// set of confidences, and bump `version`.
    pub fn refresh(&mut self, confidences: &[f64]) {
        self.fact_count = confidences.len() as u64;
        self.average_confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f64>() / confidences.len() as f64
        };
        self.updated_at = chrono::Utc::now().to_rfc3339();
        self.version += 1;
    }
}
