//! Fact and annotation records (spec.md §3).

use crate::types::{Derivation, EpistemicLevel, FactStatus, TemporalValidity};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An opaque fact record. Immutable once written; `access_count` is the only
/// field mutated post-write, via the cartridge store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Monotonically assigned id, unique within the owning cartridge.
    pub id: u64,
    /// Fact text.
    pub content: String,
    /// sha-256 hex digest of `content`, used for exact dedup.
    pub content_hash: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Access counter, incremented by `CartridgeStore::query` when logging is enabled.
    pub access_count: u64,
    /// Active/retired status.
    pub status: FactStatus,
}

impl Fact {
    /// Compute the sha-256 hex digest of fact text, used both for dedup and
    /// as the stored `content_hash`.
    #[must_use]
    pub fn hash_content(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex_digest(&hasher.finalize())
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

/// One annotation per fact (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Fact id this annotation belongs to (aligns `facts.db` and `annotations.jsonl`).
    pub fact_id: u64,
    /// Confidence in \[0,1\].
    pub confidence: f64,
    /// Source citations.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Epistemic level tag.
    pub epistemic_level: EpistemicLevel,
    /// Structured derivations.
    #[serde(default)]
    pub derivations: Vec<Derivation>,
    /// Free-form relationships to other facts/concepts.
    #[serde(default)]
    pub relationships: Vec<String>,
    /// Context domain this fact belongs to.
    #[serde(default)]
    pub domain: String,
    /// Keyword set this fact applies to, used to seed the keyword index.
    #[serde(default)]
    pub applies_to: Vec<String>,
    /// Optional temporal validity interval.
    #[serde(default)]
    pub temporal_validity: Option<TemporalValidity>,
}

impl Annotation {
    /// Construct a minimal annotation with a given confidence and level,
    /// leaving the rest at their empty defaults.
    #[must_use]
    pub fn new(fact_id: u64, confidence: f64, epistemic_level: EpistemicLevel) -> Self {
        Self {
            fact_id,
            confidence,
            sources: Vec::new(),
            epistemic_level,
            derivations: Vec::new(),
            relationships: Vec::new(),
            domain: String::new(),
            applies_to: Vec::new(),
            temporal_validity: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_and_distinct() {
        let a = Fact::hash_content("ATP is adenosine triphosphate");
        let b = Fact::hash_content("ATP is adenosine triphosphate");
        let c = Fact::hash_content("Something else entirely");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }
}
