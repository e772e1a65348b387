//! The `Grain` record itself, grounded on `original_source/src/ternary_crush.py`'s
//! `_generate_grain_id` and `grain_router.py`'s expected on-disk shape.

use super::ternary::{PointerMap, TernaryDelta};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A crystallised grain: the compressed, routable unit produced by the
/// crystallisation pipeline (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grain {
    pub grain_id: String,
    pub cartridge: String,
    pub fact_id: u64,
    pub confidence: f64,
    pub delta: TernaryDelta,
    pub pointer_map: PointerMap,
    pub weight: f64,
    pub created_at: String,
}

/// Deterministic grain id: `sg_` + first 8 hex chars of
/// `sha256("{cartridge}:{fact_id}")`.
#[must_use]
pub fn generate_grain_id(cartridge: &str, fact_id: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{cartridge}:{fact_id}").as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sg_{}", &hex[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grain_id_is_deterministic() {
        assert_eq!(
            generate_grain_id("geography", 42),
            generate_grain_id("geography", 42)
        );
    }

    #[test]
    fn grain_id_differs_by_cartridge_or_fact() {
        assert_ne!(
            generate_grain_id("geography", 42),
            generate_grain_id("chemistry", 42)
        );
        assert_ne!(
            generate_grain_id("geography", 42),
            generate_grain_id("geography", 43)
        );
    }

    #[test]
    fn grain_id_has_expected_shape() {
        let id = generate_grain_id("geography", 1);
        assert!(id.starts_with("sg_"));
        assert_eq!(id.len(), 11);
    }
}
