//! Default constants for tunables named in spec.md §3 and §6.
//!
//! All of these are overridable via [`crate::config::Config`].

/// Consecutive cycles a phantom must stay `persistent` before it locks.
pub const LOCK_CYCLES: u32 = 50;

/// Multiplicative growth applied to a pattern's stability on reinforcement.
pub const STABILITY_GROWTH: f64 = 2.0;

/// Weight below which a resonance entry is pruned at a turn boundary.
pub const CLEANUP_THRESHOLD: f64 = 1e-3;

/// Turns between background metabolism cycles.
pub const BACKGROUND_INTERVAL: u64 = 100;

/// Initial stability assigned to a freshly recorded resonance pattern.
pub const DEFAULT_INITIAL_STABILITY: f64 = 3.0;

/// Hit count at which a resonance pattern becomes a promotion candidate.
///
/// Open Question 1 in spec.md §9: source thresholds vary (1, 5, 10); we take
/// 3 as the default, matching the majority of the source's own tests, and
/// keep it configurable.
pub const PROMOTION_HIT_COUNT: u32 = 3;

/// Spacing-sensitivity coefficient `k` in `S_new = S * growth * (1 + k*(1 - w))`.
pub const SPACING_SENSITIVITY_K: f64 = 1.0;

/// Confidence history window kept per phantom (ring-limited).
pub const PHANTOM_HISTORY_LIMIT: usize = 20;

/// Minimum confidence-history length for `persistent` promotion.
pub const PERSISTENT_HISTORY_MIN_LEN: usize = 5;

/// Minimum mean confidence for `persistent` promotion.
pub const PERSISTENT_MEAN_MIN: f64 = 0.75;

/// Sicherman "least resistance" gate: minimum mean confidence.
pub const SICHERMAN_RESISTANCE_MEAN_MIN: f64 = 0.91;

/// Sicherman "independence" gate: maximum confidence variance.
pub const SICHERMAN_INDEPENDENCE_VARIANCE_MAX: f64 = 0.02;

/// Sicherman "independence" gate for a single observation: minimum confidence.
pub const SICHERMAN_INDEPENDENCE_SINGLE_MIN: f64 = 0.90;

/// `log2(3)`, the per-position weight of a ternary digit.
pub const TERNARY_BIT_WEIGHT: f64 = 1.584_962_500_721_156;

/// Per-category caps applied when ranking extracted ternary tokens.
pub const TERNARY_POSITIVE_CAP: usize = 3;
pub const TERNARY_NEGATIVE_CAP: usize = 2;
pub const TERNARY_VOID_CAP: usize = 2;

/// Maximum token length kept from ternary-crush extraction.
pub const TERNARY_TOKEN_MAX_LEN: usize = 30;

/// Grain router confidence thresholds (spec.md §4.5).
pub const ROUTE_LAYER0_MIN_CONFIDENCE: f64 = 0.95;
pub const ROUTE_LAYER1_MIN_CONFIDENCE: f64 = 0.85;
pub const ROUTE_LAYER2_MIN_CONFIDENCE: f64 = 0.75;

/// Bonus applied to a grain's search score when it carries any derivations.
pub const ROUTE_DERIVATION_BONUS: f64 = 0.05;

/// Fallback per-layer confidence thresholds (spec.md §4.7), used when the
/// triage decision does not name one explicitly.
pub const FALLBACK_THRESHOLD_GRAIN: f64 = 0.90;
pub const FALLBACK_THRESHOLD_CARTRIDGE: f64 = 0.70;
pub const FALLBACK_THRESHOLD_BITNET: f64 = 0.75;
pub const FALLBACK_THRESHOLD_SPECIALIST: f64 = 0.65;
pub const FALLBACK_THRESHOLD_LLM: f64 = 0.0;

/// Sentinel layer name that ends the cascade cleanly.
pub const ESCALATE_SENTINEL: &str = "ESCALATE";

/// Default diagnostics ring buffer capacity.
pub const DEFAULT_FEED_CAPACITY: usize = 10_000;

/// Default spotlight query TTL, in seconds (spec.md §5: "default 1 h").
pub const DEFAULT_SPOTLIGHT_TTL_SECS: i64 = 3600;

/// Recommended soft per-layer timeout for grain/cartridge engines, in
/// milliseconds (spec.md §5).
pub const DEFAULT_LAYER_TIMEOUT_MS: u64 = 200;
