//! Grains: crystallised, bounded ternary compressions of phantom candidates,
//! and the router that serves them (spec.md §4.4, §4.5).

pub mod pipeline;
pub mod router;
pub mod store;
pub mod ternary;
pub mod types;
pub mod validator;

pub use pipeline::{CrystallisationCandidate, CrystallisationPipeline};
pub use router::{route_for_confidence, GrainRouter, RouteLayer, ScoredGrain};
pub use store::GrainStore;
pub use ternary::{ternary_crush, CrushResult, PointerMap, TernaryDelta};
pub use types::{generate_grain_id, Grain};
pub use validator::{validate, GateResult, ValidationReport};
