//! Core library for the reflex-cache knowledge-grounding service: cartridge
//! storage, resonance-weighted pattern tracking, phantom candidate
//! promotion, grain crystallisation and routing, the query orchestrator's
//! inference cascade, the heartbeat/metabolism background loop, and the
//! per-query epistemic spotlight.
//!
//! ```no_run
//! use reflex_core::cartridge::{Annotation, CartridgeStore};
//! use reflex_core::types::EpistemicLevel;
//!
//! let store = CartridgeStore::create("/tmp/cartridges", "geography");
//! store.add_fact(
//!     "Mount Everest is the tallest mountain above sea level",
//!     Annotation::new(0, 0.98, EpistemicLevel::L0Empirical),
//! ).unwrap();
//! let hits = store.query(&["everest".to_string()], true);
//! assert_eq!(hits.len(), 1);
//! ```

pub mod cartridge;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod grain;
pub mod heartbeat;
pub mod orchestrator;
pub mod phantom;
pub mod resonance;
pub mod scheduler;
pub mod spotlight;
pub mod types;

pub use error::{Error, Result};
