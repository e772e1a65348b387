//! Cartridge store: persistent fact + annotation + keyword index, bulk
//! retrieval (spec.md §4.1).

pub mod fact;
pub mod index;
pub mod manifest;
pub mod store;

pub use fact::{Annotation, Fact};
pub use manifest::{GrainInventoryEntry, Manifest, SplitStatus};
pub use store::CartridgeStore;
