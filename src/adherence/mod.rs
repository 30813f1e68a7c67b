//! Adherence analysis: possession timelines, refill gaps, MPR projection and
//! per-drug risk flags from a patient's dispense history.

pub mod drug_class;
pub mod engine;
pub mod flags;
pub mod gaps;
pub mod mpr;
pub mod settings;
pub mod timeline;
pub mod types;
pub mod validation;

pub use drug_class::{DrugClassSpec, DrugClassTable, UNCLASSIFIED};
pub use engine::AdherenceEngine;
pub use settings::*;
pub use types::*;
