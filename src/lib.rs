//! Camp Pairing - pairs camp participants from ranked preference lists
//!
//! This library provides the resolution and matching pipeline behind the camp
//! pairing service. Free-text names are normalized and fuzzy-corrected against the
//! roster, and a maximum-weight matching then pairs every student it can.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;

// Re-export commonly used types
pub use core::{normalize, solve_pairing, Pipeline, PipelineConfig, PipelineError, Prepared};
pub use models::{Matching, Pair, PairingOutcome, PreferenceMap, RosterSet, SolveStatus, SurveyRow};
