// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Matching, Pair, PairingOutcome, PreferenceMap, ReviewEntry, RosterSet, Solution,
    SolveStatus, SurveyRow, MAX_CHOICES,
};
pub use requests::{OptimiseRequest, ReviewRequest};
pub use responses::{ErrorResponse, HealthResponse, OptimiseResponse, ReviewResponse};
