// Core algorithm exports
pub mod extract;
pub mod filters;
pub mod names;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod scoring;
pub mod solver;

pub use extract::{ColumnMap, ExtractError, Extracted, Extractor, ExtractorConfig};
pub use filters::final_preferences;
pub use names::{correct, normalize, FuzzyConfig, NameMatcher, Scorer, Similarity, TieBreak};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, Prepared};
pub use reconcile::{only_in_preferences, review_entries};
pub use report::unpaired_students;
pub use scoring::{edge_weight, rank_score};
pub use solver::{solve_pairing, CancelToken, SolveError, Solver, SolverConfig, TimeoutPolicy};
