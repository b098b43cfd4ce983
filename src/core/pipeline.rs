use serde::Deserialize;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::core::{
    extract::{ExtractError, Extracted, Extractor, ExtractorConfig},
    filters::final_preferences,
    names::{normalize, FuzzyConfig, NameMatcher},
    reconcile::{only_in_preferences, review_entries},
    report::unpaired_students,
    solver::{CancelToken, SolveError, Solver, SolverConfig},
};
use crate::models::{PairingOutcome, PreferenceMap, ReviewEntry, RosterSet, SurveyRow};

/// Errors from a pipeline run, tagged with the stage that failed
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Optimisation failed: {0}")]
    Solve(#[from] SolveError),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Extract(_) => "extract",
            PipelineError::Solve(_) => "solve",
        }
    }
}

/// Settings for every stage
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub fuzzy: FuzzyConfig,
    #[serde(default)]
    pub solver: SolverConfig,
}

/// Extracted and reconciled input, ready for review or optimisation
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub preferences: PreferenceMap,
    pub roster: RosterSet,
    pub not_attending: BTreeSet<String>,
    pub only_in_preferences: BTreeSet<String>,
    pub review: Vec<ReviewEntry>,
}

/// Runs extraction, reconciliation, filtering, solving and reporting in order
///
/// # Pipeline Stages
/// 1. Normalize rows and correct typed choices against the roster
/// 2. Find names that only appear in preferences
/// 3. Build the final universe for the chosen exclusion policy
/// 4. Solve the maximum-weight pairing
/// 5. Report who is left unpaired
#[derive(Debug, Clone)]
pub struct Pipeline {
    extractor: Extractor,
    matcher: NameMatcher,
    solver: Solver,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        let matcher = NameMatcher::new(&config.fuzzy);
        Self::with_matcher(config, matcher)
    }

    /// Build a pipeline around a custom name matcher
    pub fn with_matcher(config: PipelineConfig, matcher: NameMatcher) -> Result<Self, PipelineError> {
        Ok(Self {
            extractor: Extractor::new(config.extractor, matcher.clone())?,
            matcher,
            solver: Solver::new(config.solver),
        })
    }

    /// Extract preferences and find unresolved names
    pub fn prepare<S: AsRef<str>>(
        &self,
        rows: &[SurveyRow],
        not_attending: &[S],
    ) -> Result<Prepared, PipelineError> {
        let Extracted { preferences, roster } = self.extractor.extract(rows)?;

        let not_attending: BTreeSet<String> = not_attending
            .iter()
            .map(|name| normalize(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect();

        let unresolved = only_in_preferences(&preferences, &roster, &not_attending);
        let review = review_entries(&preferences, &roster, &unresolved, &self.matcher);

        if unresolved.is_empty() {
            tracing::info!("All {} referenced students are accounted for", roster.len());
        } else {
            tracing::info!(
                "{} names appear only in preferences and need review",
                unresolved.len()
            );
        }

        Ok(Prepared {
            preferences,
            roster,
            not_attending,
            only_in_preferences: unresolved,
            review,
        })
    }

    /// Filter, solve and report for prepared input
    pub fn optimise(&self, prepared: &Prepared, exclude: bool) -> Result<PairingOutcome, PipelineError> {
        self.optimise_with_cancel(prepared, exclude, &CancelToken::new())
    }

    pub fn optimise_with_cancel(
        &self,
        prepared: &Prepared,
        exclude: bool,
        cancel: &CancelToken,
    ) -> Result<PairingOutcome, PipelineError> {
        let universe = final_preferences(
            &prepared.preferences,
            &prepared.only_in_preferences,
            &prepared.not_attending,
            exclude,
        );

        let solution = self.solver.solve_with_cancel(&universe, cancel)?;
        let unpaired = unpaired_students(&universe, &solution.matching);

        Ok(PairingOutcome {
            pairs: solution.matching.pairs,
            unpaired,
            only_in_preferences: prepared.only_in_preferences.iter().cloned().collect(),
            total_weight: solution.total_weight,
            status: solution.status,
        })
    }

    /// Full run from rows to pairs
    pub fn run<S: AsRef<str>>(
        &self,
        rows: &[SurveyRow],
        not_attending: &[S],
        exclude: bool,
    ) -> Result<PairingOutcome, PipelineError> {
        let prepared = self.prepare(rows, not_attending)?;
        self.optimise(&prepared, exclude)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        let matcher = NameMatcher::default();
        Self {
            extractor: Extractor::with_defaults(matcher.clone()),
            matcher,
            solver: Solver::default(),
        }
    }
}
