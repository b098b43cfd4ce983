use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Maximum number of ranked choices a student can submit
pub const MAX_CHOICES: usize = 5;

/// Canonical student name -> ranked partner choices (index 0 = strongest)
pub type PreferenceMap = BTreeMap<String, Vec<String>>;

/// Canonical names of every student who submitted a row
pub type RosterSet = BTreeSet<String>;

/// One submitted survey row: column header -> cell text
///
/// Cells the spreadsheet left blank may arrive as `null`.
pub type SurveyRow = BTreeMap<String, Option<String>>;

/// Two students placed together
///
/// Names are stored in lexicographic order so a pair has one representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    pub first: String,
    pub second: String,
}

impl Pair {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.first == name || self.second == name
    }

    /// The other member of the pair, if `name` is in it
    pub fn partner_of(&self, name: &str) -> Option<&str> {
        if self.first == name {
            Some(&self.second)
        } else if self.second == name {
            Some(&self.first)
        } else {
            None
        }
    }
}

/// Disjoint pairs, sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matching {
    pub pairs: Vec<Pair>,
}

impl Matching {
    pub fn new(mut pairs: Vec<Pair>) -> Self {
        pairs.sort();
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Every name that appears in some pair
    pub fn paired_names(&self) -> BTreeSet<&str> {
        self.pairs
            .iter()
            .flat_map(|p| [p.first.as_str(), p.second.as_str()])
            .collect()
    }

    pub fn partner_of(&self, name: &str) -> Option<&str> {
        self.pairs.iter().find_map(|p| p.partner_of(name))
    }
}

/// Whether a solve ran to proven optimality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    /// Time limit hit; the matching is feasible but not proven optimal
    BestEffort,
}

/// Solver output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub matching: Matching,
    #[serde(rename = "totalWeight")]
    pub total_weight: f64,
    pub status: SolveStatus,
}

impl Solution {
    pub fn empty() -> Self {
        Self {
            matching: Matching::default(),
            total_weight: 0.0,
            status: SolveStatus::Optimal,
        }
    }
}

/// A name that only appears in preference lists, with context for a reviewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub name: String,
    #[serde(rename = "referencedBy")]
    pub referenced_by: Vec<String>,
    #[serde(rename = "closestMatch")]
    pub closest_match: Option<String>,
    #[serde(rename = "closestScore")]
    pub closest_score: Option<f64>,
}

/// Final result of a pairing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingOutcome {
    pub pairs: Vec<Pair>,
    pub unpaired: BTreeSet<String>,
    #[serde(rename = "onlyInPreferences")]
    pub only_in_preferences: Vec<String>,
    #[serde(rename = "totalWeight")]
    pub total_weight: f64,
    pub status: SolveStatus,
}
