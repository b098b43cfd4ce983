use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use strsim::{jaro_winkler, normalized_levenshtein};

use crate::models::RosterSet;

/// Default similarity a candidate must exceed to replace a typed name
pub const DEFAULT_THRESHOLD: f64 = 80.0;

/// Canonicalize free-text name entry
///
/// Collapses whitespace runs to single spaces, trims, and title-cases every
/// alphabetic run (`o'brien` -> `O'Brien`). Idempotent.
pub fn normalize(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    let mut prev_alpha = false;

    for c in collapsed.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                let mut upper = c.to_uppercase();
                if let Some(first) = upper.next() {
                    out.push(first);
                }
                for rest in upper {
                    out.extend(rest.to_lowercase());
                }
            }
        } else {
            out.push(c);
        }
        // Case mapping can emit combining marks, so track what was written
        prev_alpha = out.chars().next_back().map_or(false, char::is_alphabetic);
    }

    out
}

/// Pluggable string similarity on a 0-100 scale
pub trait Similarity: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

impl<F> Similarity for F
where
    F: Fn(&str, &str) -> f64 + Send + Sync,
{
    fn score(&self, a: &str, b: &str) -> f64 {
        self(a, b)
    }
}

/// Built-in similarity algorithms, selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    /// Normalized Levenshtein
    Ratio,
    /// Ratio over whitespace tokens sorted alphabetically
    TokenSortRatio,
    JaroWinkler,
    /// Best of `Ratio` and a slightly discounted `TokenSortRatio`
    #[default]
    WeightedRatio,
}

impl Similarity for Scorer {
    fn score(&self, a: &str, b: &str) -> f64 {
        match self {
            Scorer::Ratio => ratio(a, b),
            Scorer::TokenSortRatio => token_sort_ratio(a, b),
            Scorer::JaroWinkler => jaro_winkler(a, b) * 100.0,
            Scorer::WeightedRatio => ratio(a, b).max(token_sort_ratio(a, b) * 0.95),
        }
    }
}

fn ratio(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b) * 100.0
}

fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// How to pick between candidates that share the top score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Lexicographically smallest candidate wins
    #[default]
    Lexicographic,
    /// Treat a tie as unresolved and keep the typed name
    KeepRaw,
}

/// Fuzzy correction settings
#[derive(Debug, Clone, Deserialize)]
pub struct FuzzyConfig {
    #[serde(default)]
    pub scorer: Scorer,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub tie_break: TieBreak,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            scorer: Scorer::default(),
            threshold: default_threshold(),
            tie_break: TieBreak::default(),
        }
    }
}

fn default_threshold() -> f64 { DEFAULT_THRESHOLD }

/// Best-scoring candidate for a typed name
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch<'a> {
    pub name: &'a str,
    pub score: f64,
    /// Another candidate reached the same score
    pub tied: bool,
}

/// Resolves typed names against a known set of canonical names
#[derive(Clone)]
pub struct NameMatcher {
    similarity: Arc<dyn Similarity>,
    threshold: f64,
    tie_break: TieBreak,
}

impl fmt::Debug for NameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameMatcher")
            .field("threshold", &self.threshold)
            .field("tie_break", &self.tie_break)
            .finish_non_exhaustive()
    }
}

impl NameMatcher {
    pub fn new(config: &FuzzyConfig) -> Self {
        Self {
            similarity: Arc::new(config.scorer),
            threshold: config.threshold,
            tie_break: config.tie_break,
        }
    }

    pub fn with_similarity(
        similarity: impl Similarity + 'static,
        threshold: f64,
        tie_break: TieBreak,
    ) -> Self {
        Self {
            similarity: Arc::new(similarity),
            threshold,
            tie_break,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Highest-scoring candidate, ties resolved towards the smallest name
    pub fn best_match<'a>(&self, name: &str, candidates: &'a RosterSet) -> Option<BestMatch<'a>> {
        let mut best: Option<BestMatch<'a>> = None;

        // Sorted iteration: the first candidate at a score is the smallest
        for candidate in candidates {
            let score = self.similarity.score(name, candidate);
            match best.as_mut() {
                Some(current) if score > current.score => {
                    *current = BestMatch { name: candidate, score, tied: false };
                }
                Some(current) if score == current.score => current.tied = true,
                Some(_) => {}
                None => best = Some(BestMatch { name: candidate, score, tied: false }),
            }
        }

        best
    }

    /// Replace `name` with its closest candidate if the match clears the threshold
    pub fn correct(&self, name: &str, candidates: &RosterSet) -> String {
        if candidates.contains(name) {
            return name.to_string();
        }

        let Some(best) = self.best_match(name, candidates) else {
            return name.to_string();
        };

        if best.score <= self.threshold {
            tracing::debug!(
                "No roster name above threshold for {:?} (closest {:?} at {:.1})",
                name, best.name, best.score
            );
            return name.to_string();
        }

        if best.tied && self.tie_break == TieBreak::KeepRaw {
            tracing::debug!("Ambiguous correction for {:?} at {:.1}, keeping as typed", name, best.score);
            return name.to_string();
        }

        tracing::debug!("Corrected {:?} -> {:?} ({:.1})", name, best.name, best.score);
        best.name.to_string()
    }
}

impl Default for NameMatcher {
    fn default() -> Self {
        Self::new(&FuzzyConfig::default())
    }
}

/// One-shot correction with the given settings
pub fn correct(name: &str, candidates: &RosterSet, config: &FuzzyConfig) -> String {
    NameMatcher::new(config).correct(name, candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(names: &[&str]) -> RosterSet {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_normalize_casing_and_whitespace() {
        assert_eq!(normalize("  jOHN   smith \t"), "John Smith");
        assert_eq!(normalize("o'brien"), "O'Brien");
        assert_eq!(normalize("mary-jane  watson"), "Mary-Jane Watson");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        let once = normalize(" aNNa   de la  cruz ");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_scorer_ranges() {
        for scorer in [Scorer::Ratio, Scorer::TokenSortRatio, Scorer::JaroWinkler, Scorer::WeightedRatio] {
            assert_eq!(scorer.score("John Smith", "John Smith"), 100.0);
            let s = scorer.score("John Smith", "Zoe Quill");
            assert!((0.0..100.0).contains(&s));
        }
    }

    #[test]
    fn test_token_sort_handles_swapped_names() {
        assert_eq!(Scorer::TokenSortRatio.score("Smith John", "John Smith"), 100.0);
        assert!(Scorer::WeightedRatio.score("Smith John", "John Smith") > 90.0);
    }

    #[test]
    fn test_correct_typo() {
        let names = roster(&["John Smith", "Jane Doe"]);
        assert_eq!(correct("Jon Smith", &names, &FuzzyConfig::default()), "John Smith");
    }

    #[test]
    fn test_correct_keeps_unknown_name() {
        let names = roster(&["John Smith", "Jane Doe"]);
        assert_eq!(correct("Peter Parker", &names, &FuzzyConfig::default()), "Peter Parker");
    }

    #[test]
    fn test_threshold_is_strict() {
        let names = roster(&["Abcd"]);
        // Fixed score of exactly the threshold does not correct
        let matcher = NameMatcher::with_similarity(|_: &str, _: &str| 80.0, 80.0, TieBreak::Lexicographic);
        assert_eq!(matcher.correct("Abce", &names), "Abce");

        let matcher = NameMatcher::with_similarity(|_: &str, _: &str| 80.5, 80.0, TieBreak::Lexicographic);
        assert_eq!(matcher.correct("Abce", &names), "Abcd");
    }

    #[test]
    fn test_tie_break_policies() {
        let names = roster(&["Ann Lee", "Ann Lea"]);
        let lexi = NameMatcher::with_similarity(|_: &str, _: &str| 90.0, 80.0, TieBreak::Lexicographic);
        assert_eq!(lexi.correct("Ann Le", &names), "Ann Lea");

        let best = lexi.best_match("Ann Le", &names).unwrap();
        assert!(best.tied);

        let raw = NameMatcher::with_similarity(|_: &str, _: &str| 90.0, 80.0, TieBreak::KeepRaw);
        assert_eq!(raw.correct("Ann Le", &names), "Ann Le");
    }

    #[test]
    fn test_empty_candidates() {
        assert_eq!(correct("Jon", &RosterSet::new(), &FuzzyConfig::default()), "Jon");
    }
}
