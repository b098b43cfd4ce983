use std::collections::{BTreeMap, BTreeSet};

use crate::core::names::NameMatcher;
use crate::models::{PreferenceMap, ReviewEntry, RosterSet};

/// Names referenced in preferences that are neither on the roster nor declared absent
///
/// These are unresolved typos or students who never submitted a row. Nothing is
/// excluded here; the caller decides what to do with them.
pub fn only_in_preferences(
    preferences: &PreferenceMap,
    roster: &RosterSet,
    not_attending: &BTreeSet<String>,
) -> BTreeSet<String> {
    preferences
        .values()
        .flatten()
        .filter(|name| !roster.contains(*name) && !not_attending.contains(*name))
        .cloned()
        .collect()
}

/// Review details for every unresolved name: who asked for them and the nearest roster name
pub fn review_entries(
    preferences: &PreferenceMap,
    roster: &RosterSet,
    unresolved: &BTreeSet<String>,
    matcher: &NameMatcher,
) -> Vec<ReviewEntry> {
    let mut referenced_by: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (student, choices) in preferences {
        for choice in choices.iter().filter(|c| unresolved.contains(*c)) {
            referenced_by
                .entry(choice.as_str())
                .or_default()
                .push(student.clone());
        }
    }

    unresolved
        .iter()
        .map(|name| {
            let closest = matcher.best_match(name, roster);
            ReviewEntry {
                name: name.clone(),
                referenced_by: referenced_by.remove(name.as_str()).unwrap_or_default(),
                closest_match: closest.as_ref().map(|m| m.name.to_string()),
                closest_score: closest.map(|m| m.score),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn prefs(entries: &[(&str, &[&str])]) -> PreferenceMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_only_in_preferences() {
        let preferences = prefs(&[
            ("Alice", &["Bob", "Zara", "Yusuf"]),
            ("Bob", &["Alice", "Zara"]),
        ]);
        let roster = set(&["Alice", "Bob"]);
        let absent = set(&["Yusuf"]);

        let missing = only_in_preferences(&preferences, &roster, &absent);

        assert_eq!(missing, set(&["Zara"]));
    }

    #[test]
    fn test_all_accounted_for() {
        let preferences = prefs(&[("Alice", &["Bob"]), ("Bob", &[])]);
        let roster = set(&["Alice", "Bob"]);

        assert!(only_in_preferences(&preferences, &roster, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_review_entries() {
        let preferences = prefs(&[
            ("Alice Brown", &["Bobby Green", "Zara Khan"]),
            ("Bob Green", &["Zara Khan"]),
        ]);
        let roster = set(&["Alice Brown", "Bob Green"]);
        let unresolved = set(&["Bobby Green", "Zara Khan"]);

        let entries = review_entries(&preferences, &roster, &unresolved, &NameMatcher::default());

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Bobby Green");
        assert_eq!(entries[0].referenced_by, vec!["Alice Brown"]);
        assert_eq!(entries[0].closest_match.as_deref(), Some("Bob Green"));
        assert_eq!(entries[1].referenced_by, vec!["Alice Brown", "Bob Green"]);
    }
}
