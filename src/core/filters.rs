use std::collections::BTreeSet;

use crate::models::PreferenceMap;

/// Build the final preference universe handed to the solver
///
/// Non-attending students are always removed, both as keys and from every list.
/// With `exclude`, unresolved names are removed the same way; otherwise they are
/// kept as pairing targets with an empty list of their own.
pub fn final_preferences(
    preferences: &PreferenceMap,
    only_in_preferences: &BTreeSet<String>,
    not_attending: &BTreeSet<String>,
    exclude: bool,
) -> PreferenceMap {
    let is_excluded = |name: &str| {
        not_attending.contains(name) || (exclude && only_in_preferences.contains(name))
    };

    let mut filtered: PreferenceMap = preferences
        .iter()
        .filter(|(student, _)| !is_excluded(student.as_str()))
        .map(|(student, choices)| {
            let kept = choices
                .iter()
                .filter(|choice| !is_excluded(choice.as_str()))
                .cloned()
                .collect();
            (student.clone(), kept)
        })
        .collect();

    if !exclude {
        for name in only_in_preferences {
            filtered.entry(name.clone()).or_default();
        }
    }

    tracing::debug!(
        "Final universe: {} students ({} excluded as absent, exclude_missing={})",
        filtered.len(),
        not_attending.len(),
        exclude
    );

    filtered
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
    fn test_exclude_strips_unresolved() {
        let preferences = prefs(&[("Alice", &["Zara", "Bob"]), ("Bob", &["Alice"])]);

        let result = final_preferences(&preferences, &set(&["Zara"]), &BTreeSet::new(), true);

        assert_eq!(result, prefs(&[("Alice", &["Bob"]), ("Bob", &["Alice"])]));
    }

    #[test]
    fn test_retain_adds_empty_lists() {
        let preferences = prefs(&[("Alice", &["Zara", "Bob"]), ("Bob", &["Alice"])]);

        let result = final_preferences(&preferences, &set(&["Zara"]), &BTreeSet::new(), false);

        assert_eq!(result["Alice"], vec!["Zara", "Bob"]);
        assert_eq!(result["Zara"], Vec::<String>::new());
    }

    #[test]
    fn test_not_attending_always_removed() {
        let preferences = prefs(&[
            ("Alice", &["Cara", "Bob"]),
            ("Bob", &["Cara"]),
            ("Cara", &["Alice"]),
        ]);

        for exclude in [true, false] {
            let result = final_preferences(&preferences, &BTreeSet::new(), &set(&["Cara"]), exclude);
            assert!(!result.contains_key("Cara"));
            assert!(result.values().flatten().all(|n| n != "Cara"));
        }
    }
}
