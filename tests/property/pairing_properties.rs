use camp_pairing::core::{edge_weight, final_preferences, normalize, solve_pairing, unpaired_students};
use camp_pairing::models::{PreferenceMap, SolveStatus};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Up to 8 students, each ranking up to 5 distinct classmates
fn preference_map() -> impl Strategy<Value = PreferenceMap> {
    (0usize..=8).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(0..n.max(1), 0..=5), n).prop_map(move |lists| {
            lists
                .into_iter()
                .enumerate()
                .map(|(i, picks)| {
                    let mut seen = BTreeSet::new();
                    let choices = picks
                        .into_iter()
                        .filter(|&j| j != i && j < n && seen.insert(j))
                        .map(|j| format!("Student {}", j))
                        .collect();
                    (format!("Student {}", i), choices)
                })
                .collect()
        })
    })
}

/// Exhaustive maximum-weight matching for small inputs
fn brute_force(names: &[String], preferences: &PreferenceMap) -> f64 {
    let Some((first, rest)) = names.split_first() else {
        return 0.0;
    };
    let mut best = brute_force(rest, preferences);
    for (i, partner) in rest.iter().enumerate() {
        let mut remaining = rest.to_vec();
        remaining.remove(i);
        let total = edge_weight(preferences, first, partner) + brute_force(&remaining, preferences);
        if total > best {
            best = total;
        }
    }
    best
}

proptest! {
    #[test]
    fn normalize_is_idempotent(s in "[a-zA-Z '\\-\t]{0,40}") {
        let once = normalize(&s);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_leaves_no_runs_of_whitespace(s in "[a-z \t\n]{0,40}") {
        let normalized = normalize(&s);
        prop_assert!(!normalized.contains("  "));
        prop_assert_eq!(normalized.trim(), normalized.as_str());
    }

    #[test]
    fn edge_weight_is_symmetric(preferences in preference_map()) {
        for a in preferences.keys() {
            for b in preferences.keys() {
                prop_assert_eq!(edge_weight(&preferences, a, b), edge_weight(&preferences, b, a));
            }
        }
    }

    #[test]
    fn matching_is_disjoint_and_covers_universe(preferences in preference_map()) {
        let solution = solve_pairing(&preferences).unwrap();
        let mut paired = BTreeSet::new();
        for pair in &solution.matching.pairs {
            prop_assert!(pair.first != pair.second);
            prop_assert!(paired.insert(pair.first.clone()), "{} paired twice", pair.first);
            prop_assert!(paired.insert(pair.second.clone()), "{} paired twice", pair.second);
        }

        let unpaired = unpaired_students(&preferences, &solution.matching);
        prop_assert!(unpaired.is_disjoint(&paired));
        let everyone: BTreeSet<String> = preferences.keys().cloned().collect();
        prop_assert_eq!(unpaired.union(&paired).cloned().collect::<BTreeSet<_>>(), everyone);
        // Weights are positive, so at most one student is left over
        prop_assert!(unpaired.len() <= 1);
    }

    #[test]
    fn solver_finds_the_optimum(preferences in preference_map()) {
        let solution = solve_pairing(&preferences).unwrap();
        let names: Vec<String> = preferences.keys().cloned().collect();

        prop_assert_eq!(solution.status, SolveStatus::Optimal);
        prop_assert_eq!(solution.total_weight, brute_force(&names, &preferences));
    }

    #[test]
    fn exclude_removes_unresolved_names(preferences in preference_map(), missing in 0usize..8) {
        let unresolved: BTreeSet<String> = [format!("Student {}", missing)].into_iter().collect();

        let excluded = final_preferences(&preferences, &unresolved, &BTreeSet::new(), true);
        let retained = final_preferences(&preferences, &unresolved, &BTreeSet::new(), false);

        prop_assert!(excluded.keys().chain(excluded.values().flatten()).all(|n| !unresolved.contains(n)));
        prop_assert!(unresolved.iter().all(|n| retained.contains_key(n)));
    }
}
