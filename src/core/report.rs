use std::collections::BTreeSet;

use crate::models::{Matching, PreferenceMap};

/// Students in the final universe who ended up without a partner
pub fn unpaired_students(preferences: &PreferenceMap, matching: &Matching) -> BTreeSet<String> {
    let paired = matching.paired_names();
    preferences
        .keys()
        .filter(|student| !paired.contains(student.as_str()))
        .cloned()
        .collect()
}
