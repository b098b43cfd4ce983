use crate::models::PreferenceMap;

/// Score one student gives a partner they did not rank
pub const BASELINE_SCORE: f64 = 0.5;

/// How much `student` wants `partner`
///
/// Scoring formula (`L` = length of the student's list):
/// ```text
/// rank(s -> p) = L + 1 - index_of(p)   if p is listed
///              = 0.5                   otherwise
/// ```
/// Longer lists produce larger scores; this is not normalized.
pub fn rank_score(preferences: &PreferenceMap, student: &str, partner: &str) -> f64 {
    let list = choices_of(preferences, student);
    match list.iter().position(|name| name == partner) {
        Some(index) => (list.len() + 1 - index) as f64,
        None => BASELINE_SCORE,
    }
}

/// Symmetric utility of pairing two students
///
/// Two students who ranked neither each other still score `1.0`, so pairing
/// them always beats leaving both single.
pub fn edge_weight(preferences: &PreferenceMap, a: &str, b: &str) -> f64 {
    rank_score(preferences, a, b) + rank_score(preferences, b, a)
}

/// `rank_score` in exact half-points, `None` on overflow
pub(crate) fn rank_half_points(preferences: &PreferenceMap, student: &str, partner: &str) -> Option<i64> {
    let list = choices_of(preferences, student);
    match list.iter().position(|name| name == partner) {
        Some(index) => {
            let len = i64::try_from(list.len()).ok()?;
            let index = i64::try_from(index).ok()?;
            len.checked_add(1)?.checked_sub(index)?.checked_mul(2)
        }
        None => Some(1),
    }
}

/// `edge_weight` in exact half-points, `None` on overflow
pub(crate) fn edge_half_points(preferences: &PreferenceMap, a: &str, b: &str) -> Option<i64> {
    rank_half_points(preferences, a, b)?.checked_add(rank_half_points(preferences, b, a)?)
}

/// Names that are only list entries have no choices of their own
fn choices_of<'a>(preferences: &'a PreferenceMap, student: &str) -> &'a [String] {
    preferences.get(student).map(Vec::as_slice).unwrap_or(&[])
}
