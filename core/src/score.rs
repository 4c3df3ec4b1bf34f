//! Deterministic scoring functions.
//!
//! All scores are fractions in `0.0..=1.0`. Aggregation is the plain
//! arithmetic mean; an empty input has no score rather than a zero score,
//! so "never answered" is distinguishable from "answered everything wrong".

/// Score a multiple-choice answer: 1.0 on an exact, case-sensitive match,
/// 0.0 otherwise. Two empty strings are equal and score 1.0.
#[must_use]
pub fn score_mc_answer(selected: &str, correct: &str) -> f64 {
    if selected == correct { 1.0 } else { 0.0 }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean over the concatenation of scenario and quiz scores.
///
/// Returns `None` only when both lists are empty. How the same values are
/// split across the two lists never changes the result.
#[must_use]
pub fn module_score(scenario_scores: &[f64], quiz_scores: &[f64]) -> Option<f64> {
    let count = scenario_scores.len() + quiz_scores.len();
    if count == 0 {
        return None;
    }
    let total: f64 = scenario_scores.iter().sum::<f64>() + quiz_scores.iter().sum::<f64>();
    Some(total / count as f64)
}

/// Mean across module scores; `None` for an empty session.
#[must_use]
pub fn aggregate_score(module_scores: &[f64]) -> Option<f64> {
    mean(module_scores)
}

/// The boundary is passing: a score exactly at the threshold passes.
#[must_use]
pub fn is_passing(score: f64, threshold: f64) -> bool {
    score >= threshold
}

/// Topic areas of modules scoring strictly below the threshold, in the
/// input order. A module exactly at the threshold is never weak.
#[must_use]
pub fn weak_areas(modules: &[(String, f64)], threshold: f64) -> Vec<String> {
    modules
        .iter()
        .filter(|(_, score)| *score < threshold)
        .map(|(topic_area, _)| topic_area.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: Option<f64>, expected: f64) -> bool {
        actual.is_some_and(|value| (value - expected).abs() < 1e-12)
    }

    #[test]
    fn mc_answer_exact_match_only() {
        assert_eq!(score_mc_answer("Cabinet B", "Cabinet B"), 1.0);
        assert_eq!(score_mc_answer("cabinet b", "Cabinet B"), 0.0);
        assert_eq!(score_mc_answer("Cabinet A", "Cabinet B"), 0.0);
        assert_eq!(score_mc_answer("Cabinet B ", "Cabinet B"), 0.0);
    }

    #[test]
    fn mc_answer_empty_strings_match() {
        assert_eq!(score_mc_answer("", ""), 1.0);
        assert_eq!(score_mc_answer("", "Cabinet B"), 0.0);
        assert_eq!(score_mc_answer("Cabinet B", ""), 0.0);
    }

    #[test]
    fn module_score_none_only_when_both_empty() {
        assert_eq!(module_score(&[], &[]), None);
        assert_eq!(module_score(&[0.5], &[]), Some(0.5));
        assert_eq!(module_score(&[], &[0.5]), Some(0.5));
    }

    #[test]
    fn module_score_split_invariant() {
        let all = module_score(&[0.6, 0.8, 1.0, 0.0], &[]);
        let split = module_score(&[0.6, 0.8], &[1.0, 0.0]);
        let other_split = module_score(&[0.6], &[0.8, 1.0, 0.0]);
        for result in [all, split, other_split] {
            assert!(approx(result, 0.6), "got {result:?}");
        }
    }

    #[test]
    fn aggregate_is_mean() {
        assert_eq!(aggregate_score(&[]), None);
        assert!(approx(aggregate_score(&[0.85, 0.6]), 0.725));
        assert_eq!(aggregate_score(&[1.0]), Some(1.0));
    }

    #[test]
    fn passing_boundary_is_inclusive() {
        assert!(is_passing(0.7, 0.7));
        assert!(is_passing(0.700_000_1, 0.7));
        assert!(!is_passing(0.699, 0.7));
        assert!(is_passing(1.0, 0.7));
    }

    #[test]
    fn weak_areas_preserve_order_and_exclude_boundary() {
        let modules = vec![
            ("hazmat".to_owned(), 0.69),
            ("ergonomics".to_owned(), 0.7),
            ("equipment-handling".to_owned(), 0.2),
            ("reporting".to_owned(), 0.95),
        ];
        let weak = weak_areas(&modules, 0.7);
        assert_eq!(weak, vec!["hazmat".to_owned(), "equipment-handling".to_owned()]);
    }

    #[test]
    fn weak_areas_empty_input() {
        assert!(weak_areas(&[], 0.7).is_empty());
    }
}
