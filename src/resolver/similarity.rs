//! Question-text similarity.

use std::collections::HashSet;

/// Token-set Jaccard index between two normalized labels.
///
/// Both inputs are expected to already be normalized (lowercase, punctuation
/// stripped); exact equality short-circuits to 1.0.
pub fn token_set_jaccard(a: &str, b: &str) -> f64 {
    let a = a.trim();
    let b = b.trim();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let tokens_a: HashSet<&str> = a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = b.split_whitespace().collect();

    let intersection = tokens_a.intersection(&tokens_b).count();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        return 0.0;
    }

    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::token_set_jaccard;

    #[test]
    fn identical_labels_score_one() {
        assert_eq!(token_set_jaccard("first name", "first name"), 1.0);
    }

    #[test]
    fn disjoint_labels_score_zero() {
        assert_eq!(token_set_jaccard("first name", "salary expectation"), 0.0);
    }

    #[test]
    fn overlap_is_intersection_over_union() {
        // {years, of, experience} vs {years, experience} → 2/3
        let score = token_set_jaccard("years of experience", "years experience");
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(token_set_jaccard("", "first name"), 0.0);
    }
}
