//! Deterministic rule table.
//!
//! Last-resort synthesis when the generative service is unavailable: a small
//! keyword table over the normalized label, preferring profile values and
//! falling back to fixed defaults.

use crate::models::ProfileData;

pub fn rule_table_answer(normalized: &str, profile: &ProfileData) -> Option<String> {
    let contains_any =
        |words: &[&str]| -> bool { words.iter().any(|w| normalized.contains(w)) };

    if contains_any(&["salary", "compensation", "pay"]) {
        return Some(
            profile
                .experience
                .salary_expectation
                .clone()
                .unwrap_or_else(|| "$80,000 - $100,000".to_string()),
        );
    }

    if contains_any(&["experience", "years"]) {
        if contains_any(&["security", "cyber", "soc"]) {
            return Some(
                profile
                    .experience
                    .security_years
                    .clone()
                    .unwrap_or_else(|| "2-3 years".to_string()),
            );
        }
        if normalized.split_whitespace().any(|t| t == "it") {
            return Some(
                profile
                    .experience
                    .it_years
                    .clone()
                    .unwrap_or_else(|| "3-5 years".to_string()),
            );
        }
        return Some(
            profile
                .experience
                .total_years
                .clone()
                .unwrap_or_else(|| "3+ years".to_string()),
        );
    }

    if contains_any(&["visa", "sponsorship"]) {
        return Some(
            profile
                .eligibility
                .requires_sponsorship
                .clone()
                .unwrap_or_else(|| "No".to_string()),
        );
    }

    if contains_any(&["authorization", "authorized", "eligible"]) {
        return Some(
            profile
                .eligibility
                .authorized_to_work
                .clone()
                .unwrap_or_else(|| "Yes".to_string()),
        );
    }

    if contains_any(&["remote", "hybrid", "preference"]) {
        return Some(
            profile
                .preferences
                .work_preference
                .clone()
                .unwrap_or_else(|| "Hybrid".to_string()),
        );
    }

    None
}

#[cfg(test)]
mod tests {
    use super::rule_table_answer;
    use crate::models::ProfileData;

    #[test]
    fn experience_question_gets_security_default() {
        let answer = rule_table_answer(
            "describe your experience with soc tooling",
            &ProfileData::default(),
        );
        assert_eq!(answer.as_deref(), Some("2-3 years"));
    }

    #[test]
    fn salary_prefers_profile_value() {
        let mut profile = ProfileData::default();
        profile.experience.salary_expectation = Some("$120,000".into());
        assert_eq!(
            rule_table_answer("expected pay range", &profile).as_deref(),
            Some("$120,000")
        );
    }

    #[test]
    fn unmatched_label_yields_none() {
        assert_eq!(
            rule_table_answer("favorite text editor", &ProfileData::default()),
            None
        );
    }
}
