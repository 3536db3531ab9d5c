//! Level 1: direct profile mapping.
//!
//! Normalizes a field label and resolves it against the structured profile
//! through a static synonym table, with substring and keyword fallbacks.

use std::sync::OnceLock;

use phf::phf_map;
use regex::Regex;

use crate::models::ProfileData;

/// Normalize a field label: lowercase, strip punctuation, collapse
/// whitespace.
pub fn normalize_label(label: &str) -> String {
    static STRIP: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();
    let strip = STRIP.get_or_init(|| Regex::new(r"[^a-z0-9\s]").unwrap());
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").unwrap());

    let lowered = label.to_lowercase();
    let stripped = strip.replace_all(&lowered, "");
    spaces.replace_all(stripped.trim(), " ").to_string()
}

/// Known field-name variants, keyed by their normalized form.
static FIELD_SYNONYMS: phf::Map<&'static str, &'static str> = phf_map! {
    "firstname" => "first name",
    "fname" => "first name",
    "given name" => "first name",
    "givenname" => "first name",
    "lastname" => "last name",
    "lname" => "last name",
    "family name" => "last name",
    "familyname" => "last name",
    "surname" => "last name",
    "fullname" => "full name",
    "name" => "full name",
    "complete name" => "full name",
    "email address" => "email",
    "emailaddress" => "email",
    "contact email" => "email",
    "phone number" => "phone",
    "phonenumber" => "phone",
    "mobile" => "phone",
    "telephone" => "phone",
    "contact number" => "phone",
    "street address" => "address",
    "address line 1" => "address",
    "home address" => "address",
    "town" => "city",
    "locality" => "city",
    "province" => "state",
    "region" => "state",
    "state province" => "state",
    "zip code" => "zip",
    "zipcode" => "zip",
    "postal code" => "zip",
    "postcode" => "zip",
    "salary expectation" => "salary",
    "expected salary" => "salary",
    "compensation" => "salary",
    "desired salary" => "salary",
    "years experience" => "experience",
    "years of experience" => "experience",
    "work experience" => "experience",
    "professional experience" => "experience",
    "sponsorship" => "visa sponsorship",
    "visa" => "visa sponsorship",
    "authorized to work" => "work authorization",
    "legally authorized" => "work authorization",
    "remote preference" => "work preference",
};

/// Canonical keys in specificity order; the more specific experience keys
/// must win the substring pass before the generic one.
const CANONICAL_KEYS: &[&str] = &[
    "first name",
    "last name",
    "full name",
    "email",
    "phone",
    "address",
    "city",
    "state",
    "zip",
    "salary",
    "security experience",
    "it experience",
    "experience",
    "work preference",
    "visa sponsorship",
    "work authorization",
];

fn canonical_value(key: &str, profile: &ProfileData) -> Option<String> {
    let value = match key {
        "first name" => profile.personal.first_name.as_ref(),
        "last name" => profile.personal.last_name.as_ref(),
        "full name" => profile.personal.full_name.as_ref(),
        "email" => profile.personal.email.as_ref(),
        "phone" => profile.personal.phone.as_ref(),
        "address" => profile.personal.address.as_ref(),
        "city" => profile.personal.city.as_ref(),
        "state" => profile.personal.state.as_ref(),
        "zip" => profile.personal.zip.as_ref(),
        "salary" => profile.experience.salary_expectation.as_ref(),
        "experience" => profile.experience.total_years.as_ref(),
        "it experience" => profile.experience.it_years.as_ref(),
        "security experience" => profile.experience.security_years.as_ref(),
        "work preference" => profile.preferences.work_preference.as_ref(),
        "visa sponsorship" => profile.eligibility.requires_sponsorship.as_ref(),
        "work authorization" => profile.eligibility.authorized_to_work.as_ref(),
        _ => None,
    };
    value.filter(|v| !v.is_empty()).cloned()
}

/// Resolve a normalized label against the profile.
///
/// Exact match is preferred, then substring overlap with a canonical key,
/// then keyword heuristics as the final fallback within this level.
pub fn lookup(normalized: &str, profile: &ProfileData) -> Option<String> {
    if normalized.is_empty() {
        return None;
    }

    // Exact: canonical key or a known synonym of one.
    if let Some(value) = canonical_value(normalized, profile) {
        return Some(value);
    }
    if let Some(canonical) = FIELD_SYNONYMS.get(normalized) {
        if let Some(value) = canonical_value(canonical, profile) {
            return Some(value);
        }
    }

    // Partial: canonical key inside the label, or vice versa.
    for key in CANONICAL_KEYS {
        if normalized.contains(key) || key.contains(normalized) {
            if let Some(value) = canonical_value(key, profile) {
                return Some(value);
            }
        }
    }

    // Known variants buried inside a longer question.
    for (variant, canonical) in FIELD_SYNONYMS.entries() {
        if normalized.contains(variant) {
            if let Some(value) = canonical_value(canonical, profile) {
                return Some(value);
            }
        }
    }

    keyword_heuristics(normalized, profile)
}

fn keyword_heuristics(normalized: &str, profile: &ProfileData) -> Option<String> {
    if normalized.contains("name") {
        if normalized.contains("first") || normalized.contains("given") {
            return canonical_value("first name", profile);
        }
        if normalized.contains("last")
            || normalized.contains("family")
            || normalized.contains("sur")
        {
            return canonical_value("last name", profile);
        }
        return canonical_value("full name", profile);
    }
    if normalized.contains("mail") {
        return canonical_value("email", profile);
    }
    if normalized.contains("phone") || normalized.contains("mobile") {
        return canonical_value("phone", profile);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::PersonalInfo;

    fn profile() -> ProfileData {
        ProfileData {
            personal: PersonalInfo {
                first_name: Some("Ada".into()),
                last_name: Some("Lovelace".into()),
                email: Some("ada@example.com".into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn normalization_strips_punctuation_and_case() {
        assert_eq!(normalize_label("First Name *"), "first name");
        assert_eq!(normalize_label("  E-mail:  Address "), "email address");
    }

    #[test]
    fn exact_synonym_resolves() {
        assert_eq!(
            lookup(&normalize_label("Given Name"), &profile()).as_deref(),
            Some("Ada")
        );
    }

    #[test]
    fn substring_match_resolves() {
        assert_eq!(
            lookup("please enter your first name", &profile()).as_deref(),
            Some("Ada")
        );
    }

    #[test]
    fn keyword_heuristic_picks_name_part() {
        assert_eq!(
            lookup("candidate name last", &profile()).as_deref(),
            Some("Lovelace")
        );
    }

    #[test]
    fn unknown_label_misses() {
        assert_eq!(lookup("favorite compiler pass", &profile()), None);
    }
}
