use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::FieldKind;

/// Which resolver level produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerSource {
    #[serde(rename = "profile_data")]
    Profile,
    #[serde(rename = "user_cache")]
    PersonalCache,
    #[serde(rename = "site_pattern")]
    SitePattern,
    #[serde(rename = "ai_generated")]
    Generated,
    #[serde(rename = "manual_input")]
    Manual,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Profile => "profile_data",
            AnswerSource::PersonalCache => "user_cache",
            AnswerSource::SitePattern => "site_pattern",
            AnswerSource::Generated => "ai_generated",
            AnswerSource::Manual => "manual_input",
        }
    }

    /// Cache confidence assigned to answers from this source.
    pub fn confidence(&self) -> f64 {
        match self {
            AnswerSource::Profile => 0.9,
            AnswerSource::PersonalCache => 0.8,
            AnswerSource::SitePattern => 0.8,
            AnswerSource::Generated => 0.6,
            AnswerSource::Manual => 1.0,
        }
    }
}

/// A learned (normalized question → answer) mapping, scoped to a user.
///
/// Unique per (user_id, question); usage_count only grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldAnswerCacheEntry {
    pub user_id: String,
    /// Normalized question text (see `resolver::normalize_label`).
    pub question: String,
    pub answer: String,
    pub site_domain: Option<String>,
    pub source: AnswerSource,
    pub confidence: f64,
    pub usage_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FieldAnswerCacheEntry {
    pub fn new(
        user_id: &str,
        question: &str,
        answer: &str,
        site_domain: Option<&str>,
        source: AnswerSource,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            site_domain: site_domain.map(|d| d.to_string()),
            source,
            confidence: source.confidence(),
            usage_count: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Site-scoped aggregate of which answers are common for a field label.
///
/// Unique per (site_domain, field_label); updated additively, never
/// overwritten destructively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteFieldPattern {
    pub site_domain: String,
    /// Normalized field label.
    pub field_label: String,
    pub field_kind: FieldKind,
    /// answer → occurrence count.
    pub answers: HashMap<String, u32>,
    pub usage_frequency: u32,
}

impl SiteFieldPattern {
    /// Most frequent answer; ties broken lexicographically so reads are
    /// deterministic.
    pub fn top_answer(&self) -> Option<&str> {
        self.answers
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(answer, _)| answer.as_str())
    }
}

/// Append-only audit of one answer produced during processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaHistoryRecord {
    pub id: String,
    pub application_id: String,
    pub user_id: String,
    pub question: String,
    pub answer: String,
    pub source: AnswerSource,
    pub elapsed_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl QaHistoryRecord {
    pub fn new(
        application_id: &str,
        user_id: &str,
        question: &str,
        answer: &str,
        source: AnswerSource,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            application_id: application_id.to_string(),
            user_id: user_id.to_string(),
            question: question.to_string(),
            answer: answer.to_string(),
            source,
            elapsed_ms,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_answer_prefers_highest_count() {
        let mut pattern = SiteFieldPattern {
            site_domain: "jobs.example.com".into(),
            field_label: "visa sponsorship".into(),
            field_kind: FieldKind::Select,
            answers: HashMap::new(),
            usage_frequency: 0,
        };
        pattern.answers.insert("No".into(), 5);
        pattern.answers.insert("Yes".into(), 2);
        assert_eq!(pattern.top_answer(), Some("No"));
    }

    #[test]
    fn top_answer_ties_break_deterministically() {
        let mut pattern = SiteFieldPattern {
            site_domain: "jobs.example.com".into(),
            field_label: "work preference".into(),
            field_kind: FieldKind::Select,
            answers: HashMap::new(),
            usage_frequency: 0,
        };
        pattern.answers.insert("Remote".into(), 3);
        pattern.answers.insert("Hybrid".into(), 3);
        assert_eq!(pattern.top_answer(), Some("Hybrid"));
    }
}
