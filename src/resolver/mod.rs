//! Hierarchical field resolver.
//!
//! Five levels, tried strictly in order, first non-empty answer wins:
//! profile mapping → personal cache → site patterns → generative fallback →
//! escalation. Lookup errors inside a level are logged and treated as a
//! miss; the next level still gets its chance.

pub mod profile_map;
pub mod rules;
pub mod similarity;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::clients::GenerativeClient;
use crate::error::Result;
use crate::models::{AnswerSource, FieldAnswerCacheEntry, FieldKind, ProfileData, SiteFieldPattern};
use crate::services::CacheWriter;
use crate::store::Store;

pub use profile_map::normalize_label;
pub use similarity::token_set_jaccard;

/// Personal-cache acceptance threshold.
const CACHE_THRESHOLD: f64 = 0.7;
/// Bonus applied when a cache entry was learned on the same site.
const SAME_SITE_BONUS: f64 = 0.2;
/// Site-pattern acceptance threshold.
const PATTERN_THRESHOLD: f64 = 0.8;

/// One field-resolution request.
#[derive(Debug)]
pub struct FieldQuery<'a> {
    pub application_id: &'a str,
    pub user_id: &'a str,
    pub label: &'a str,
    pub kind: FieldKind,
    pub site_domain: Option<&'a str>,
    pub profile: &'a ProfileData,
}

/// Resolver outcome: an answer, or the signal that only a human can help.
///
/// `Escalate` is not a fillable value; the caller surfaces it as "manual
/// input required" and must never write it into a form.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Answer { text: String, source: AnswerSource },
    Escalate,
}

pub struct FieldResolver {
    store: Arc<dyn Store>,
    generative: Option<Arc<dyn GenerativeClient>>,
    writer: CacheWriter,
}

impl FieldResolver {
    pub fn new(store: Arc<dyn Store>, generative: Option<Arc<dyn GenerativeClient>>) -> Self {
        let writer = CacheWriter::new(store.clone());
        Self {
            store,
            generative,
            writer,
        }
    }

    /// Resolve one field to an answer or an escalation.
    ///
    /// Post-condition: any fresh answer is upserted into the personal cache
    /// and logged to QA history before this returns; a cache hit bumps its
    /// usage count instead. Escalations write nothing.
    pub async fn resolve(&self, query: &FieldQuery<'_>) -> Result<Resolution> {
        let started = Instant::now();
        let normalized = normalize_label(query.label);
        debug!("🔍 resolving field: {} ({})", query.label, query.kind.as_str());

        // Level 1: direct profile mapping.
        if let Some(answer) = profile_map::lookup(&normalized, query.profile) {
            info!("✓ L1 profile: {} → {}", normalized, answer);
            self.record(query, &normalized, &answer, AnswerSource::Profile, started)
                .await?;
            return Ok(Resolution::Answer {
                text: answer,
                source: AnswerSource::Profile,
            });
        }

        // Level 2: personal cache.
        if let Some(answer) = self.personal_cache(query, &normalized).await {
            info!("✓ L2 cache: {} → {}", normalized, answer);
            self.writer.mark_reused(query.user_id, &normalized).await?;
            self.log(query, &normalized, &answer, AnswerSource::PersonalCache, started)
                .await?;
            return Ok(Resolution::Answer {
                text: answer,
                source: AnswerSource::PersonalCache,
            });
        }

        // Level 3: site patterns.
        if let Some(answer) = self.site_pattern(query, &normalized).await {
            info!("✓ L3 site pattern: {} → {}", normalized, answer);
            self.record(query, &normalized, &answer, AnswerSource::SitePattern, started)
                .await?;
            return Ok(Resolution::Answer {
                text: answer,
                source: AnswerSource::SitePattern,
            });
        }

        // Level 4: generative fallback, then the deterministic rule table.
        if let Some(answer) = self.generate(query, &normalized).await {
            info!("✓ L4 generated: {} → {}", normalized, answer);
            self.record(query, &normalized, &answer, AnswerSource::Generated, started)
                .await?;
            return Ok(Resolution::Answer {
                text: answer,
                source: AnswerSource::Generated,
            });
        }

        // Level 5: escalation. Never cached; the caller alerts an operator.
        info!("🚨 manual input required: {}", query.label);
        Ok(Resolution::Escalate)
    }

    async fn personal_cache(&self, query: &FieldQuery<'_>, normalized: &str) -> Option<String> {
        let entries = match self.store.cache_entries(query.user_id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("⚠️ personal cache lookup failed: {}", e);
                return None;
            }
        };

        let mut best: Option<(&FieldAnswerCacheEntry, f64)> = None;
        for entry in &entries {
            let mut score = token_set_jaccard(normalized, &entry.question);
            if query.site_domain.is_some()
                && entry.site_domain.as_deref() == query.site_domain
            {
                score += SAME_SITE_BONUS;
            }
            if score <= CACHE_THRESHOLD {
                continue;
            }
            let better = match best {
                None => true,
                Some((current, current_score)) => {
                    score > current_score
                        || (score == current_score && entry.usage_count > current.usage_count)
                }
            };
            if better {
                best = Some((entry, score));
            }
        }

        best.map(|(entry, _)| entry.answer.clone())
    }

    async fn site_pattern(&self, query: &FieldQuery<'_>, normalized: &str) -> Option<String> {
        let domain = query.site_domain?;
        let patterns = match self.store.site_patterns(domain).await {
            Ok(patterns) => patterns,
            Err(e) => {
                warn!("⚠️ site pattern lookup failed: {}", e);
                return None;
            }
        };

        let mut best: Option<(&SiteFieldPattern, f64)> = None;
        for pattern in &patterns {
            let score = token_set_jaccard(normalized, &pattern.field_label);
            if score <= PATTERN_THRESHOLD {
                continue;
            }
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((pattern, score));
            }
        }

        best.and_then(|(pattern, _)| pattern.top_answer().map(|a| a.to_string()))
    }

    async fn generate(&self, query: &FieldQuery<'_>, normalized: &str) -> Option<String> {
        if let Some(client) = &self.generative {
            let prompt = build_prompt(query);
            match client.complete(&prompt, Some(SYSTEM_MESSAGE)).await {
                Ok(answer) => {
                    let answer = answer.trim().to_string();
                    if !answer.is_empty() && answer != "UNKNOWN" {
                        return Some(answer);
                    }
                }
                Err(e) => {
                    warn!("⚠️ generative service failed, using rule table: {}", e);
                }
            }
        }
        rules::rule_table_answer(normalized, query.profile)
    }

    /// Write-back for a fresh answer: personal-cache upsert + audit row.
    async fn record(
        &self,
        query: &FieldQuery<'_>,
        normalized: &str,
        answer: &str,
        source: AnswerSource,
        started: Instant,
    ) -> Result<()> {
        self.writer
            .remember(query.user_id, normalized, answer, query.site_domain, source)
            .await?;
        self.log(query, normalized, answer, source, started).await
    }

    async fn log(
        &self,
        query: &FieldQuery<'_>,
        normalized: &str,
        answer: &str,
        source: AnswerSource,
        started: Instant,
    ) -> Result<()> {
        self.writer
            .log_history(
                query.application_id,
                query.user_id,
                normalized,
                answer,
                source,
                started.elapsed().as_millis() as u64,
            )
            .await
    }
}

const SYSTEM_MESSAGE: &str = "You are helping someone fill out a job application form. \
Answer using only the candidate's profile; never invent credentials.";

fn build_prompt(query: &FieldQuery<'_>) -> String {
    format!(
        r#"Provide the best answer for one form field on a job application.

Question: "{}"
Field type: {}
Site: {}

Candidate profile:
{}

Rules:
1. Use ONLY information from the profile.
2. Be concise and professional.
3. If the profile does not contain the information, return "UNKNOWN".
4. For yes/no questions, answer based on the profile.
5. Keep the answer under 100 characters.

Answer:"#,
        query.label,
        query.kind.as_str(),
        query.site_domain.unwrap_or("unknown"),
        query.profile.summary(),
    )
}
