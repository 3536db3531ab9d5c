//! Learning-loop write-back.
//!
//! Records successful (field, answer) pairs into the resolver's caches and
//! the append-only QA audit, closing the loop for future applications.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::models::{
    AnswerSource, FieldAnswerCacheEntry, FieldKind, QaHistoryRecord,
};
use crate::store::Store;

/// One answered field, as collected during a processing run.
#[derive(Debug, Clone)]
pub struct AnsweredField {
    /// Normalized question text.
    pub question: String,
    pub answer: String,
    pub kind: FieldKind,
    pub source: AnswerSource,
}

pub struct CacheWriter {
    store: Arc<dyn Store>,
}

impl CacheWriter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Upsert an answer into the user's personal cache.
    ///
    /// Called at resolution time for every level that produced a fresh
    /// answer; escalations are never written.
    pub async fn remember(
        &self,
        user_id: &str,
        question: &str,
        answer: &str,
        site_domain: Option<&str>,
        source: AnswerSource,
    ) -> Result<()> {
        let entry = FieldAnswerCacheEntry::new(user_id, question, answer, site_domain, source);
        self.store.upsert_cache_entry(entry).await?;
        debug!("💾 cached answer for {}: {}", user_id, question);
        Ok(())
    }

    /// Bump usage on a personal-cache hit. Usage counts only grow.
    pub async fn mark_reused(&self, user_id: &str, question: &str) -> Result<()> {
        self.store.bump_cache_usage(user_id, question).await
    }

    /// Append one row to the QA audit. Write-once; never mutated.
    pub async fn log_history(
        &self,
        application_id: &str,
        user_id: &str,
        question: &str,
        answer: &str,
        source: AnswerSource,
        elapsed_ms: u64,
    ) -> Result<()> {
        let record =
            QaHistoryRecord::new(application_id, user_id, question, answer, source, elapsed_ms);
        self.store.append_qa_history(record).await
    }

    /// Fold a completed run's answers into the site-pattern aggregates.
    ///
    /// Only called after a successful submission, so site-wide statistics
    /// learn from answers the target site actually accepted.
    pub async fn record_site_answers(
        &self,
        site_domain: &str,
        answers: &[AnsweredField],
    ) -> Result<()> {
        for answered in answers {
            self.store
                .record_site_answer(
                    site_domain,
                    &answered.question,
                    answered.kind,
                    &answered.answer,
                )
                .await?;
        }
        debug!(
            "📊 updated {} site pattern(s) for {}",
            answers.len(),
            site_domain
        );
        Ok(())
    }
}
