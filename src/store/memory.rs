//! In-memory store.
//!
//! Backs the test suite and standalone runs of the binary; a deployment
//! would put a relational implementation behind the same trait.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{EngineError, Result};
use crate::models::{
    Application, ApplicationStatus, Batch, CaptchaSession, CaptchaStatus, FieldAnswerCacheEntry,
    FieldKind, ProfileRecord, QaHistoryRecord, SiteFieldPattern,
};
use crate::store::Store;

#[derive(Default)]
struct Inner {
    applications: HashMap<String, Application>,
    profiles: HashMap<String, ProfileRecord>,
    captcha_sessions: HashMap<String, CaptchaSession>,
    cache: HashMap<(String, String), FieldAnswerCacheEntry>,
    patterns: HashMap<(String, String), SiteFieldPattern>,
    history: Vec<QaHistoryRecord>,
    batches: HashMap<String, Batch>,
    applications_used: HashMap<String, u32>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning only happens after a panic inside a guard scope;
        // the data is still usable for diagnostics.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn queued_applications(&self, limit: usize) -> Result<Vec<Application>> {
        let inner = self.lock();
        let mut queued: Vec<Application> = inner
            .applications
            .values()
            .filter(|a| a.status == ApplicationStatus::Queued)
            .cloned()
            .collect();
        queued.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        queued.truncate(limit);
        Ok(queued)
    }

    async fn application(&self, id: &str) -> Result<Option<Application>> {
        Ok(self.lock().applications.get(id).cloned())
    }

    async fn insert_application(&self, application: Application) -> Result<()> {
        self.lock()
            .applications
            .insert(application.id.clone(), application);
        Ok(())
    }

    async fn update_application_status(
        &self,
        id: &str,
        status: ApplicationStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let app = inner
            .applications
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound {
                entity: "application",
                id: id.to_string(),
            })?;
        app.status = status;
        if let Some(message) = error {
            app.error_message = Some(message.to_string());
        }
        match status {
            ApplicationStatus::Processing if app.processing_started_at.is_none() => {
                app.processing_started_at = Some(Utc::now());
            }
            ApplicationStatus::Completed | ApplicationStatus::Failed => {
                app.finished_at = Some(Utc::now());
            }
            _ => {}
        }
        Ok(())
    }

    async fn link_captcha_session(&self, application_id: &str, session_id: &str) -> Result<()> {
        let mut inner = self.lock();
        let app = inner
            .applications
            .get_mut(application_id)
            .ok_or_else(|| EngineError::NotFound {
                entity: "application",
                id: application_id.to_string(),
            })?;
        app.captcha_session_id = Some(session_id.to_string());
        Ok(())
    }

    async fn pause_queued(&self, user_id: &str) -> Result<usize> {
        let mut inner = self.lock();
        let mut moved = 0;
        for app in inner.applications.values_mut() {
            if app.user_id == user_id && app.status == ApplicationStatus::Queued {
                app.status = ApplicationStatus::Paused;
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn resume_paused(&self, user_id: &str) -> Result<usize> {
        let mut inner = self.lock();
        let mut moved = 0;
        for app in inner.applications.values_mut() {
            if app.user_id == user_id && app.status == ApplicationStatus::Paused {
                app.status = ApplicationStatus::Queued;
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn profile(&self, id: &str) -> Result<Option<ProfileRecord>> {
        Ok(self.lock().profiles.get(id).cloned())
    }

    async fn insert_profile(&self, profile: ProfileRecord) -> Result<()> {
        self.lock().profiles.insert(profile.id.clone(), profile);
        Ok(())
    }

    async fn increment_applications_used(&self, user_id: &str) -> Result<()> {
        *self
            .lock()
            .applications_used
            .entry(user_id.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn applications_used(&self, user_id: &str) -> Result<u32> {
        Ok(self
            .lock()
            .applications_used
            .get(user_id)
            .copied()
            .unwrap_or(0))
    }

    async fn insert_captcha_session(&self, session: CaptchaSession) -> Result<()> {
        let mut inner = self.lock();
        // Exactly one active session per application.
        for existing in inner.captcha_sessions.values_mut() {
            if existing.application_id == session.application_id
                && existing.status == CaptchaStatus::Pending
            {
                existing.status = CaptchaStatus::Expired;
            }
        }
        inner.captcha_sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn captcha_session(&self, id: &str) -> Result<Option<CaptchaSession>> {
        Ok(self.lock().captcha_sessions.get(id).cloned())
    }

    async fn update_captcha_status(
        &self,
        id: &str,
        status: CaptchaStatus,
        solved_by: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let session =
            inner
                .captcha_sessions
                .get_mut(id)
                .ok_or_else(|| EngineError::NotFound {
                    entity: "captcha session",
                    id: id.to_string(),
                })?;
        session.status = status;
        if let Some(who) = solved_by {
            session.solved_by = Some(who.to_string());
        }
        if status == CaptchaStatus::Solved {
            session.solved_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn cache_entries(&self, user_id: &str) -> Result<Vec<FieldAnswerCacheEntry>> {
        Ok(self
            .lock()
            .cache
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn upsert_cache_entry(&self, entry: FieldAnswerCacheEntry) -> Result<()> {
        let mut inner = self.lock();
        let key = (entry.user_id.clone(), entry.question.clone());
        match inner.cache.get_mut(&key) {
            Some(existing) => {
                existing.answer = entry.answer;
                existing.site_domain = entry.site_domain;
                existing.source = entry.source;
                existing.confidence = entry.confidence;
                existing.usage_count = existing.usage_count.max(entry.usage_count);
                existing.updated_at = Utc::now();
            }
            None => {
                inner.cache.insert(key, entry);
            }
        }
        Ok(())
    }

    async fn bump_cache_usage(&self, user_id: &str, question: &str) -> Result<()> {
        let mut inner = self.lock();
        let key = (user_id.to_string(), question.to_string());
        if let Some(entry) = inner.cache.get_mut(&key) {
            entry.usage_count += 1;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn site_patterns(&self, site_domain: &str) -> Result<Vec<SiteFieldPattern>> {
        Ok(self
            .lock()
            .patterns
            .values()
            .filter(|p| p.site_domain == site_domain)
            .cloned()
            .collect())
    }

    async fn record_site_answer(
        &self,
        site_domain: &str,
        field_label: &str,
        field_kind: FieldKind,
        answer: &str,
    ) -> Result<()> {
        let mut inner = self.lock();
        let key = (site_domain.to_string(), field_label.to_string());
        let pattern = inner.patterns.entry(key).or_insert_with(|| SiteFieldPattern {
            site_domain: site_domain.to_string(),
            field_label: field_label.to_string(),
            field_kind,
            answers: HashMap::new(),
            usage_frequency: 0,
        });
        *pattern.answers.entry(answer.to_string()).or_insert(0) += 1;
        pattern.usage_frequency += 1;
        Ok(())
    }

    async fn append_qa_history(&self, record: QaHistoryRecord) -> Result<()> {
        self.lock().history.push(record);
        Ok(())
    }

    async fn qa_history(&self, application_id: &str) -> Result<Vec<QaHistoryRecord>> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|r| r.application_id == application_id)
            .cloned()
            .collect())
    }

    async fn insert_batch(&self, batch: Batch) -> Result<()> {
        self.lock().batches.insert(batch.id.clone(), batch);
        Ok(())
    }

    async fn batch(&self, id: &str) -> Result<Option<Batch>> {
        Ok(self.lock().batches.get(id).cloned())
    }

    async fn bump_batch_counters(&self, batch_id: &str, success: bool) -> Result<()> {
        let mut inner = self.lock();
        if let Some(batch) = inner.batches.get_mut(batch_id) {
            batch.processed += 1;
            if success {
                batch.successful += 1;
            } else {
                batch.failed += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChallengeInfo;

    #[tokio::test]
    async fn queued_ordering_is_priority_then_fifo() {
        let store = MemoryStore::new();
        let mut a = Application::new("u1", "p1", "https://a.example.com/1");
        a.created_at = Utc::now() - chrono::Duration::seconds(3);
        let mut b = Application::new("u1", "p1", "https://a.example.com/2").with_priority(5);
        b.created_at = Utc::now() - chrono::Duration::seconds(2);
        let mut c = Application::new("u1", "p1", "https://a.example.com/3");
        c.created_at = Utc::now() - chrono::Duration::seconds(1);
        let (ida, idb, idc) = (a.id.clone(), b.id.clone(), c.id.clone());
        store.insert_application(a).await.unwrap();
        store.insert_application(b).await.unwrap();
        store.insert_application(c).await.unwrap();

        let order: Vec<String> = store
            .queued_applications(10)
            .await
            .unwrap()
            .into_iter()
            .map(|app| app.id)
            .collect();
        assert_eq!(order, vec![idb, ida, idc]);
    }

    #[tokio::test]
    async fn new_captcha_session_expires_prior_active_one() {
        let store = MemoryStore::new();
        let info = ChallengeInfo {
            kind: "recaptcha".into(),
            page_url: "https://a.example.com/apply".into(),
            screenshot_path: None,
        };
        let first = CaptchaSession::new("app-1", &info, chrono::Duration::seconds(900));
        let second = CaptchaSession::new("app-1", &info, chrono::Duration::seconds(900));
        let first_id = first.id.clone();
        store.insert_captcha_session(first).await.unwrap();
        store.insert_captcha_session(second).await.unwrap();

        let first = store.captcha_session(&first_id).await.unwrap().unwrap();
        assert_eq!(first.status, CaptchaStatus::Expired);
    }

    #[tokio::test]
    async fn pause_and_resume_only_touch_queued_and_paused() {
        let store = MemoryStore::new();
        let queued = Application::new("u1", "p1", "https://a.example.com/1");
        let mut processing = Application::new("u1", "p1", "https://a.example.com/2");
        processing.status = ApplicationStatus::Processing;
        let processing_id = processing.id.clone();
        store.insert_application(queued).await.unwrap();
        store.insert_application(processing).await.unwrap();

        assert_eq!(store.pause_queued("u1").await.unwrap(), 1);
        let still = store.application(&processing_id).await.unwrap().unwrap();
        assert_eq!(still.status, ApplicationStatus::Processing);
        assert_eq!(store.resume_paused("u1").await.unwrap(), 1);
    }
}
