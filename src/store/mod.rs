//! Persistence collaborator.
//!
//! The engine only needs get-by-status-ordered, by-id get/update, single-row
//! upserts and a few counters; no transactions or joins are assumed. All
//! writes are keyed by primary id, so the store's own atomic row operations
//! are the only locking the engine relies on.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Application, ApplicationStatus, Batch, CaptchaSession, CaptchaStatus, FieldAnswerCacheEntry,
    FieldKind, ProfileRecord, QaHistoryRecord, SiteFieldPattern,
};

pub use memory::MemoryStore;

#[async_trait]
pub trait Store: Send + Sync {
    // --- applications ---

    /// Queued applications, ordered by priority desc then creation time asc
    /// (FIFO tie-break), at most `limit`.
    async fn queued_applications(&self, limit: usize) -> Result<Vec<Application>>;

    async fn application(&self, id: &str) -> Result<Option<Application>>;

    async fn insert_application(&self, application: Application) -> Result<()>;

    /// Update lifecycle status; `error` is persisted verbatim on `failed`.
    /// Timestamps (processing started / finished) follow the transition.
    async fn update_application_status(
        &self,
        id: &str,
        status: ApplicationStatus,
        error: Option<&str>,
    ) -> Result<()>;

    async fn link_captcha_session(&self, application_id: &str, session_id: &str) -> Result<()>;

    /// Bulk pause: queued → paused for one user. Returns how many moved.
    async fn pause_queued(&self, user_id: &str) -> Result<usize>;

    /// Bulk resume: paused → queued for one user. Returns how many moved.
    async fn resume_paused(&self, user_id: &str) -> Result<usize>;

    // --- profiles & users ---

    async fn profile(&self, id: &str) -> Result<Option<ProfileRecord>>;

    async fn insert_profile(&self, profile: ProfileRecord) -> Result<()>;

    /// Per-user usage counter. Concurrent increments under M>1 are accepted
    /// as approximate.
    async fn increment_applications_used(&self, user_id: &str) -> Result<()>;

    async fn applications_used(&self, user_id: &str) -> Result<u32>;

    // --- captcha sessions ---

    /// Insert a new session. Any prior non-terminal session for the same
    /// application is marked expired: exactly one active session per
    /// application.
    async fn insert_captcha_session(&self, session: CaptchaSession) -> Result<()>;

    async fn captcha_session(&self, id: &str) -> Result<Option<CaptchaSession>>;

    async fn update_captcha_status(
        &self,
        id: &str,
        status: CaptchaStatus,
        solved_by: Option<&str>,
    ) -> Result<()>;

    // --- knowledge ---

    async fn cache_entries(&self, user_id: &str) -> Result<Vec<FieldAnswerCacheEntry>>;

    /// Upsert by (user_id, question). An update keeps the higher usage_count.
    async fn upsert_cache_entry(&self, entry: FieldAnswerCacheEntry) -> Result<()>;

    async fn bump_cache_usage(&self, user_id: &str, question: &str) -> Result<()>;

    async fn site_patterns(&self, site_domain: &str) -> Result<Vec<SiteFieldPattern>>;

    /// Additive upsert into the (site_domain, field_label) pattern multiset.
    async fn record_site_answer(
        &self,
        site_domain: &str,
        field_label: &str,
        field_kind: FieldKind,
        answer: &str,
    ) -> Result<()>;

    async fn append_qa_history(&self, record: QaHistoryRecord) -> Result<()>;

    async fn qa_history(&self, application_id: &str) -> Result<Vec<QaHistoryRecord>>;

    // --- batches ---

    async fn insert_batch(&self, batch: Batch) -> Result<()>;

    async fn batch(&self, id: &str) -> Result<Option<Batch>>;

    /// Opportunistic counter bump on a member's terminal transition.
    async fn bump_batch_counters(&self, batch_id: &str, success: bool) -> Result<()>;
}
