use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an application.
///
/// `paused` is a user-invoked side-state reachable only from `queued`; it is
/// never entered from `processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Queued,
    Paused,
    Processing,
    CaptchaRequired,
    Completed,
    Failed,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Queued => "queued",
            ApplicationStatus::Paused => "paused",
            ApplicationStatus::Processing => "processing",
            ApplicationStatus::CaptchaRequired => "captcha_required",
            ApplicationStatus::Completed => "completed",
            ApplicationStatus::Failed => "failed",
        }
    }

    /// Terminal statuses end processing; the record itself persists.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Completed | ApplicationStatus::Failed)
    }
}

/// One attempt to submit one job posting for one user/profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: String,
    pub user_id: String,
    pub profile_id: String,
    pub batch_id: Option<String>,
    pub job_url: String,
    pub status: ApplicationStatus,
    /// Higher priority dispatches sooner; creation time breaks ties (FIFO).
    pub priority: i32,
    pub error_message: Option<String>,
    pub captcha_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Application {
    pub fn new(user_id: &str, profile_id: &str, job_url: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            profile_id: profile_id.to_string(),
            batch_id: None,
            job_url: job_url.to_string(),
            status: ApplicationStatus::Queued,
            priority: 0,
            error_message: None,
            captcha_session_id: None,
            created_at: Utc::now(),
            processing_started_at: None,
            finished_at: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_batch(mut self, batch_id: &str) -> Self {
        self.batch_id = Some(batch_id.to_string());
        self
    }

    /// Short id prefix for log lines. Char-aware, since ids on externally
    /// inserted records are not guaranteed to be ASCII.
    pub fn short_id(&self) -> String {
        self.id.chars().take(8).collect()
    }
}

/// A named group of applications created together.
///
/// Counters are updated opportunistically from member transitions and are
/// derivable, not authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub total: u32,
    pub processed: u32,
    pub successful: u32,
    pub failed: u32,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(user_id: &str, name: &str, total: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            total,
            processed: 0,
            successful: 0,
            failed: 0,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Application;

    #[test]
    fn short_id_handles_non_ascii_ids() {
        let mut application = Application::new("u1", "p1", "https://a.example.com/1");
        application.id = "заявка-пример-один".to_string();
        assert_eq!(application.short_id(), "заявка-п");

        application.id = "ab".to_string();
        assert_eq!(application.short_id(), "ab");
    }
}
