use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of an outstanding bot challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptchaStatus {
    Pending,
    Solved,
    Expired,
    Skipped,
}

impl CaptchaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptchaStatus::Pending => "pending",
            CaptchaStatus::Solved => "solved",
            CaptchaStatus::Expired => "expired",
            CaptchaStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, CaptchaStatus::Pending)
    }
}

/// Evidence the adapter collected when it spotted a challenge on the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeInfo {
    /// Which widget tripped detection (e.g. "recaptcha", "hcaptcha").
    pub kind: String,
    pub page_url: String,
    pub screenshot_path: Option<String>,
}

/// One outstanding bot challenge tied to exactly one application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaSession {
    pub id: String,
    pub application_id: String,
    pub page_url: String,
    pub screenshot_path: Option<String>,
    pub status: CaptchaStatus,
    /// Operator identity, once someone marks the session solved/skipped.
    pub solved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub solved_at: Option<DateTime<Utc>>,
}

impl CaptchaSession {
    pub fn new(application_id: &str, info: &ChallengeInfo, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            application_id: application_id.to_string(),
            page_url: info.page_url.clone(),
            screenshot_path: info.screenshot_path.clone(),
            status: CaptchaStatus::Pending,
            solved_by: None,
            created_at: now,
            expires_at: now + ttl,
            solved_at: None,
        }
    }
}
