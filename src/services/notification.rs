//! Outbound notifications.
//!
//! Fire-and-forget events for operators and users. Delivery failures are
//! logged and never affect engine state.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::Result;
use crate::models::CaptchaSession;

/// Event severity for system alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// One outbound event with its structured metadata.
#[derive(Debug, Clone)]
pub enum Notification {
    /// A challenge needs a human; carries the session an operator must act on.
    ChallengeAlert { session: CaptchaSession },
    ApplicationSuccess {
        application_id: String,
        user_id: String,
    },
    ApplicationFailure {
        application_id: String,
        user_id: String,
        /// Already truncated for display.
        error: String,
    },
    SystemAlert {
        message: String,
        severity: Severity,
    },
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: Notification) -> Result<()>;
}

/// Deliver an event, swallowing sink failures.
pub async fn dispatch(sink: &dyn NotificationSink, notification: Notification) {
    if let Err(e) = sink.deliver(notification).await {
        warn!("⚠️ notification delivery failed: {}", e);
    }
}

/// Sink that writes events to the log. Used when no delivery channel is
/// configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: Notification) -> Result<()> {
        match notification {
            Notification::ChallengeAlert { session } => {
                info!(
                    "🚨 challenge alert: application {} at {} (session {})",
                    session.application_id, session.page_url, session.id
                );
            }
            Notification::ApplicationSuccess {
                application_id,
                user_id,
            } => {
                info!("🎉 application {} completed (user {})", application_id, user_id);
            }
            Notification::ApplicationFailure {
                application_id,
                user_id,
                error,
            } => {
                info!(
                    "❌ application {} failed (user {}): {}",
                    application_id, user_id, error
                );
            }
            Notification::SystemAlert { message, severity } => {
                info!("📣 system alert [{}]: {}", severity.as_str(), message);
            }
        }
        Ok(())
    }
}
