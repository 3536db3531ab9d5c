//! Challenge wait protocol.
//!
//! A bounded, cancellable poll — not a callback. Challenge solving needs an
//! out-of-band human, so the application's own concurrency slot waits while
//! the operator UI flips the session status; the dispatcher's other slots
//! stay free.

use std::sync::atomic::Ordering;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::info;

use crate::engine::EngineCtx;
use crate::error::{EngineError, Result};
use crate::models::{
    Application, ApplicationStatus, CaptchaSession, CaptchaStatus, ChallengeInfo,
};
use crate::services::{dispatch, Notification};

/// Park the application on a fresh challenge session and poll until it is
/// solved, abandoned, timed out or cancelled.
///
/// Returns `Ok(())` only on `solved`, with the application already moved
/// back to `processing`; the caller resumes from the point of interruption.
pub(crate) async fn wait_for_resolution(
    ctx: &EngineCtx,
    application: &Application,
    info: &ChallengeInfo,
    stop: &mut watch::Receiver<bool>,
) -> Result<()> {
    let ttl = chrono::Duration::seconds(ctx.config.captcha_timeout_secs as i64);
    let session = CaptchaSession::new(&application.id, info, ttl);
    let session_id = session.id.clone();

    // Inserting expires any prior active session for this application.
    ctx.store.insert_captcha_session(session.clone()).await?;
    ctx.store
        .link_captcha_session(&application.id, &session_id)
        .await?;
    ctx.store
        .update_application_status(&application.id, ApplicationStatus::CaptchaRequired, None)
        .await?;
    ctx.stats.captcha_required.fetch_add(1, Ordering::SeqCst);

    dispatch(
        ctx.sink.as_ref(),
        Notification::ChallengeAlert { session },
    )
    .await;

    info!(
        "⏳ [{}] waiting for challenge resolution (session {})",
        application.short_id(),
        session_id
    );

    let interval = ctx.config.captcha_check_interval().max(std::time::Duration::from_secs(1));
    let timeout = ctx.config.captcha_timeout();
    let mut waited = std::time::Duration::ZERO;

    while waited < timeout {
        tokio::select! {
            _ = sleep(interval) => {}
            changed = stop.changed() => {
                // A dropped sender counts as a stop signal.
                if changed.is_err() {
                    return Err(EngineError::Cancelled);
                }
            }
        }
        if *stop.borrow() {
            return Err(EngineError::Cancelled);
        }
        waited += interval;

        let current = ctx
            .store
            .captcha_session(&session_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                entity: "captcha session",
                id: session_id.clone(),
            })?;

        match current.status {
            CaptchaStatus::Solved => {
                info!(
                    "✅ [{}] challenge solved{}",
                    application.short_id(),
                    current
                        .solved_by
                        .as_deref()
                        .map(|who| format!(" by {}", who))
                        .unwrap_or_default()
                );
                ctx.store
                    .update_application_status(
                        &application.id,
                        ApplicationStatus::Processing,
                        None,
                    )
                    .await?;
                return Ok(());
            }
            CaptchaStatus::Expired | CaptchaStatus::Skipped => {
                info!(
                    "⏭️ [{}] challenge {}",
                    application.short_id(),
                    current.status.as_str()
                );
                return Err(EngineError::ChallengeAbandoned {
                    status: current.status,
                });
            }
            CaptchaStatus::Pending => {}
        }
    }

    // Timed out while still pending.
    info!("⏰ [{}] challenge timeout", application.short_id());
    ctx.store
        .update_captcha_status(&session_id, CaptchaStatus::Expired, None)
        .await?;
    Err(EngineError::ChallengeTimeout)
}
