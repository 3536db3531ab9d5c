//! Application state machine.
//!
//! Routes one claimed application through navigation → field
//! resolution/fill → (optional challenge wait) → submission → terminal
//! state. The browser session is released on every path.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::engine::{captcha, EngineCtx};
use crate::error::{EngineError, Result};
use crate::models::{
    site_domain, Application, ApplicationStatus, ProfileData, ScanOutcome,
};
use crate::resolver::{normalize_label, FieldQuery, Resolution};
use crate::services::cache_writer::AnsweredField;
use crate::services::notification::Severity;
use crate::services::{dispatch, Notification};

/// Drive one application to a terminal state. Never panics the dispatcher;
/// every outcome lands in `completed` or `failed`.
pub(crate) async fn process(
    ctx: Arc<EngineCtx>,
    application: Application,
    mut stop: watch::Receiver<bool>,
) {
    ctx.stats.active_sessions.fetch_add(1, Ordering::SeqCst);
    info!(
        "🎯 processing application {} ({})",
        application.short_id(),
        application.job_url
    );

    let outcome = run(&ctx, &application, &mut stop).await;
    match outcome {
        Ok(answered) => handle_completed(&ctx, &application, answered).await,
        Err(e) => handle_failed(&ctx, &application, e).await,
    }

    ctx.stats.active_sessions.fetch_sub(1, Ordering::SeqCst);
}

async fn run(
    ctx: &EngineCtx,
    application: &Application,
    stop: &mut watch::Receiver<bool>,
) -> Result<Vec<AnsweredField>> {
    // The dispatcher already moved this application to `processing`.
    let profile = ctx
        .store
        .profile(&application.profile_id)
        .await?
        .ok_or_else(|| EngineError::NotFound {
            entity: "profile",
            id: application.profile_id.clone(),
        })?;

    checkpoint(stop)?;
    let mut session = ctx.sessions.open().await?;

    let result = drive(ctx, application, &profile.data, session.as_mut(), stop).await;

    // Guaranteed cleanup: the adapter is released whatever happened above.
    session.close().await;
    result
}

async fn drive(
    ctx: &EngineCtx,
    application: &Application,
    profile: &ProfileData,
    session: &mut dyn BrowserSession,
    stop: &mut watch::Receiver<bool>,
) -> Result<Vec<AnsweredField>> {
    session.navigate(&application.job_url).await?;
    checkpoint(stop)?;

    // Post-navigation challenge check.
    if let Some(info) = session.detect_challenge().await? {
        captcha::wait_for_resolution(ctx, application, &info, stop).await?;
    }

    let fields = match session.scan_fields().await? {
        ScanOutcome::Fields(fields) => fields,
        ScanOutcome::ChallengeDetected(info) => {
            captcha::wait_for_resolution(ctx, application, &info, stop).await?;
            match session.scan_fields().await? {
                ScanOutcome::Fields(fields) => fields,
                ScanOutcome::ChallengeDetected(_) => {
                    return Err(EngineError::adapter(
                        "scan",
                        "challenge still present after solve",
                    ));
                }
            }
        }
    };
    if fields.is_empty() {
        return Err(EngineError::NoFormFields);
    }
    info!(
        "📝 [{}] found {} form fields to fill",
        application.short_id(),
        fields.len()
    );

    let domain = site_domain(&application.job_url);
    let mut answered = Vec::new();

    // Strictly in scan order.
    for field in &fields {
        checkpoint(stop)?;

        let query = FieldQuery {
            application_id: &application.id,
            user_id: &application.user_id,
            label: &field.label,
            kind: field.kind,
            site_domain: domain.as_deref(),
            profile,
        };

        match ctx.resolver.resolve(&query).await? {
            Resolution::Answer { text, source } => {
                if session.fill_field(&field.handle, &text).await? {
                    answered.push(AnsweredField {
                        question: normalize_label(&field.label),
                        answer: text,
                        kind: field.kind,
                        source,
                    });
                } else {
                    warn!(
                        "⚠️ [{}] field refused value: {}",
                        application.short_id(),
                        field.label
                    );
                }
            }
            Resolution::Escalate => {
                // One unresolved field is not a failure; flag it for a
                // human and keep going.
                dispatch(
                    ctx.sink.as_ref(),
                    Notification::SystemAlert {
                        message: format!(
                            "manual input required: \"{}\" on {} (application {})",
                            field.label,
                            domain.as_deref().unwrap_or("unknown site"),
                            application.id
                        ),
                        severity: Severity::Warning,
                    },
                )
                .await;
            }
        }

        pacing_delay(&ctx.config).await;
    }

    checkpoint(stop)?;

    // Post-fill challenge check.
    if let Some(info) = session.detect_challenge().await? {
        captcha::wait_for_resolution(ctx, application, &info, stop).await?;
    }

    let outcome = session.submit().await?;
    if outcome.success {
        info!(
            "✅ [{}] submitted ({})",
            application.short_id(),
            outcome.detail
        );
        Ok(answered)
    } else {
        Err(EngineError::SubmitRejected {
            detail: outcome.detail,
        })
    }
}

async fn handle_completed(
    ctx: &EngineCtx,
    application: &Application,
    answered: Vec<AnsweredField>,
) {
    if let Err(e) = ctx
        .store
        .update_application_status(&application.id, ApplicationStatus::Completed, None)
        .await
    {
        warn!("⚠️ failed to persist completed status: {}", e);
    }

    // Approximate under concurrency; accepted.
    if let Err(e) = ctx
        .store
        .increment_applications_used(&application.user_id)
        .await
    {
        warn!("⚠️ failed to bump usage counter: {}", e);
    }

    if let Some(batch_id) = &application.batch_id {
        if let Err(e) = ctx.store.bump_batch_counters(batch_id, true).await {
            warn!("⚠️ failed to bump batch counters: {}", e);
        }
    }

    // Close the learning loop: site patterns learn from answers the site
    // actually accepted.
    if let Some(domain) = site_domain(&application.job_url) {
        if let Err(e) = ctx.writer.record_site_answers(&domain, &answered).await {
            warn!("⚠️ failed to record site patterns: {}", e);
        }
    }

    dispatch(
        ctx.sink.as_ref(),
        Notification::ApplicationSuccess {
            application_id: application.id.clone(),
            user_id: application.user_id.clone(),
        },
    )
    .await;

    ctx.stats.successful.fetch_add(1, Ordering::SeqCst);
    ctx.stats.total_processed.fetch_add(1, Ordering::SeqCst);
    info!("🎉 application {} completed", application.short_id());
}

async fn handle_failed(ctx: &EngineCtx, application: &Application, error: EngineError) {
    let message = error.user_message();

    if let Err(e) = ctx
        .store
        .update_application_status(&application.id, ApplicationStatus::Failed, Some(&message))
        .await
    {
        warn!("⚠️ failed to persist failed status: {}", e);
    }

    if let Some(batch_id) = &application.batch_id {
        if let Err(e) = ctx.store.bump_batch_counters(batch_id, false).await {
            warn!("⚠️ failed to bump batch counters: {}", e);
        }
    }

    dispatch(
        ctx.sink.as_ref(),
        Notification::ApplicationFailure {
            application_id: application.id.clone(),
            user_id: application.user_id.clone(),
            error: message.clone(),
        },
    )
    .await;

    ctx.stats.failed.fetch_add(1, Ordering::SeqCst);
    ctx.stats.total_processed.fetch_add(1, Ordering::SeqCst);
    info!(
        "❌ application {} failed: {}",
        application.short_id(),
        message
    );
}

/// Cooperative cancellation point.
fn checkpoint(stop: &watch::Receiver<bool>) -> Result<()> {
    if *stop.borrow() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}

/// Small fixed+jittered pause between fills, pacing the session like a
/// human typist rather than a script.
async fn pacing_delay(config: &Config) {
    let jitter = if config.field_delay_jitter_ms > 0 {
        rand::thread_rng().gen_range(0..config.field_delay_jitter_ms)
    } else {
        0
    };
    sleep(Duration::from_millis(config.field_delay_ms + jitter)).await;
}
