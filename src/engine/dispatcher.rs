//! Queue dispatcher.
//!
//! One loop: claim up to free-slot-many queued applications per scan,
//! ordered priority desc then FIFO, and launch one state machine per claim.
//! Scan errors are logged and the loop continues; it never takes the
//! process down.

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info};

use crate::engine::{processor, EngineCtx};
use crate::error::Result;
use crate::models::ApplicationStatus;
use crate::services::{dispatch, Notification};
use crate::services::notification::Severity;

pub(crate) async fn run_forever(ctx: Arc<EngineCtx>, mut stop: watch::Receiver<bool>) {
    info!("🚀 dispatcher started (scan every {}s)", ctx.config.scan_interval_secs);
    dispatch(
        ctx.sink.as_ref(),
        Notification::SystemAlert {
            message: "submission engine started".to_string(),
            severity: Severity::Info,
        },
    )
    .await;

    let slots = Arc::new(Semaphore::new(ctx.config.max_concurrent.max(1)));
    let mut machines: JoinSet<()> = JoinSet::new();

    loop {
        if *stop.borrow() {
            break;
        }

        // Reap finished state machines so the set does not grow unbounded.
        while machines.try_join_next().is_some() {}

        if let Err(e) = scan_once(&ctx, &slots, &mut machines, &stop).await {
            error!("❌ queue scan error: {}", e);
        }

        tokio::select! {
            _ = sleep(ctx.config.scan_interval()) => {}
            changed = stop.changed() => {
                // A dropped sender means the handle is gone; shut down
                // instead of spinning on a closed channel.
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("⏳ waiting for {} in-flight application(s)...", machines.len());
    while machines.join_next().await.is_some() {}

    dispatch(
        ctx.sink.as_ref(),
        Notification::SystemAlert {
            message: "submission engine stopped".to_string(),
            severity: Severity::Info,
        },
    )
    .await;
}

async fn scan_once(
    ctx: &Arc<EngineCtx>,
    slots: &Arc<Semaphore>,
    machines: &mut JoinSet<()>,
    stop: &watch::Receiver<bool>,
) -> Result<()> {
    let free = slots.available_permits();
    if free == 0 {
        return Ok(());
    }

    let claimable = ctx.store.queued_applications(free).await?;
    if claimable.is_empty() {
        return Ok(());
    }
    info!("📋 found {} application(s) to process", claimable.len());

    for application in claimable {
        let permit = match slots.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => break,
        };

        // Claim = transition: marking `processing` here means no later scan
        // can hand the same application to a second state machine.
        ctx.store
            .update_application_status(&application.id, ApplicationStatus::Processing, None)
            .await?;

        let ctx = ctx.clone();
        let stop = stop.clone();
        machines.spawn(async move {
            let _permit = permit;
            processor::process(ctx, application, stop).await;
        });
    }

    Ok(())
}
