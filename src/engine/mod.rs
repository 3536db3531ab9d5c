//! Submission engine.
//!
//! `Engine::start` wires the collaborators together and returns an
//! `EngineHandle` that owns the dispatcher loop, its cancellation channel
//! and the processing statistics. There is no ambient singleton; stopping
//! the handle stops everything it started.

pub mod captcha;
pub mod dispatcher;
pub mod processor;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::browser::SessionFactory;
use crate::clients::GenerativeClient;
use crate::config::Config;
use crate::error::Result;
use crate::models::CaptchaStatus;
use crate::resolver::FieldResolver;
use crate::services::{CacheWriter, NotificationSink};
use crate::store::Store;

/// Shared collaborators for the dispatcher and its state machines.
pub(crate) struct EngineCtx {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub sessions: Arc<dyn SessionFactory>,
    pub resolver: FieldResolver,
    pub writer: CacheWriter,
    pub sink: Arc<dyn NotificationSink>,
    pub stats: EngineStats,
}

/// Processing counters, updated by the state machines.
#[derive(Default)]
pub struct EngineStats {
    pub total_processed: AtomicU64,
    pub successful: AtomicU64,
    pub failed: AtomicU64,
    pub captcha_required: AtomicU64,
    pub active_sessions: AtomicUsize,
}

/// Point-in-time status snapshot for the operator surface.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub captcha_required: u64,
    pub active_sessions: usize,
    pub uptime_seconds: i64,
    pub success_rate: f64,
}

pub struct Engine;

impl Engine {
    /// Start the dispatcher and return its handle.
    pub fn start(
        config: Config,
        store: Arc<dyn Store>,
        sessions: Arc<dyn SessionFactory>,
        generative: Option<Arc<dyn GenerativeClient>>,
        sink: Arc<dyn NotificationSink>,
    ) -> EngineHandle {
        info!(
            "🤖 starting submission engine (max_concurrent: {})",
            config.max_concurrent
        );

        let ctx = Arc::new(EngineCtx {
            resolver: FieldResolver::new(store.clone(), generative),
            writer: CacheWriter::new(store.clone()),
            config,
            store,
            sessions,
            sink,
            stats: EngineStats::default(),
        });

        let (stop_tx, stop_rx) = watch::channel(false);
        let dispatcher = tokio::spawn(dispatcher::run_forever(ctx.clone(), stop_rx));

        EngineHandle {
            ctx,
            stop_tx,
            dispatcher,
            started_at: Utc::now(),
        }
    }
}

/// Handle to a running engine.
pub struct EngineHandle {
    ctx: Arc<EngineCtx>,
    stop_tx: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
    started_at: DateTime<Utc>,
}

impl EngineHandle {
    /// Cooperative shutdown: flag the stop channel, then wait for in-flight
    /// state machines to finish or observe the flag and fail "cancelled".
    /// All browser sessions are released before this returns.
    pub async fn stop(self) {
        info!("⏹️ stopping submission engine...");
        let _ = self.stop_tx.send(true);
        let _ = self.dispatcher.await;
        info!("⏹️ submission engine stopped");
    }

    pub fn status(&self) -> EngineStatus {
        let stats = &self.ctx.stats;
        let total = stats.total_processed.load(Ordering::Relaxed);
        let successful = stats.successful.load(Ordering::Relaxed);
        EngineStatus {
            running: !self.dispatcher.is_finished(),
            total_processed: total,
            successful,
            failed: stats.failed.load(Ordering::Relaxed),
            captcha_required: stats.captcha_required.load(Ordering::Relaxed),
            active_sessions: stats.active_sessions.load(Ordering::Relaxed),
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
            success_rate: if total > 0 {
                successful as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    // --- operator control surface ---

    /// Bulk pause a user's queued applications. Returns how many moved.
    pub async fn pause_user(&self, user_id: &str) -> Result<usize> {
        self.ctx.store.pause_queued(user_id).await
    }

    /// Bulk resume a user's paused applications back to queued.
    pub async fn resume_user(&self, user_id: &str) -> Result<usize> {
        self.ctx.store.resume_paused(user_id).await
    }

    /// Operator marked a challenge solved; the waiting state machine picks
    /// this up within one polling interval.
    pub async fn solve_captcha(&self, session_id: &str, solver: &str) -> Result<()> {
        self.ctx
            .store
            .update_captcha_status(session_id, CaptchaStatus::Solved, Some(solver))
            .await
    }

    /// Operator skipped a challenge; the application fails.
    pub async fn skip_captcha(&self, session_id: &str, solver: &str) -> Result<()> {
        self.ctx
            .store
            .update_captcha_status(session_id, CaptchaStatus::Skipped, Some(solver))
            .await
    }
}
