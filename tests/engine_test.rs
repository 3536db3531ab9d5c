//! End-to-end engine behavior against a scripted browser adapter.
//!
//! All timing tests run on tokio's paused clock, so the 900-second
//! challenge window elapses instantly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use intelliapply::browser::{BrowserSession, SessionFactory};
use intelliapply::error::Result;
use intelliapply::models::profile::PersonalInfo;
use intelliapply::models::{
    Application, ApplicationStatus, CaptchaStatus, ChallengeInfo, FieldKind, FormField,
    ProfileData, ProfileRecord, ScanOutcome, SubmitOutcome,
};
use intelliapply::services::{Notification, NotificationSink};
use intelliapply::store::{MemoryStore, Store};
use intelliapply::{Config, Engine, EngineHandle};

/// Shared state behind every mock session a test hands out.
struct SiteState {
    /// Armed challenge: the next `detect_challenge` call consumes it.
    challenge: AtomicBool,
    fields: Vec<FormField>,
    /// Simulated page load time inside `navigate`.
    page_work: Duration,
    open_sessions: AtomicUsize,
    max_open: AtomicUsize,
    navigations: Mutex<Vec<String>>,
}

impl SiteState {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            challenge: AtomicBool::new(false),
            fields: vec![text_field("First Name", "#first-name")],
            page_work: Duration::from_millis(100),
            open_sessions: AtomicUsize::new(0),
            max_open: AtomicUsize::new(0),
            navigations: Mutex::new(Vec::new()),
        })
    }

    fn with_challenge(self: Arc<Self>) -> Arc<Self> {
        self.challenge.store(true, Ordering::SeqCst);
        self
    }
}

fn text_field(label: &str, handle: &str) -> FormField {
    FormField {
        label: label.to_string(),
        kind: FieldKind::Text,
        is_required: true,
        handle: handle.to_string(),
    }
}

struct MockFactory {
    site: Arc<SiteState>,
}

#[async_trait]
impl SessionFactory for MockFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>> {
        let open = self.site.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.site.max_open.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            site: self.site.clone(),
            closed: false,
        }))
    }
}

struct MockSession {
    site: Arc<SiteState>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.site.navigations.lock().unwrap().push(url.to_string());
        sleep(self.site.page_work).await;
        Ok(())
    }

    async fn scan_fields(&mut self) -> Result<ScanOutcome> {
        Ok(ScanOutcome::Fields(self.site.fields.clone()))
    }

    async fn detect_challenge(&mut self) -> Result<Option<ChallengeInfo>> {
        if self.site.challenge.swap(false, Ordering::SeqCst) {
            Ok(Some(ChallengeInfo {
                kind: "recaptcha".to_string(),
                page_url: "https://jobs.example.com/apply/1".to_string(),
                screenshot_path: None,
            }))
        } else {
            Ok(None)
        }
    }

    async fn fill_field(&mut self, _handle: &str, _value: &str) -> Result<bool> {
        Ok(true)
    }

    async fn submit(&mut self) -> Result<SubmitOutcome> {
        Ok(SubmitOutcome {
            success: true,
            detail: "success keyword: thank you".to_string(),
        })
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.site.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Sink that records every delivered notification.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<Notification> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: Notification) -> Result<()> {
        self.events.lock().unwrap().push(notification);
        Ok(())
    }
}

fn test_config(max_concurrent: usize) -> Config {
    Config {
        max_concurrent,
        field_delay_jitter_ms: 0,
        ..Config::default()
    }
}

fn ada_profile() -> ProfileData {
    ProfileData {
        personal: PersonalInfo {
            first_name: Some("Ada".into()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Seed a user profile plus one queued application per URL; returns the
/// profile id and application ids in insertion order.
async fn seed(store: &MemoryStore, urls: &[&str]) -> (String, Vec<String>) {
    let profile = ProfileRecord::new("u1", "default", ada_profile());
    let profile_id = profile.id.clone();
    store.insert_profile(profile).await.unwrap();

    let mut ids = Vec::new();
    for url in urls {
        let application = Application::new("u1", &profile_id, url);
        ids.push(application.id.clone());
        store.insert_application(application).await.unwrap();
    }
    (profile_id, ids)
}

fn start(
    config: Config,
    store: &Arc<MemoryStore>,
    site: &Arc<SiteState>,
    sink: &Arc<RecordingSink>,
) -> EngineHandle {
    Engine::start(
        config,
        store.clone() as Arc<dyn Store>,
        Arc::new(MockFactory { site: site.clone() }),
        None,
        sink.clone() as Arc<dyn NotificationSink>,
    )
}

#[tokio::test(start_paused = true)]
async fn happy_path_completes_and_learns() {
    let store = Arc::new(MemoryStore::new());
    let site = SiteState::new();
    let sink = Arc::new(RecordingSink::default());
    let (_, ids) = seed(&store, &["https://jobs.example.com/apply/1"]).await;

    let handle = start(test_config(1), &store, &site, &sink);
    sleep(Duration::from_secs(60)).await;

    let status = handle.status();
    assert_eq!(status.successful, 1);
    assert_eq!(status.failed, 0);
    assert_eq!(status.active_sessions, 0);
    handle.stop().await;

    let application = store.application(&ids[0]).await.unwrap().unwrap();
    assert_eq!(application.status, ApplicationStatus::Completed);
    assert!(application.processing_started_at.is_some());
    assert!(application.finished_at.is_some());

    // Completion side effects.
    assert_eq!(store.applications_used("u1").await.unwrap(), 1);
    let history = store.qa_history(&ids[0]).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].answer, "Ada");
    let patterns = store.site_patterns("jobs.example.com").await.unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].field_label, "first name");
    assert!(!store.cache_entries("u1").await.unwrap().is_empty());

    // The adapter was released.
    assert_eq!(site.open_sessions.load(Ordering::SeqCst), 0);

    assert!(sink
        .events()
        .iter()
        .any(|n| matches!(n, Notification::ApplicationSuccess { application_id, .. } if *application_id == ids[0])));
}

#[tokio::test(start_paused = true)]
async fn dispatch_order_is_priority_then_fifo() {
    let store = Arc::new(MemoryStore::new());
    let site = SiteState::new();
    let sink = Arc::new(RecordingSink::default());

    let profile = ProfileRecord::new("u1", "default", ada_profile());
    let profile_id = profile.id.clone();
    store.insert_profile(profile).await.unwrap();

    // A and C share the default priority; B outranks both despite being
    // created between them.
    let urls = [
        "https://jobs.example.com/a",
        "https://jobs.example.com/b",
        "https://jobs.example.com/c",
    ];
    for (i, url) in urls.iter().enumerate() {
        let mut application = Application::new("u1", &profile_id, url);
        if i == 1 {
            application = application.with_priority(5);
        }
        // Force strictly increasing creation times.
        application.created_at += chrono::Duration::milliseconds(i as i64);
        store.insert_application(application).await.unwrap();
    }

    let handle = start(test_config(3), &store, &site, &sink);
    sleep(Duration::from_secs(60)).await;
    handle.stop().await;

    let navigations = site.navigations.lock().unwrap().clone();
    assert_eq!(
        navigations,
        vec![
            "https://jobs.example.com/b".to_string(),
            "https://jobs.example.com/a".to_string(),
            "https://jobs.example.com/c".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_the_configured_ceiling() {
    let store = Arc::new(MemoryStore::new());
    let site = SiteState::new();
    let sink = Arc::new(RecordingSink::default());
    let urls: Vec<String> = (0..5)
        .map(|i| format!("https://jobs.example.com/apply/{}", i))
        .collect();
    let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
    let (_, ids) = seed(&store, &url_refs).await;

    let handle = start(test_config(2), &store, &site, &sink);
    sleep(Duration::from_secs(120)).await;
    handle.stop().await;

    for id in &ids {
        let application = store.application(id).await.unwrap().unwrap();
        assert_eq!(application.status, ApplicationStatus::Completed);
    }
    // Two claimed in the same scan run side by side; never a third.
    assert_eq!(site.max_open.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn unresolved_challenge_times_out_and_fails_the_application() {
    let store = Arc::new(MemoryStore::new());
    let site = SiteState::new().with_challenge();
    let sink = Arc::new(RecordingSink::default());
    let (_, ids) = seed(&store, &["https://jobs.example.com/apply/1"]).await;

    let handle = start(test_config(1), &store, &site, &sink);
    // Nobody solves; the full 900-second window elapses on the paused clock.
    sleep(Duration::from_secs(1000)).await;
    handle.stop().await;

    let application = store.application(&ids[0]).await.unwrap().unwrap();
    assert_eq!(application.status, ApplicationStatus::Failed);
    assert!(application
        .error_message
        .as_deref()
        .unwrap()
        .contains("timeout"));

    let session_id = application.captcha_session_id.as_deref().unwrap();
    let session = store.captcha_session(session_id).await.unwrap().unwrap();
    assert_eq!(session.status, CaptchaStatus::Expired);

    // Session released, challenge alert and failure both delivered.
    assert_eq!(site.open_sessions.load(Ordering::SeqCst), 0);
    let events = sink.events();
    assert!(events
        .iter()
        .any(|n| matches!(n, Notification::ChallengeAlert { .. })));
    assert!(events
        .iter()
        .any(|n| matches!(n, Notification::ApplicationFailure { .. })));
}

#[tokio::test(start_paused = true)]
async fn solved_challenge_is_picked_up_and_processing_resumes() {
    let store = Arc::new(MemoryStore::new());
    let site = SiteState::new().with_challenge();
    let sink = Arc::new(RecordingSink::default());
    let (_, ids) = seed(&store, &["https://jobs.example.com/apply/1"]).await;

    // An operator solves the challenge half a minute in.
    let solver_store = store.clone();
    let application_id = ids[0].clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(30)).await;
        let application = solver_store
            .application(&application_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(application.status, ApplicationStatus::CaptchaRequired);
        let session_id = application.captcha_session_id.unwrap();
        solver_store
            .update_captcha_status(&session_id, CaptchaStatus::Solved, Some("operator"))
            .await
            .unwrap();
    });

    let handle = start(test_config(1), &store, &site, &sink);

    // Solved at t=30; the waiting state machine polls every 10 seconds, so
    // by t=45 the application must have left captcha_required.
    sleep(Duration::from_secs(45)).await;
    let application = store.application(&ids[0]).await.unwrap().unwrap();
    assert_ne!(application.status, ApplicationStatus::CaptchaRequired);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(handle.status().captcha_required, 1);
    handle.stop().await;

    let application = store.application(&ids[0]).await.unwrap().unwrap();
    assert_eq!(application.status, ApplicationStatus::Completed);

    let session_id = application.captcha_session_id.as_deref().unwrap();
    let session = store.captcha_session(session_id).await.unwrap().unwrap();
    assert_eq!(session.status, CaptchaStatus::Solved);
    assert_eq!(session.solved_by.as_deref(), Some("operator"));
    assert!(session.solved_at.is_some());

    assert_eq!(store.applications_used("u1").await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_an_application_waiting_on_a_challenge() {
    let store = Arc::new(MemoryStore::new());
    let site = SiteState::new().with_challenge();
    let sink = Arc::new(RecordingSink::default());
    let (_, ids) = seed(&store, &["https://jobs.example.com/apply/1"]).await;

    let handle = start(test_config(1), &store, &site, &sink);
    sleep(Duration::from_secs(30)).await;
    // Well inside the wait window; stop must not hang for the remainder.
    handle.stop().await;

    let application = store.application(&ids[0]).await.unwrap().unwrap();
    assert_eq!(application.status, ApplicationStatus::Failed);
    assert_eq!(application.error_message.as_deref(), Some("cancelled"));
    assert_eq!(site.open_sessions.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_shuts_the_engine_down() {
    let store = Arc::new(MemoryStore::new());
    let site = SiteState::new().with_challenge();
    let sink = Arc::new(RecordingSink::default());
    let (_, ids) = seed(&store, &["https://jobs.example.com/apply/1"]).await;

    let handle = start(test_config(1), &store, &site, &sink);
    sleep(Duration::from_secs(30)).await;

    // No stop() call: the handle just goes away mid-wait.
    drop(handle);
    sleep(Duration::from_secs(60)).await;

    let application = store.application(&ids[0]).await.unwrap().unwrap();
    assert_eq!(application.status, ApplicationStatus::Failed);
    assert_eq!(application.error_message.as_deref(), Some("cancelled"));
    assert_eq!(site.open_sessions.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn escalated_field_is_skipped_without_failing_the_application() {
    let store = Arc::new(MemoryStore::new());
    let mut site = SiteState::new();
    {
        let state = Arc::get_mut(&mut site).unwrap();
        state.fields = vec![
            text_field("First Name", "#first-name"),
            text_field("Favorite Text Editor", "#editor"),
        ];
    }
    let sink = Arc::new(RecordingSink::default());
    let (_, ids) = seed(&store, &["https://jobs.example.com/apply/1"]).await;

    let handle = start(test_config(1), &store, &site, &sink);
    sleep(Duration::from_secs(60)).await;
    handle.stop().await;

    let application = store.application(&ids[0]).await.unwrap().unwrap();
    assert_eq!(application.status, ApplicationStatus::Completed);

    // Only the resolvable field is recorded anywhere.
    let history = store.qa_history(&ids[0]).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].question, "first name");
    let patterns = store.site_patterns("jobs.example.com").await.unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].field_label, "first name");

    // And a human was asked for the other one.
    assert!(sink.events().iter().any(|n| matches!(
        n,
        Notification::SystemAlert { message, .. } if message.contains("manual input required")
            && message.contains("Favorite Text Editor")
    )));
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_control_a_users_queue() {
    let store = Arc::new(MemoryStore::new());
    let site = SiteState::new();
    let sink = Arc::new(RecordingSink::default());

    let handle = start(test_config(1), &store, &site, &sink);

    // Inserted after start but before the dispatcher's first scan runs.
    let (_, ids) = seed(&store, &["https://jobs.example.com/apply/1"]).await;
    assert_eq!(handle.pause_user("u1").await.unwrap(), 1);

    sleep(Duration::from_secs(60)).await;
    let application = store.application(&ids[0]).await.unwrap().unwrap();
    assert_eq!(application.status, ApplicationStatus::Paused);

    assert_eq!(handle.resume_user("u1").await.unwrap(), 1);
    sleep(Duration::from_secs(60)).await;
    handle.stop().await;

    let application = store.application(&ids[0]).await.unwrap().unwrap();
    assert_eq!(application.status, ApplicationStatus::Completed);
}
