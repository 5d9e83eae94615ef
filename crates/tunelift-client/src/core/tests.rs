//! Scenario tests for the orchestrator.
//!
//! Time is paused, so timers fire as soon as the loop is otherwise idle.  The
//! backend and the authorization surface are scripted in memory.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use tunelift_proto::api::{
    ActionResponse, AuthSignal, AuthStatus, MigrationStatus, PlaylistEntry, Service,
};
use tunelift_proto::config::Config;

use super::*;
use crate::auth_flow::POPUPS_BLOCKED;
use crate::migration::POLL_FAILED;
use crate::playlists::LoadError;
use crate::surface::{BrowserSurface, SurfaceError, SurfaceHandle};

// ── mocks ─────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockBackend {
    auth: Mutex<AuthStatus>,
    /// Served ahead of `auth`, one per request.
    auth_errors: Mutex<VecDeque<ApiError>>,
    statuses: Mutex<VecDeque<Result<MigrationStatus, ApiError>>>,
    start_error: Mutex<Option<ApiError>>,
    playlists: Mutex<Option<Result<Vec<PlaylistEntry>, ApiError>>>,
    auth_calls: AtomicUsize,
    start_calls: AtomicUsize,
    status_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl MockBackend {
    fn script(&self, statuses: Vec<Result<MigrationStatus, ApiError>>) {
        *self.statuses.lock().unwrap() = statuses.into();
    }
}

fn running(progress: f64) -> Result<MigrationStatus, ApiError> {
    Ok(MigrationStatus {
        progress,
        description: format!("Matching tracks ({}%)", progress),
        running: true,
        result: None,
        error: None,
    })
}

#[async_trait]
impl Backend for MockBackend {
    async fn auth_status(&self) -> Result<AuthStatus, ApiError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        match self.auth_errors.lock().unwrap().pop_front() {
            Some(e) => Err(e),
            None => Ok(*self.auth.lock().unwrap()),
        }
    }

    async fn playlists(&self, _platform: Service) -> Result<Vec<PlaylistEntry>, ApiError> {
        self.playlists
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn start_migration(&self, _playlist_id: &str) -> Result<(), ApiError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        match self.start_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn migration_status(&self) -> Result<MigrationStatus, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| running(0.0))
    }

    async fn logout(&self, _service: Service) -> Result<ActionResponse, ApiError> {
        Ok(ActionResponse {
            success: true,
            message: None,
            error: None,
        })
    }

    async fn refresh_token(&self, _service: Service) -> Result<ActionResponse, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ActionResponse {
            success: true,
            message: Some("YouTube token refreshed successfully".to_string()),
            error: None,
        })
    }
}

#[derive(Clone, Default)]
struct MockSurface {
    blocked: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    opened: Arc<Mutex<Vec<String>>>,
}

struct MockWindow {
    closed: Arc<AtomicBool>,
}

impl SurfaceHandle for MockWindow {
    fn is_closed(&mut self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl AuthSurface for MockSurface {
    fn open(&self, url: &str) -> Result<Box<dyn SurfaceHandle>, SurfaceError> {
        if self.blocked.load(Ordering::SeqCst) {
            return Err(SurfaceError::NoOpener);
        }
        self.opened.lock().unwrap().push(url.to_string());
        Ok(Box::new(MockWindow {
            closed: Arc::clone(&self.closed),
        }))
    }
}

// ── harness ───────────────────────────────────────────────────────────────────

struct Harness {
    orch: Orchestrator,
    rx: mpsc::Receiver<Event>,
    backend: Arc<MockBackend>,
    surface: MockSurface,
}

impl Harness {
    fn new() -> Self {
        Self::with(Config::default(), None)
    }

    /// `surfaces` replaces the scripted `MockSurface` when given.
    fn with(config: Config, surfaces: Option<Box<dyn AuthSurface>>) -> Self {
        let (tx, rx) = mpsc::channel(256);
        let backend = Arc::new(MockBackend::default());
        let surface = MockSurface::default();
        let orch = Orchestrator::new(
            &config,
            Arc::clone(&backend) as Arc<dyn Backend>,
            surfaces.unwrap_or_else(|| Box::new(surface.clone())),
            tx,
        );
        Self {
            orch,
            rx,
            backend,
            surface,
        }
    }

    fn send(&mut self, cmd: Command) {
        let _ = self.orch.handle(Event::Command(cmd));
    }

    async fn next(&mut self, within: Duration) -> Option<Event> {
        tokio::time::timeout(within, self.rx.recv()).await.ok().flatten()
    }

    /// Handle events until `done` holds.
    async fn run_until(&mut self, done: impl Fn(&Orchestrator) -> bool) {
        for _ in 0..500 {
            if done(&self.orch) {
                return;
            }
            match self.next(Duration::from_secs(60)).await {
                Some(event) => {
                    let _ = self.orch.handle(event);
                }
                None => panic!("orchestrator went idle before the condition held"),
            }
        }
        panic!("condition never held");
    }

    /// Handle everything that happens within the next `window`.
    async fn drain(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.rx.recv()).await {
            let _ = self.orch.handle(event);
        }
    }

    fn job(&self) -> MigrationJob {
        self.orch.migration.job().expect("a submitted job")
    }
}

fn auth_complete(flow: Option<u64>) -> Event {
    Event::AuthSignal(AuthSignal::complete(flow))
}

// ── authorization flows ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_second_flow_replaces_first() {
    let mut h = Harness::new();
    h.send(Command::Connect(Service::Spotify));
    h.send(Command::Connect(Service::YouTube));

    assert_eq!(h.surface.opened.lock().unwrap().len(), 2);
    assert_eq!(h.orch.cx.signals.len(), 1);
    assert_eq!(h.orch.cx.timers.active(TimerKind::FlowFallback), 1);
    assert_eq!(
        h.orch.flows.active_flow(),
        Some((2, Service::YouTube))
    );
}

#[tokio::test(start_paused = true)]
async fn test_signal_then_close_refreshes_once() {
    let mut h = Harness::new();
    h.send(Command::Connect(Service::Spotify));
    let _ = h.orch.handle(auth_complete(None));
    h.surface.closed.store(true, Ordering::SeqCst);
    let _ = h.orch.handle(auth_complete(None));

    h.drain(Duration::from_secs(10)).await;

    assert_eq!(h.orch.flows.completions(), 1);
    assert_eq!(h.orch.auth.refreshes(), 1);
    assert_eq!(h.backend.auth_calls.load(Ordering::SeqCst), 1);
    assert!(h.orch.flows.active_flow().is_none());
    assert!(h.orch.cx.timers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_close_then_signal_refreshes_once() {
    let mut h = Harness::new();
    *h.backend.auth.lock().unwrap() = AuthStatus {
        spotify: true,
        youtube: false,
    };
    h.send(Command::Connect(Service::Spotify));
    h.surface.closed.store(true, Ordering::SeqCst);

    h.run_until(|o| o.flows.completions() == 1).await;
    let _ = h.orch.handle(auth_complete(None));
    assert!(h.orch.flows.settle_pending());

    h.drain(Duration::from_secs(10)).await;

    assert_eq!(h.orch.flows.completions(), 1);
    assert_eq!(h.backend.auth_calls.load(Ordering::SeqCst), 1);
    assert!(h.orch.auth.snapshot().spotify);
}

#[tokio::test(start_paused = true)]
async fn test_signal_for_superseded_flow_is_ignored() {
    let mut h = Harness::new();
    h.send(Command::Connect(Service::YouTube));
    h.send(Command::Reauthorize(Service::YouTube));

    let _ = h.orch.handle(auth_complete(Some(1)));
    assert_eq!(h.orch.flows.completions(), 0);

    let _ = h.orch.handle(auth_complete(Some(2)));
    assert_eq!(h.orch.flows.completions(), 1);
    assert!(h.orch.cx.signals.is_empty());

    let opened = h.surface.opened.lock().unwrap().clone();
    assert!(opened[0].ends_with("/auth/youtube"));
    assert!(opened[1].ends_with("/api/auth/youtube/force"));
}

#[tokio::test(start_paused = true)]
async fn test_blocked_surface_creates_no_flow() {
    let mut h = Harness::new();
    h.surface.blocked.store(true, Ordering::SeqCst);
    h.send(Command::Connect(Service::Spotify));

    assert!(h.orch.flows.active_flow().is_none());
    assert!(h.orch.cx.signals.is_empty());
    assert_eq!(h.orch.cx.timers.active(TimerKind::FlowFallback), 0);
    let alert = h.orch.cx.alerts.current().expect("an alert");
    assert_eq!(alert.kind, AlertKind::Error);
    assert_eq!(alert.message, POPUPS_BLOCKED);
}

#[tokio::test(start_paused = true)]
async fn test_token_refresh_paths() {
    let mut h = Harness::new();

    // Spotify has no refresh endpoint: a forced re-authorization starts.
    h.send(Command::RefreshToken(Service::Spotify));
    assert_eq!(h.orch.flows.active_flow(), Some((1, Service::Spotify)));
    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 0);

    h.send(Command::RefreshToken(Service::YouTube));
    h.run_until(|o| o.cx.alerts.current().is_some()).await;
    assert_eq!(h.backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.orch.cx.alerts.current().map(|a| a.kind),
        Some(AlertKind::Success)
    );
    assert_eq!(h.orch.auth.refreshes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_completion_merges_into_one_settle() {
    let mut h = Harness::new();
    h.send(Command::Connect(Service::Spotify));
    let _ = h.orch.handle(auth_complete(None));
    assert!(h.orch.flows.settle_pending());

    h.drain(Duration::from_millis(500)).await;
    h.send(Command::Connect(Service::YouTube));
    let _ = h.orch.handle(auth_complete(None));
    assert_eq!(h.orch.flows.completions(), 2);
    assert_eq!(h.orch.cx.timers.active(TimerKind::FlowSettle), 1);

    // The first settle would have fired by now.
    h.drain(Duration::from_millis(700)).await;
    assert_eq!(h.backend.auth_calls.load(Ordering::SeqCst), 0);
    assert!(h.orch.flows.settle_pending());

    h.drain(Duration::from_secs(3)).await;
    assert_eq!(h.backend.auth_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.orch.auth.refreshes(), 1);
    assert!(!h.orch.flows.settle_pending());
    assert!(h.orch.cx.timers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_detached_opener_waits_for_signal() {
    let surfaces = Box::new(BrowserSurface::detached(vec!["true".to_string()]));
    let mut h = Harness::with(Config::default(), Some(surfaces));
    h.send(Command::Connect(Service::Spotify));
    assert_eq!(h.orch.flows.active_flow(), Some((1, Service::Spotify)));

    // Several fallback ticks pass after the opener has exited.
    h.drain(Duration::from_secs(3)).await;
    assert_eq!(h.orch.flows.active_flow(), Some((1, Service::Spotify)));
    assert_eq!(h.orch.flows.completions(), 0);
    assert_eq!(h.orch.cx.signals.len(), 1);

    let _ = h.orch.handle(auth_complete(None));
    assert_eq!(h.orch.flows.completions(), 1);
    h.drain(Duration::from_secs(3)).await;
    assert_eq!(h.backend.auth_calls.load(Ordering::SeqCst), 1);
    assert!(h.orch.flows.active_flow().is_none());
    assert!(h.orch.cx.timers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flow_urls_join_base_with_trailing_slash() {
    let mut config = Config::default();
    config.backend.base_url = "http://backend.local:5000/".to_string();
    let surface = MockSurface::default();
    let mut h = Harness::with(config, Some(Box::new(surface.clone())));
    h.send(Command::Connect(Service::Spotify));
    h.send(Command::Reauthorize(Service::YouTube));

    assert_eq!(
        *surface.opened.lock().unwrap(),
        vec![
            "http://backend.local:5000/auth/spotify".to_string(),
            "http://backend.local:5000/api/auth/youtube/force".to_string(),
        ]
    );
}

// ── alerts ────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_alert_replacement_and_expiry() {
    let mut h = Harness::new();
    h.orch.cx.alert(AlertKind::Error, "A");
    tokio::time::sleep(Duration::from_secs(2)).await;
    h.orch.cx.alert(AlertKind::Success, "B");

    assert_eq!(
        h.orch.cx.alerts.current(),
        Some(Alert {
            kind: AlertKind::Success,
            message: "B".to_string()
        })
    );
    assert_eq!(h.orch.cx.timers.active(TimerKind::AlertExpiry), 1);

    // The first alert's expiry time passes without clearing "B".
    h.drain(Duration::from_secs(4)).await;
    assert!(h.orch.cx.alerts.current().is_some());

    h.drain(Duration::from_secs(2)).await;
    assert!(h.orch.cx.alerts.current().is_none());
    assert!(h.orch.cx.timers.is_empty());
}

// ── auth poller ───────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_poller_restart_keeps_one_timer() {
    let mut h = Harness::new();
    h.orch.start();
    h.run_until(|o| o.views().auth_health.borrow().last_success.is_some())
        .await;

    h.orch.auth.stop(&mut h.orch.cx);
    assert_eq!(h.orch.cx.timers.active(TimerKind::AuthRefresh), 0);
    h.orch.start();
    assert_eq!(h.orch.cx.timers.active(TimerKind::AuthRefresh), 1);
    assert_eq!(h.orch.auth.refreshes(), 2);

    h.drain(Duration::from_millis(5500)).await;
    assert_eq!(h.orch.auth.refreshes(), 3);
    assert!(h.orch.auth.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_failed_refresh_keeps_snapshot_and_retries() {
    let mut h = Harness::new();
    *h.backend.auth.lock().unwrap() = AuthStatus {
        spotify: true,
        youtube: false,
    };
    let health = h.orch.views().auth_health;
    h.orch.start();
    h.run_until(|o| o.auth.snapshot().spotify).await;
    assert!(health.borrow().failing().is_none());

    h.backend
        .auth_errors
        .lock()
        .unwrap()
        .push_back(ApiError::Network("connection refused".to_string()));
    h.drain(Duration::from_millis(5500)).await;

    assert_eq!(h.orch.auth.refreshes(), 2);
    assert!(h.orch.auth.snapshot().spotify);
    assert!(!h.orch.auth.snapshot().youtube);
    let error = health.borrow().failing().map(|(_, message)| message.clone());
    assert!(error.is_some_and(|m| m.contains("connection refused")));
    assert_eq!(health.borrow().failures, 1);

    h.drain(Duration::from_secs(5)).await;
    assert_eq!(h.orch.auth.refreshes(), 3);
    assert_eq!(h.backend.auth_calls.load(Ordering::SeqCst), 3);
    assert!(health.borrow().last_error.is_some());
    assert!(health.borrow().failing().is_none());
    assert!(h.orch.auth.is_running());
}

// ── migration ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_poll_until_result() {
    let mut h = Harness::new();
    h.backend.script(vec![
        running(10.0),
        running(55.0),
        Ok(MigrationStatus {
            progress: 100.0,
            description: "Done".to_string(),
            running: false,
            result: Some("PL123".to_string()),
            error: None,
        }),
    ]);

    h.send(Command::Migrate("X".to_string()));
    let job = h.job();
    assert_eq!(job.description, "Starting migration...");
    assert_eq!(job.progress, 0);
    assert!(job.running);

    h.run_until(|o| o.migration.job().map_or(false, |j| j.is_terminal()))
        .await;
    h.drain(Duration::from_secs(5)).await;

    let job = h.job();
    assert_eq!(job.result.as_deref(), Some("PL123"));
    assert_eq!(job.error, None);
    assert_eq!(job.progress, 100);
    assert!(!h.orch.migration.is_polling());
    assert_eq!(h.orch.migration.ticks(), 3);
    assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.orch.cx.timers.active(TimerKind::MigrationPoll), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_sets_error_only() {
    let mut h = Harness::new();
    h.backend.script(vec![Ok(MigrationStatus {
        progress: 40.0,
        description: String::new(),
        running: false,
        result: None,
        error: Some("quota exceeded".to_string()),
    })]);

    h.send(Command::Migrate("X".to_string()));
    h.run_until(|o| o.migration.job().map_or(false, |j| j.is_terminal()))
        .await;

    let job = h.job();
    assert_eq!(job.error.as_deref(), Some("quota exceeded"));
    assert_eq!(job.result, None);
    assert!(!h.orch.migration.is_polling());
    assert_eq!(h.orch.migration.ticks(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resubmission_keeps_one_poller() {
    let mut h = Harness::new();
    h.send(Command::Migrate("X".to_string()));
    h.send(Command::Migrate("X".to_string()));

    h.run_until(|o| o.migration.is_polling()).await;
    h.drain(Duration::from_millis(2500)).await;

    assert_eq!(h.backend.start_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.orch.cx.timers.active(TimerKind::MigrationPoll), 1);
    assert_eq!(h.orch.migration.ticks(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_playlist_id_is_ignored() {
    let mut h = Harness::new();
    h.send(Command::Migrate("   ".to_string()));
    assert!(h.orch.migration.job().is_none());
    assert_eq!(h.orch.cx.requests.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_start_does_not_poll() {
    let mut h = Harness::new();
    *h.backend.start_error.lock().unwrap() =
        Some(ApiError::Rejected("Migration already in progress".to_string()));
    h.send(Command::Migrate("X".to_string()));
    h.drain(Duration::from_secs(3)).await;

    let job = h.job();
    assert_eq!(job.error.as_deref(), Some("Migration already in progress"));
    assert!(!job.running);
    assert!(!h.orch.migration.is_polling());
    assert_eq!(h.backend.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_transport_failure_is_terminal() {
    let mut h = Harness::new();
    h.backend.script(vec![
        running(20.0),
        Err(ApiError::Network("connection reset".to_string())),
    ]);
    h.send(Command::Migrate("X".to_string()));
    h.run_until(|o| o.migration.job().map_or(false, |j| j.is_terminal()))
        .await;

    let job = h.job();
    assert_eq!(job.error.as_deref(), Some(POLL_FAILED));
    assert_eq!(job.progress, 20);
    assert!(!h.orch.migration.is_polling());
}

// ── playlists ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_playlist_failures_are_classified() {
    let mut h = Harness::new();
    *h.backend.playlists.lock().unwrap() = Some(Err(ApiError::Status {
        status: 401,
        message: "Spotify not properly authorized".to_string(),
    }));
    h.send(Command::LoadPlaylists(Service::Spotify));
    assert!(h.orch.playlists.view(Service::Spotify).loading);
    h.run_until(|o| !o.playlists.view(Service::Spotify).loading)
        .await;
    assert_eq!(
        h.orch.playlists.view(Service::Spotify).error,
        Some(LoadError::AuthRequired(Service::Spotify))
    );

    *h.backend.playlists.lock().unwrap() =
        Some(Err(ApiError::Network("connection refused".to_string())));
    h.send(Command::LoadPlaylists(Service::Spotify));
    h.run_until(|o| !o.playlists.view(Service::Spotify).loading)
        .await;
    let view = h.orch.playlists.view(Service::Spotify);
    assert_eq!(view.error, Some(LoadError::Network));
    assert!(view.playlists.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_playlists_loaded() {
    let mut h = Harness::new();
    *h.backend.playlists.lock().unwrap() = Some(Ok(vec![PlaylistEntry {
        id: "37i9".to_string(),
        name: "Road Trip".to_string(),
        track_count: 42,
        description: None,
    }]));
    h.send(Command::LoadPlaylists(Service::Spotify));
    h.run_until(|o| !o.playlists.view(Service::Spotify).loading)
        .await;

    let view = h.orch.playlists.view(Service::Spotify);
    assert_eq!(view.error, None);
    assert_eq!(view.playlists.len(), 1);
    assert_eq!(view.playlists[0].name, "Road Trip");
    assert!(!h.orch.playlists.view(Service::YouTube).loading);
}

// ── teardown ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_dispose_mid_flow_is_idempotent() {
    let mut h = Harness::new();
    h.orch.start();
    h.send(Command::Connect(Service::Spotify));
    h.send(Command::Migrate("X".to_string()));
    h.orch.cx.alert(AlertKind::Success, "hello");
    h.drain(Duration::from_millis(1500)).await;
    assert!(!h.orch.cx.timers.is_empty());

    h.orch.dispose();
    assert!(h.orch.cx.timers.is_empty());
    assert!(h.orch.cx.signals.is_empty());
    assert!(h.orch.flows.active_flow().is_none());
    assert!(!h.orch.migration.is_polling());
    assert!(!h.orch.auth.is_running());
    assert!(h.orch.cx.alerts.current().is_none());

    h.orch.dispose();
    assert!(h
        .orch
        .handle(Event::Command(Command::RefreshAuth))
        .is_break());
}

#[tokio::test(start_paused = true)]
async fn test_quit_breaks_loop() {
    let mut h = Harness::new();
    assert!(h.orch.handle(Event::Command(Command::Quit)).is_break());
    assert!(h
        .orch
        .handle(Event::Command(Command::DismissAlert))
        .is_continue());
}
