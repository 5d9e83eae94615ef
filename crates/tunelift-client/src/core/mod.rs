/// Orchestrator: single-owner event loop for the migration workflow.
///
/// The orchestrator owns every component and the shared `Context` (timers,
/// listeners, request runner, alert channel).  Timer tasks, request tasks,
/// the notification server and the console all feed `Event`s into one
/// channel; each event is handled to completion before the next one, so
/// component state needs no locking.
///
/// Presentation reads state through the `watch` receivers in [`Views`];
/// only the owning component ever writes to them.
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use tunelift_proto::api::ActionResponse;
use tunelift_proto::config::Config;

use crate::alert::{Alert, AlertKind};
use crate::auth_flow::AuthFlowCoordinator;
use crate::auth_poller::{AuthHealth, AuthSnapshot, AuthStatusPoller};
use crate::backend::{ApiError, Backend};
use crate::context::Context;
use crate::event::{Command, Event, Response, TimerKind};
use crate::migration::{MigrationController, MigrationJob};
use crate::playlists::{PlaylistLoader, PlaylistViews};
use crate::surface::AuthSurface;
use crate::timers::TimerFired;

#[cfg(test)]
mod tests;

/// Read-only views for the presentation layer.
#[derive(Clone)]
pub struct Views {
    pub auth: watch::Receiver<AuthSnapshot>,
    pub auth_health: watch::Receiver<AuthHealth>,
    pub alert: watch::Receiver<Option<Alert>>,
    pub job: watch::Receiver<Option<MigrationJob>>,
    pub playlists: watch::Receiver<PlaylistViews>,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct Orchestrator {
    cx: Context,
    auth: AuthStatusPoller,
    flows: AuthFlowCoordinator,
    migration: MigrationController,
    playlists: PlaylistLoader,
    disposed: bool,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        backend: Arc<dyn Backend>,
        surfaces: Box<dyn AuthSurface>,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        let timing = &config.timing;
        Self {
            cx: Context::new(event_tx, backend, timing.alert_ttl()),
            auth: AuthStatusPoller::new(timing.auth_poll()),
            flows: AuthFlowCoordinator::new(
                surfaces,
                &config.backend,
                timing.flow_fallback(),
                timing.flow_settle(),
            ),
            migration: MigrationController::new(timing.migration_poll()),
            playlists: PlaylistLoader::new(),
            disposed: false,
        }
    }

    pub fn views(&self) -> Views {
        Views {
            auth: self.auth.subscribe(),
            auth_health: self.auth.subscribe_health(),
            alert: self.cx.alerts.subscribe(),
            job: self.migration.subscribe(),
            playlists: self.playlists.subscribe(),
        }
    }

    pub fn start(&mut self) {
        self.auth.start(&mut self.cx);
    }

    /// Run until `Quit` or until every sender is gone, then tear down.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<Event>) -> anyhow::Result<()> {
        info!("Orchestrator: starting event loop");
        self.start();

        while let Some(event) = event_rx.recv().await {
            if self.handle(event).is_break() {
                info!("Orchestrator: quit requested");
                break;
            }
        }

        self.dispose();
        Ok(())
    }

    pub fn handle(&mut self, event: Event) -> ControlFlow<()> {
        if self.disposed {
            debug!("Orchestrator: event after dispose: {:?}", event);
            return ControlFlow::Break(());
        }
        match event {
            Event::Command(cmd) => return self.handle_command(cmd),
            Event::Timer(fired) => self.handle_timer(fired),
            Event::AuthSignal(signal) => {
                info!("Orchestrator: auth signal {:?}", signal);
                self.flows.on_signal(&mut self.cx, &signal);
            }
            Event::Response(response) => self.handle_response(response),
        }
        ControlFlow::Continue(())
    }

    /// Tear down every component.  Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        info!("Orchestrator: disposing");
        self.flows.dispose(&mut self.cx);
        self.migration.dispose(&mut self.cx);
        self.auth.dispose(&mut self.cx);
        self.cx.alerts.dispose(&mut self.cx.timers);
        self.cx.requests.abort_all();
        self.cx.signals.clear();
        self.cx.timers.cancel_all();
    }

    // ── command handlers ──────────────────────────────────────────────────────

    fn handle_command(&mut self, cmd: Command) -> ControlFlow<()> {
        debug!("Orchestrator: command {:?}", cmd);
        match cmd {
            Command::Connect(service) => {
                self.flows.connect(&mut self.cx, service);
            }
            Command::Reauthorize(service) => {
                self.flows.reauthorize(&mut self.cx, service);
            }
            Command::RefreshToken(service) => {
                if service.supports_token_refresh() {
                    self.cx.requests.refresh_token(service);
                } else {
                    // No refresh endpoint: a forced re-authorization is the refresh.
                    self.flows.reauthorize(&mut self.cx, service);
                }
            }
            Command::Logout(service) => self.cx.requests.logout(service),
            Command::LoadPlaylists(platform) => self.playlists.load(&mut self.cx, platform),
            Command::Migrate(playlist_id) => self.migration.submit(&mut self.cx, &playlist_id),
            Command::RefreshAuth => self.auth.refresh(&mut self.cx),
            Command::DismissAlert => self.cx.alerts.clear(&mut self.cx.timers),
            Command::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    // ── timers ────────────────────────────────────────────────────────────────

    fn handle_timer(&mut self, fired: TimerFired) {
        if !self.cx.timers.accept(&fired) {
            debug!("Orchestrator: stale tick {:?}", fired);
            return;
        }
        let id = fired.id;
        match fired.kind {
            TimerKind::AlertExpiry => self.cx.alerts.on_expiry(id),
            TimerKind::AuthRefresh => self.auth.on_tick(&mut self.cx, id),
            TimerKind::FlowFallback => self.flows.on_fallback_tick(&mut self.cx, id),
            TimerKind::FlowSettle => {
                if self.flows.on_settle(id) {
                    self.auth.refresh(&mut self.cx);
                }
            }
            TimerKind::MigrationPoll => self.migration.on_tick(&mut self.cx, id),
        }
    }

    // ── responses ─────────────────────────────────────────────────────────────

    fn handle_response(&mut self, response: Response) {
        match response {
            Response::AuthStatus(result) => self.auth.on_response(&mut self.cx, result),
            Response::Playlists {
                platform,
                generation,
                result,
            } => self.playlists.on_response(platform, generation, result),
            Response::MigrationStarted { generation, result } => {
                self.migration.on_started(&mut self.cx, generation, result)
            }
            Response::MigrationStatus { generation, result } => {
                self.migration.on_status(&mut self.cx, generation, result)
            }
            Response::Logout { service, result } => {
                let fallback = format!("Failed to log out of {}", service);
                self.report_action(result, &format!("Logged out of {}", service), &fallback);
                self.auth.refresh(&mut self.cx);
            }
            Response::TokenRefresh { service, result } => {
                let fallback = format!(
                    "Failed to refresh {} token. Please re-authenticate.",
                    service
                );
                self.report_action(result, &format!("{} token refreshed", service), &fallback);
                self.auth.refresh(&mut self.cx);
            }
        }
    }

    fn report_action(
        &mut self,
        result: Result<ActionResponse, ApiError>,
        success: &str,
        failure: &str,
    ) {
        match result {
            Ok(response) if response.success => {
                let message = response.message.unwrap_or_else(|| success.to_string());
                self.cx.alert(AlertKind::Success, message);
            }
            Ok(response) => {
                let message = response.error.unwrap_or_else(|| failure.to_string());
                warn!("Orchestrator: action rejected: {}", message);
                self.cx.alert(AlertKind::Error, message);
            }
            Err(e) => {
                warn!("Orchestrator: action failed: {}", e);
                let message = match e {
                    ApiError::Network(_) | ApiError::Decode(_) => failure.to_string(),
                    other => other.user_message(),
                };
                self.cx.alert(AlertKind::Error, message);
            }
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.dispose();
    }
}
