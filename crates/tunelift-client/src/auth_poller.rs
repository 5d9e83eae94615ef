//! AuthStatusPoller: owner of the authorization snapshot.
//!
//! The snapshot is overwritten wholesale by every successful refresh.  A
//! failed refresh keeps the last known snapshot and is only recorded; the
//! next tick retries.

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use tunelift_proto::api::AuthStatus;

use crate::backend::ApiError;
use crate::context::Context;
use crate::event::TimerKind;
use crate::timers::TimerId;

pub type AuthSnapshot = AuthStatus;

/// Outcome of the most recent refreshes, for the status line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthHealth {
    pub last_success: Option<DateTime<Local>>,
    pub last_error: Option<(DateTime<Local>, String)>,
    /// Failed refreshes since the last success.
    pub failures: u32,
}

impl AuthHealth {
    /// The last error, if no refresh has succeeded since.
    pub fn failing(&self) -> Option<&(DateTime<Local>, String)> {
        if self.failures == 0 {
            return None;
        }
        self.last_error.as_ref()
    }
}

pub struct AuthStatusPoller {
    snapshot: watch::Sender<AuthSnapshot>,
    timer: Option<TimerId>,
    every: Duration,
    in_flight: bool,
    /// An explicit refresh arrived while one was in flight.
    queued: bool,
    health: watch::Sender<AuthHealth>,
    refreshes: u64,
}

impl AuthStatusPoller {
    pub fn new(every: Duration) -> Self {
        let (snapshot, _) = watch::channel(AuthSnapshot::default());
        let (health, _) = watch::channel(AuthHealth::default());
        Self {
            snapshot,
            timer: None,
            every,
            in_flight: false,
            queued: false,
            health,
            refreshes: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn subscribe_health(&self) -> watch::Receiver<AuthHealth> {
        self.health.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        *self.snapshot.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Requests issued so far.
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Immediate refresh, then one every `every`.  Restarting never leaves
    /// two recurring timers behind.
    pub fn start(&mut self, cx: &mut Context) {
        self.stop(cx);
        info!("auth poller: start (every {:?})", self.every);
        self.refresh(cx);
        self.timer = Some(cx.timers.schedule(TimerKind::AuthRefresh, self.every));
    }

    pub fn stop(&mut self, cx: &mut Context) {
        if let Some(id) = self.timer.take() {
            cx.timers.cancel(id);
            info!("auth poller: stopped");
        }
    }

    pub fn refresh(&mut self, cx: &mut Context) {
        if self.in_flight {
            debug!("auth poller: refresh queued behind in-flight request");
            self.queued = true;
            return;
        }
        self.issue(cx);
    }

    pub fn on_tick(&mut self, cx: &mut Context, id: TimerId) {
        if self.timer != Some(id) {
            return;
        }
        if self.in_flight {
            debug!("auth poller: tick skipped, request in flight");
            return;
        }
        self.issue(cx);
    }

    pub fn on_response(&mut self, cx: &mut Context, result: Result<AuthStatus, ApiError>) {
        self.in_flight = false;
        match result {
            Ok(status) => {
                self.health.send_modify(|health| {
                    health.last_success = Some(Local::now());
                    health.failures = 0;
                });
                self.snapshot.send_if_modified(|current| {
                    let changed = *current != status;
                    *current = status;
                    changed
                });
                debug!(
                    "auth poller: spotify={} youtube={}",
                    status.spotify, status.youtube
                );
            }
            Err(e) => {
                warn!("auth poller: status refresh failed: {}", e);
                self.health.send_modify(|health| {
                    health.last_error = Some((Local::now(), e.to_string()));
                    health.failures += 1;
                });
            }
        }
        if std::mem::take(&mut self.queued) {
            self.issue(cx);
        }
    }

    pub fn dispose(&mut self, cx: &mut Context) {
        self.stop(cx);
        self.queued = false;
    }

    fn issue(&mut self, cx: &mut Context) {
        self.in_flight = true;
        self.refreshes += 1;
        cx.requests.auth_status();
    }
}
