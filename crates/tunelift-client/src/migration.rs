//! MigrationController: submit a job, then poll it until it is terminal.
//!
//! Every submission bumps `generation`; start and status responses carry the
//! generation they were issued under, and anything from an older submission
//! is dropped.  The poll timer is stopped on the same tick that observes the
//! terminal status.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use tunelift_proto::api::MigrationStatus;

use crate::backend::ApiError;
use crate::context::Context;
use crate::event::TimerKind;
use crate::timers::TimerId;

pub const STARTING: &str = "Starting migration...";
pub const POLL_FAILED: &str = "Failed to get migration status";
pub const NO_RESULT: &str = "Migration finished without a result";

/// Visible state of the current job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrationJob {
    pub playlist_id: String,
    /// 0..=100
    pub progress: u8,
    pub description: String,
    pub running: bool,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl MigrationJob {
    pub fn is_terminal(&self) -> bool {
        !self.running && (self.result.is_some() || self.error.is_some())
    }
}

pub struct MigrationController {
    job: watch::Sender<Option<MigrationJob>>,
    timer: Option<TimerId>,
    every: Duration,
    generation: u64,
    status_in_flight: bool,
    ticks: u32,
}

impl MigrationController {
    pub fn new(every: Duration) -> Self {
        let (job, _) = watch::channel(None);
        Self {
            job,
            timer: None,
            every,
            generation: 0,
            status_in_flight: false,
            ticks: 0,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<MigrationJob>> {
        self.job.subscribe()
    }

    pub fn job(&self) -> Option<MigrationJob> {
        self.job.borrow().clone()
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_some()
    }

    /// Poll ticks handled for the current submission.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn submit(&mut self, cx: &mut Context, playlist_id: &str) {
        let playlist_id = playlist_id.trim();
        if playlist_id.is_empty() {
            debug!("migration: empty playlist id, ignoring");
            return;
        }
        self.stop_polling(cx);
        self.generation += 1;
        self.status_in_flight = false;
        self.ticks = 0;
        self.job.send_replace(Some(MigrationJob {
            playlist_id: playlist_id.to_string(),
            progress: 0,
            description: STARTING.to_string(),
            running: true,
            result: None,
            error: None,
        }));
        info!("migration {}: submitting {}", self.generation, playlist_id);
        cx.requests
            .start_migration(playlist_id.to_string(), self.generation);
    }

    pub fn on_started(&mut self, cx: &mut Context, generation: u64, result: Result<(), ApiError>) {
        if generation != self.generation {
            debug!("migration: dropping start response of submission {}", generation);
            return;
        }
        match result {
            Ok(()) => self.start_polling(cx),
            Err(e) => {
                warn!("migration {}: rejected: {}", generation, e);
                let message = e.user_message();
                self.update(|job| {
                    job.running = false;
                    job.error = Some(message);
                });
            }
        }
    }

    fn start_polling(&mut self, cx: &mut Context) {
        self.stop_polling(cx);
        self.timer = Some(cx.timers.schedule(TimerKind::MigrationPoll, self.every));
    }

    fn stop_polling(&mut self, cx: &mut Context) {
        if let Some(id) = self.timer.take() {
            cx.timers.cancel(id);
            debug!("migration: polling stopped after {} ticks", self.ticks);
        }
    }

    pub fn on_tick(&mut self, cx: &mut Context, id: TimerId) {
        if self.timer != Some(id) {
            return;
        }
        self.ticks += 1;
        if self.status_in_flight {
            debug!("migration: tick {} skipped, status request in flight", self.ticks);
            return;
        }
        self.status_in_flight = true;
        cx.requests.migration_status(self.generation);
    }

    pub fn on_status(
        &mut self,
        cx: &mut Context,
        generation: u64,
        result: Result<MigrationStatus, ApiError>,
    ) {
        if generation != self.generation {
            debug!("migration: dropping status of submission {}", generation);
            return;
        }
        self.status_in_flight = false;
        if self.timer.is_none() {
            return;
        }

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                warn!("migration {}: status request failed: {}", generation, e);
                self.stop_polling(cx);
                self.update(|job| {
                    job.running = false;
                    job.error = Some(POLL_FAILED.to_string());
                });
                return;
            }
        };

        let progress = status.progress.round().clamp(0.0, 100.0) as u8;
        if status.running {
            self.update(|job| {
                job.progress = progress;
                job.description = status.description;
            });
            return;
        }

        self.stop_polling(cx);
        info!(
            "migration {}: finished (result={:?}, error={:?})",
            generation, status.result, status.error
        );
        self.update(|job| {
            job.progress = progress;
            job.description = status.description;
            job.running = false;
            match (status.error, status.result) {
                (Some(error), _) => {
                    job.error = Some(error);
                    job.result = None;
                }
                (None, Some(result)) => job.result = Some(result),
                (None, None) => job.error = Some(NO_RESULT.to_string()),
            }
        });
    }

    pub fn dispose(&mut self, cx: &mut Context) {
        self.stop_polling(cx);
        self.generation += 1;
        self.status_in_flight = false;
    }

    fn update(&self, f: impl FnOnce(&mut MigrationJob)) {
        self.job.send_modify(|job| {
            if let Some(job) = job.as_mut() {
                f(job);
            }
        });
    }
}
