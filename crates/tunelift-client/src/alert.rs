//! AlertChannel: the single transient notification.
//!
//! At most one alert is visible.  Showing a new one replaces the old one and
//! cancels its expiry, so there is never more than one pending expiry timer.

use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::event::TimerKind;
use crate::timers::{TimerId, TimerRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

pub struct AlertChannel {
    state: watch::Sender<Option<Alert>>,
    expiry: Option<TimerId>,
    ttl: Duration,
}

impl AlertChannel {
    pub fn new(ttl: Duration) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state,
            expiry: None,
            ttl,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Alert>> {
        self.state.subscribe()
    }

    pub fn current(&self) -> Option<Alert> {
        self.state.borrow().clone()
    }

    pub fn show(&mut self, timers: &mut TimerRegistry, kind: AlertKind, message: impl Into<String>) {
        let message = message.into();
        debug!("alert {:?}: {}", kind, message);
        if let Some(prev) = self.expiry.take() {
            timers.cancel(prev);
        }
        self.state.send_replace(Some(Alert { kind, message }));
        self.expiry = Some(timers.schedule_once(TimerKind::AlertExpiry, self.ttl));
    }

    pub fn clear(&mut self, timers: &mut TimerRegistry) {
        if let Some(prev) = self.expiry.take() {
            timers.cancel(prev);
        }
        self.state.send_replace(None);
    }

    /// Expiry tick.  Ticks from a replaced alert are ignored.
    pub fn on_expiry(&mut self, id: TimerId) {
        if self.expiry != Some(id) {
            debug!("alert: ignoring stale expiry {:?}", id);
            return;
        }
        self.expiry = None;
        self.state.send_replace(None);
    }

    pub fn dispose(&mut self, timers: &mut TimerRegistry) {
        self.clear(timers);
    }
}
