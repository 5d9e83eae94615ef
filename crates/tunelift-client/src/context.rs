//! Shared facilities handed to every component by the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::alert::{AlertChannel, AlertKind};
use crate::backend::Backend;
use crate::event::Event;
use crate::requests::Requester;
use crate::signals::SignalHub;
use crate::timers::TimerRegistry;

pub struct Context {
    pub timers: TimerRegistry,
    pub signals: SignalHub,
    pub requests: Requester,
    pub alerts: AlertChannel,
}

impl Context {
    pub fn new(tx: mpsc::Sender<Event>, backend: Arc<dyn Backend>, alert_ttl: Duration) -> Self {
        Self {
            timers: TimerRegistry::new(tx.clone()),
            signals: SignalHub::new(),
            requests: Requester::new(backend, tx),
            alerts: AlertChannel::new(alert_ttl),
        }
    }

    pub fn alert(&mut self, kind: AlertKind, message: impl Into<String>) {
        self.alerts.show(&mut self.timers, kind, message);
    }
}
