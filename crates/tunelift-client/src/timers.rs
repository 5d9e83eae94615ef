//! TimerRegistry: owner of every recurring and one-shot timer.
//!
//! A timer is a small tokio task that posts `Event::Timer` into the
//! orchestrator loop.  The registry keeps the task's `AbortHandle` keyed by
//! `TimerId`; cancelling removes the entry and aborts the task, so a handle is
//! stopped at most once no matter how many exit paths try.
//!
//! A tick may already sit in the event queue when its timer is cancelled.
//! The loop therefore runs every delivered tick through [`TimerRegistry::accept`],
//! which rejects ids that are no longer live.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::event::{Event, TimerKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Payload of `Event::Timer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub id: TimerId,
    pub kind: TimerKind,
}

struct LiveTimer {
    kind: TimerKind,
    repeating: bool,
    task: AbortHandle,
}

pub struct TimerRegistry {
    tx: mpsc::Sender<Event>,
    next_id: u64,
    live: HashMap<TimerId, LiveTimer>,
}

impl TimerRegistry {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self {
            tx,
            next_id: 0,
            live: HashMap::new(),
        }
    }

    /// Fire `kind` every `every`, first tick one period from now.
    pub fn schedule(&mut self, kind: TimerKind, every: Duration) -> TimerId {
        let id = self.allocate();
        let period = every.max(Duration::from_millis(1));
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if tx.send(Event::Timer(TimerFired { id, kind })).await.is_err() {
                    break;
                }
            }
        });
        self.live.insert(
            id,
            LiveTimer {
                kind,
                repeating: true,
                task: task.abort_handle(),
            },
        );
        debug!("timer {:?} scheduled: {:?} every {:?}", id, kind, period);
        id
    }

    /// Fire `kind` once after `delay`.
    pub fn schedule_once(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        let id = self.allocate();
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Event::Timer(TimerFired { id, kind })).await;
        });
        self.live.insert(
            id,
            LiveTimer {
                kind,
                repeating: false,
                task: task.abort_handle(),
            },
        );
        debug!("timer {:?} scheduled: {:?} once in {:?}", id, kind, delay);
        id
    }

    /// Stop a timer.  Unknown, cancelled and already-fired ids are a no-op.
    /// Returns whether a live timer was stopped.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.live.remove(&id) {
            Some(timer) => {
                timer.task.abort();
                debug!("timer {:?} cancelled ({:?})", id, timer.kind);
                true
            }
            None => false,
        }
    }

    /// Gate a delivered tick.  Returns `false` for ticks of timers that were
    /// cancelled after the tick was queued.  A one-shot is retired here.
    pub fn accept(&mut self, fired: &TimerFired) -> bool {
        match self.live.get(&fired.id) {
            None => false,
            Some(timer) if timer.repeating => true,
            Some(_) => {
                self.live.remove(&fired.id);
                true
            }
        }
    }

    pub fn is_live(&self, id: TimerId) -> bool {
        self.live.contains_key(&id)
    }

    /// Number of live timers of `kind`.
    pub fn active(&self, kind: TimerKind) -> usize {
        self.live.values().filter(|t| t.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.live.drain() {
            timer.task.abort();
        }
    }

    fn allocate(&mut self) -> TimerId {
        self.next_id += 1;
        TimerId(self.next_id)
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
