//! SignalHub: registry of notification listeners.
//!
//! Completion signals from the authorization surface arrive on the shared
//! notification channel whether or not anyone is waiting for them.  A
//! component that wants them subscribes and acts on a signal only while its
//! `ListenerId` is live; unsubscribing is idempotent like timer cancellation.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct SignalHub {
    next_id: u64,
    live: HashSet<ListenerId>,
}

impl SignalHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.live.insert(id);
        id
    }

    /// Returns whether the listener was still registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.live.remove(&id)
    }

    pub fn is_live(&self, id: ListenerId) -> bool {
        self.live.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn clear(&mut self) {
        self.live.clear();
    }
}
