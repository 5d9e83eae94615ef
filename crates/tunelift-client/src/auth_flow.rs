//! AuthFlowCoordinator: drives one authorization flow at a time.
//!
//! A flow opens the external surface and then waits for whichever comes
//! first: the `auth_complete` signal on the notification channel, or the
//! fallback timer noticing that the surface was closed.  Both paths end in
//! [`AuthFlowCoordinator::complete`], which takes the flow out of its slot;
//! the second trigger finds the slot empty and does nothing.
//!
//! After completion a one-shot settle timer gives the backend time to
//! persist the new credentials before the snapshot is refreshed.

use std::time::Duration;

use tracing::{debug, info, warn};

use tunelift_proto::api::{AuthSignal, Service};
use tunelift_proto::config::BackendConfig;

use crate::alert::AlertKind;
use crate::context::Context;
use crate::event::TimerKind;
use crate::signals::ListenerId;
use crate::surface::{AuthSurface, SurfaceHandle};
use crate::timers::TimerId;

pub type FlowId = u64;

pub const POPUPS_BLOCKED: &str = "Popups are blocked. Please allow popups for this site.";

struct AuthFlow {
    id: FlowId,
    service: Service,
    /// Kept only to observe closedness; never closed by us.
    surface: Box<dyn SurfaceHandle>,
    listener: ListenerId,
    fallback: TimerId,
}

/// Which trigger completed a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Signal,
    SurfaceClosed,
}

pub struct AuthFlowCoordinator {
    surfaces: Box<dyn AuthSurface>,
    backend: BackendConfig,
    flow: Option<AuthFlow>,
    settle: Option<TimerId>,
    next_id: FlowId,
    fallback_every: Duration,
    settle_delay: Duration,
    completions: u64,
}

impl AuthFlowCoordinator {
    pub fn new(
        surfaces: Box<dyn AuthSurface>,
        backend: &BackendConfig,
        fallback_every: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            surfaces,
            backend: backend.clone(),
            flow: None,
            settle: None,
            next_id: 0,
            fallback_every,
            settle_delay,
            completions: 0,
        }
    }

    pub fn connect(&mut self, cx: &mut Context, service: Service) -> Option<FlowId> {
        let url = self.backend.url(&service.auth_path());
        self.begin_flow(cx, service, &url)
    }

    pub fn reauthorize(&mut self, cx: &mut Context, service: Service) -> Option<FlowId> {
        let url = self.backend.url(&service.reauth_path());
        self.begin_flow(cx, service, &url)
    }

    /// Start a flow at `url`, replacing any active one.  Returns `None` when
    /// the surface could not be opened.
    pub fn begin_flow(&mut self, cx: &mut Context, service: Service, url: &str) -> Option<FlowId> {
        if let Some(prev) = self.flow.take() {
            info!("auth flow {}: superseded", prev.id);
            release(cx, prev);
        }

        let surface = match self.surfaces.open(url) {
            Ok(surface) => surface,
            Err(e) => {
                warn!("auth flow for {}: surface not opened: {}", service, e);
                cx.alert(AlertKind::Error, POPUPS_BLOCKED);
                return None;
            }
        };

        self.next_id += 1;
        let id = self.next_id;
        let listener = cx.signals.subscribe();
        let fallback = cx.timers.schedule(TimerKind::FlowFallback, self.fallback_every);
        self.flow = Some(AuthFlow {
            id,
            service,
            surface,
            listener,
            fallback,
        });
        info!("auth flow {}: started for {} at {}", id, service, url);
        Some(id)
    }

    pub fn on_signal(&mut self, cx: &mut Context, signal: &AuthSignal) {
        if !signal.is_complete() {
            debug!("auth flow: ignoring signal {:?}", signal.kind);
            return;
        }
        let Some(flow) = self.flow.as_ref() else {
            debug!("auth flow: completion signal with no active flow");
            return;
        };
        if !cx.signals.is_live(flow.listener) {
            return;
        }
        if let Some(tag) = signal.flow {
            if tag != flow.id {
                debug!("auth flow {}: ignoring signal for flow {}", flow.id, tag);
                return;
            }
        }
        self.complete(cx, Completion::Signal);
    }

    pub fn on_fallback_tick(&mut self, cx: &mut Context, id: TimerId) {
        let closed = match self.flow.as_mut() {
            Some(flow) if flow.fallback == id => flow.surface.is_closed(),
            _ => return,
        };
        if closed {
            self.complete(cx, Completion::SurfaceClosed);
        }
    }

    /// Returns whether this call completed a flow.
    pub fn complete(&mut self, cx: &mut Context, how: Completion) -> bool {
        let Some(flow) = self.flow.take() else {
            return false;
        };
        info!("auth flow {}: {} completed ({:?})", flow.id, flow.service, how);
        release(cx, flow);
        if let Some(prev) = self.settle.take() {
            cx.timers.cancel(prev);
        }
        self.settle = Some(cx.timers.schedule_once(TimerKind::FlowSettle, self.settle_delay));
        self.completions += 1;
        true
    }

    /// Settle tick.  Returns `true` when the snapshot should now be refreshed.
    pub fn on_settle(&mut self, id: TimerId) -> bool {
        if self.settle != Some(id) {
            return false;
        }
        self.settle = None;
        true
    }

    pub fn dispose(&mut self, cx: &mut Context) {
        if let Some(flow) = self.flow.take() {
            info!("auth flow {}: disposed", flow.id);
            release(cx, flow);
        }
        if let Some(id) = self.settle.take() {
            cx.timers.cancel(id);
        }
    }

    pub fn active_flow(&self) -> Option<(FlowId, Service)> {
        self.flow.as_ref().map(|f| (f.id, f.service))
    }

    pub fn completions(&self) -> u64 {
        self.completions
    }

    pub fn settle_pending(&self) -> bool {
        self.settle.is_some()
    }
}

fn release(cx: &mut Context, flow: AuthFlow) {
    cx.signals.unsubscribe(flow.listener);
    cx.timers.cancel(flow.fallback);
}
