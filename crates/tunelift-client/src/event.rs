//! Event enum: every input into the orchestrator loop.

use tunelift_proto::api::{
    ActionResponse, AuthSignal, AuthStatus, MigrationStatus, PlaylistEntry, Service,
};

use crate::backend::ApiError;
use crate::timers::TimerFired;

/// What a timer means to the component that scheduled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// One-shot: clear the visible alert.
    AlertExpiry,
    /// Recurring: refresh the auth snapshot.
    AuthRefresh,
    /// Recurring: check whether the authorization surface was closed.
    FlowFallback,
    /// One-shot: refresh the snapshot after a flow completed.
    FlowSettle,
    /// Recurring: fetch migration job status.
    MigrationPoll,
}

/// User intents, sent by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect(Service),
    Reauthorize(Service),
    RefreshToken(Service),
    Logout(Service),
    LoadPlaylists(Service),
    Migrate(String),
    RefreshAuth,
    DismissAlert,
    Quit,
}

/// A completed backend request.
#[derive(Debug, Clone)]
pub enum Response {
    AuthStatus(Result<AuthStatus, ApiError>),
    Playlists {
        platform: Service,
        generation: u64,
        result: Result<Vec<PlaylistEntry>, ApiError>,
    },
    MigrationStarted {
        generation: u64,
        result: Result<(), ApiError>,
    },
    MigrationStatus {
        generation: u64,
        result: Result<MigrationStatus, ApiError>,
    },
    Logout {
        service: Service,
        result: Result<ActionResponse, ApiError>,
    },
    TokenRefresh {
        service: Service,
        result: Result<ActionResponse, ApiError>,
    },
}

/// All inputs into the orchestrator loop.
#[derive(Debug, Clone)]
pub enum Event {
    Command(Command),
    Timer(TimerFired),
    /// Delivered by the notification server.
    AuthSignal(AuthSignal),
    Response(Response),
}
