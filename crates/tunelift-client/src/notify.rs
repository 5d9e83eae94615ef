//! Notification listener for authorization surfaces.
//!
//! The callback page of a finished authorization beacons
//! `{type: "auth_complete"}` to `/auth/complete`, either as a JSON `POST` or
//! as a plain `GET` (useful as a redirect target).  Each signal becomes an
//! `Event::AuthSignal` for the orchestrator.
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use tunelift_proto::api::{AuthSignal, AUTH_COMPLETE};

use crate::event::Event;

pub const COMPLETE_PATH: &str = "/auth/complete";

#[derive(Clone)]
struct NotifyState {
    event_tx: mpsc::Sender<Event>,
}

#[derive(Deserialize)]
struct SignalQuery {
    #[serde(rename = "type", default = "default_kind")]
    kind: String,
    #[serde(default)]
    flow: Option<u64>,
}

fn default_kind() -> String {
    AUTH_COMPLETE.to_string()
}

pub fn router(event_tx: mpsc::Sender<Event>) -> Router {
    Router::new()
        .route(COMPLETE_PATH, get(signal_get).post(signal_post))
        .layer(CorsLayer::permissive())
        .with_state(NotifyState { event_tx })
}

pub fn start_server(
    bind_address: String,
    port: u16,
    event_tx: mpsc::Sender<Event>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(event_tx);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind notification listener to {}: {}", addr, e);
                return;
            }
        };

        info!("Notification listener on http://{}{}", addr, COMPLETE_PATH);

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = served {
            error!("Notification listener error: {}", e);
        }
    })
}

async fn forward(state: &NotifyState, signal: AuthSignal) -> StatusCode {
    info!("Notify: {} (flow {:?})", signal.kind, signal.flow);
    if state.event_tx.send(Event::AuthSignal(signal)).await.is_err() {
        error!("Failed to forward auth signal");
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}

async fn signal_get(
    State(state): State<NotifyState>,
    Query(query): Query<SignalQuery>,
) -> (StatusCode, &'static str) {
    let signal = AuthSignal {
        kind: query.kind,
        flow: query.flow,
    };
    match forward(&state, signal).await {
        StatusCode::OK => (
            StatusCode::OK,
            "Authorization received. You can close this window.",
        ),
        status => (status, "Client is not listening."),
    }
}

async fn signal_post(
    State(state): State<NotifyState>,
    Json(signal): Json<AuthSignal>,
) -> StatusCode {
    forward(&state, signal).await
}
