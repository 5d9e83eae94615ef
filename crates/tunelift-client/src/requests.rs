//! Requester: runs backend calls off the event loop.
//!
//! Each call is spawned as its own task and its outcome comes back as
//! `Event::Response`, so the loop never blocks on the network.  Components
//! tag requests with a generation where a newer request must supersede an
//! older one.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use tunelift_proto::api::Service;

use crate::backend::Backend;
use crate::event::{Event, Response};

pub struct Requester {
    backend: Arc<dyn Backend>,
    tx: mpsc::Sender<Event>,
    tasks: Vec<AbortHandle>,
}

impl Requester {
    pub fn new(backend: Arc<dyn Backend>, tx: mpsc::Sender<Event>) -> Self {
        Self {
            backend,
            tx,
            tasks: Vec::new(),
        }
    }

    fn spawn<F>(&mut self, request: F)
    where
        F: Future<Output = Response> + Send + 'static,
    {
        self.tasks.retain(|t| !t.is_finished());
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let response = request.await;
            let _ = tx.send(Event::Response(response)).await;
        });
        self.tasks.push(handle.abort_handle());
    }

    pub fn auth_status(&mut self) {
        let backend = Arc::clone(&self.backend);
        self.spawn(async move { Response::AuthStatus(backend.auth_status().await) });
    }

    pub fn playlists(&mut self, platform: Service, generation: u64) {
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            Response::Playlists {
                platform,
                generation,
                result: backend.playlists(platform).await,
            }
        });
    }

    pub fn start_migration(&mut self, playlist_id: String, generation: u64) {
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            Response::MigrationStarted {
                generation,
                result: backend.start_migration(&playlist_id).await,
            }
        });
    }

    pub fn migration_status(&mut self, generation: u64) {
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            Response::MigrationStatus {
                generation,
                result: backend.migration_status().await,
            }
        });
    }

    pub fn logout(&mut self, service: Service) {
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            Response::Logout {
                service,
                result: backend.logout(service).await,
            }
        });
    }

    pub fn refresh_token(&mut self, service: Service) {
        let backend = Arc::clone(&self.backend);
        self.spawn(async move {
            Response::TokenRefresh {
                service,
                result: backend.refresh_token(service).await,
            }
        });
    }

    /// Requests whose task has not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    pub fn abort_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
