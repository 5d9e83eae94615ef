//! PlaylistLoader: one-shot playlist fetches with classified failures.

use std::collections::HashMap;

use tokio::sync::watch;
use tracing::{debug, warn};

use tunelift_proto::api::{PlaylistEntry, Service};

use crate::backend::ApiError;
use crate::context::Context;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("Authentication required. Please reconnect {0}.")]
    AuthRequired(Service),
    #[error("Server error. Please try again later.")]
    Server,
    #[error("Network error. Please check your connection.")]
    Network,
    #[error("{0}")]
    Other(String),
}

impl LoadError {
    pub fn classify(platform: Service, error: &ApiError) -> Self {
        match error {
            ApiError::Status {
                status: 401 | 403, ..
            } => LoadError::AuthRequired(platform),
            ApiError::Status { status, .. } if *status >= 500 => LoadError::Server,
            ApiError::Network(_) => LoadError::Network,
            other => LoadError::Other(other.user_message()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub track_count: u32,
    pub description: Option<String>,
}

impl From<PlaylistEntry> for PlaylistSummary {
    fn from(entry: PlaylistEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            track_count: entry.track_count,
            description: entry.description.filter(|d| !d.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaylistView {
    pub loading: bool,
    pub playlists: Vec<PlaylistSummary>,
    pub error: Option<LoadError>,
}

pub type PlaylistViews = HashMap<Service, PlaylistView>;

pub struct PlaylistLoader {
    views: watch::Sender<PlaylistViews>,
    generations: HashMap<Service, u64>,
}

impl PlaylistLoader {
    pub fn new() -> Self {
        let (views, _) = watch::channel(PlaylistViews::new());
        Self {
            views,
            generations: HashMap::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaylistViews> {
        self.views.subscribe()
    }

    pub fn view(&self, platform: Service) -> PlaylistView {
        self.views
            .borrow()
            .get(&platform)
            .cloned()
            .unwrap_or_default()
    }

    /// Always re-fetches; a pending load for the same platform is superseded.
    pub fn load(&mut self, cx: &mut Context, platform: Service) {
        let generation = self.generations.entry(platform).or_insert(0);
        *generation += 1;
        let generation = *generation;
        self.views.send_modify(|views| {
            let view = views.entry(platform).or_default();
            view.loading = true;
            view.error = None;
        });
        cx.requests.playlists(platform, generation);
    }

    pub fn on_response(
        &mut self,
        platform: Service,
        generation: u64,
        result: Result<Vec<PlaylistEntry>, ApiError>,
    ) {
        if self.generations.get(&platform).copied() != Some(generation) {
            debug!("playlists: dropping superseded {} response", platform.id());
            return;
        }
        self.views.send_modify(|views| {
            let view = views.entry(platform).or_default();
            view.loading = false;
            match result {
                Ok(entries) => {
                    debug!("playlists: {} loaded {}", platform.id(), entries.len());
                    view.playlists = entries.into_iter().map(PlaylistSummary::from).collect();
                    view.error = None;
                }
                Err(e) => {
                    warn!("playlists: {} load failed: {}", platform.id(), e);
                    view.playlists.clear();
                    view.error = Some(LoadError::classify(platform, &e));
                }
            }
        });
    }
}
