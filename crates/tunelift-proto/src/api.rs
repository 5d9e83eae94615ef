use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Signal type emitted by the authorization callback page once the backend
/// has stored the new credentials.
pub const AUTH_COMPLETE: &str = "auth_complete";

/// A music service the backend can authorize against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Spotify,
    #[serde(rename = "youtube")]
    YouTube,
}

impl Service {
    pub const ALL: [Service; 2] = [Service::Spotify, Service::YouTube];

    /// Path segment used by the backend (`/auth/<id>`, `?platform=<id>`).
    pub fn id(self) -> &'static str {
        match self {
            Service::Spotify => "spotify",
            Service::YouTube => "youtube",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Service::Spotify => "Spotify",
            Service::YouTube => "YouTube Music",
        }
    }

    /// Path of the regular authorization surface.
    pub fn auth_path(self) -> String {
        format!("/auth/{}", self.id())
    }

    /// Path of the forced re-authorization surface.  Only YouTube has a
    /// dedicated endpoint; for Spotify a fresh authorization is the re-auth.
    pub fn reauth_path(self) -> String {
        match self {
            Service::YouTube => "/api/auth/youtube/force".to_string(),
            Service::Spotify => self.auth_path(),
        }
    }

    /// Whether the backend exposes `POST /api/auth/<id>/refresh`.
    pub fn supports_token_refresh(self) -> bool {
        matches!(self, Service::YouTube)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spotify" | "a" => Ok(Service::Spotify),
            "youtube" | "yt" | "ytmusic" | "b" => Ok(Service::YouTube),
            other => Err(format!("unknown service '{}'", other)),
        }
    }
}

/// `GET /api/auth/status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthStatus {
    #[serde(default)]
    pub spotify: bool,
    #[serde(default)]
    pub youtube: bool,
}

impl AuthStatus {
    pub fn is_authorized(&self, service: Service) -> bool {
        match service {
            Service::Spotify => self.spotify,
            Service::YouTube => self.youtube,
        }
    }
}

/// One row of `GET /api/playlists`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub track_count: u32,
    #[serde(default)]
    pub description: Option<String>,
}

/// Error body.  The backend reports failures either as `{error}` or, for
/// rejected requests, FastAPI's `{detail}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(alias = "detail")]
    pub error: String,
}

/// `GET /api/playlists?platform=<id>`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PlaylistsResponse {
    Playlists(Vec<PlaylistEntry>),
    Error(ErrorBody),
}

/// `POST /api/migrate` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrateRequest {
    pub playlist_id: String,
}

/// `POST /api/migrate`.  Any object without an `error` key means the job was
/// accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MigrateResponse {
    Error(ErrorBody),
    Started {
        #[serde(default)]
        status: Option<String>,
    },
}

/// `GET /api/migration/status`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MigrationStatus {
    /// Percentage, may be fractional.
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `POST /api/auth/<service>/logout` and `/refresh`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "detail")]
    pub error: Option<String>,
}

/// Completion signal delivered to the notification listener by the
/// authorization surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSignal {
    #[serde(rename = "type")]
    pub kind: String,
    /// Flow tag, when the surface knows which flow opened it.
    #[serde(default)]
    pub flow: Option<u64>,
}

impl AuthSignal {
    pub fn complete(flow: Option<u64>) -> Self {
        Self {
            kind: AUTH_COMPLETE.to_string(),
            flow,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.kind == AUTH_COMPLETE
    }
}
