//! Backend API client.
//!
//! `Backend` is the seam between the orchestrator and the migration server:
//! the HTTP implementation talks to the real service, tests substitute a
//! scripted one.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::debug;

use tunelift_proto::api::{
    ActionResponse, AuthStatus, ErrorBody, MigrateRequest, MigrateResponse, MigrationStatus,
    PlaylistEntry, PlaylistsResponse, Service,
};
use tunelift_proto::config::BackendConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// The request never produced a response (connect, timeout, reset).
    #[error("network error: {0}")]
    Network(String),
    /// Successful status with an `{error}` body.
    #[error("{0}")]
    Rejected(String),
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Text suitable for showing to the user: the server's own message when
    /// it sent one.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { message, .. } | ApiError::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn auth_status(&self) -> Result<AuthStatus, ApiError>;
    async fn playlists(&self, platform: Service) -> Result<Vec<PlaylistEntry>, ApiError>;
    async fn start_migration(&self, playlist_id: &str) -> Result<(), ApiError>;
    async fn migration_status(&self) -> Result<MigrationStatus, ApiError>;
    async fn logout(&self, service: Service) -> Result<ActionResponse, ApiError>;
    async fn refresh_token(&self, service: Service) -> Result<ActionResponse, ApiError>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        // The backend keys authorization to its session cookie.
        let client = reqwest::Client::builder()
            .user_agent(concat!("tunelift/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        self.config.url(path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!("GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        debug!("POST {}", path);
        let mut request = self
            .client
            .post(self.url(path))
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(transport_error)?;
        read_json(response).await
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn auth_status(&self) -> Result<AuthStatus, ApiError> {
        self.get("/api/auth/status").await
    }

    async fn playlists(&self, platform: Service) -> Result<Vec<PlaylistEntry>, ApiError> {
        let path = format!("/api/playlists?platform={}", platform.id());
        match self.get::<PlaylistsResponse>(&path).await? {
            PlaylistsResponse::Playlists(list) => Ok(list),
            PlaylistsResponse::Error(body) => Err(ApiError::Rejected(body.error)),
        }
    }

    async fn start_migration(&self, playlist_id: &str) -> Result<(), ApiError> {
        let body = MigrateRequest {
            playlist_id: playlist_id.to_string(),
        };
        match self
            .post::<MigrateResponse, _>("/api/migrate", Some(&body))
            .await?
        {
            MigrateResponse::Started { .. } => Ok(()),
            MigrateResponse::Error(body) => Err(ApiError::Rejected(body.error)),
        }
    }

    async fn migration_status(&self) -> Result<MigrationStatus, ApiError> {
        self.get("/api/migration/status").await
    }

    async fn logout(&self, service: Service) -> Result<ActionResponse, ApiError> {
        let path = format!("/api/auth/{}/logout", service.id());
        self.post::<_, ()>(&path, None).await
    }

    async fn refresh_token(&self, service: Service) -> Result<ActionResponse, ApiError> {
        let path = format!("/api/auth/{}/refresh", service.id());
        self.post::<_, ()>(&path, None).await
    }
}

fn transport_error(e: reqwest::Error) -> ApiError {
    if e.is_decode() {
        ApiError::Decode(e.to_string())
    } else {
        ApiError::Network(e.to_string())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(status, &text),
        });
    }
    let text = response.text().await.map_err(transport_error)?;
    serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Prefer the server's `{error}`/`{detail}` text over the bare status line.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() <= 200 && !trimmed.starts_with('<') {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}
