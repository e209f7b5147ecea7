//! Backend HTTP client
//!
//! Typed async client for the game server's JSON API. World generation,
//! persistence and movement computation all live on the server; the editor
//! only sends and receives world payloads.

use std::time::Duration;

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::movement::{MovementReport, MovementResponse};
use crate::world::HexCoord;
use crate::world_file::WorldFile;

/// Connection settings for the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the game server (e.g., "http://127.0.0.1:5000")
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Errors talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend url {0:?}")]
    Url(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Parameters for `POST /api/generate-world`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateWorldRequest {
    pub width: u32,
    pub height: u32,
    pub terrain_types: Vec<String>,
    pub race_types: Vec<String>,
    pub params: GenerateParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateParams {
    pub name: String,
    /// Fraction of hexes that receive a settlement
    pub settlement_density: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl GenerateWorldRequest {
    pub fn new(width: u32, height: u32, name: impl Into<String>) -> Self {
        Self {
            width,
            height,
            terrain_types: Vec::new(),
            race_types: Vec::new(),
            params: GenerateParams {
                name: name.into(),
                settlement_density: 0.3,
                seed: None,
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SaveWorldResponse {
    pub filename: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// `list-worlds` answers either a bare array or `{"worlds": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum WorldList {
    Bare(Vec<String>),
    Wrapped { worlds: Vec<String> },
}

#[derive(Serialize)]
struct WorldDataBody<'a> {
    world_data: &'a WorldFile,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
}

/// Async JSON client for the game server.
#[derive(Clone, Debug)]
pub struct BackendClient {
    base_url: String,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        // Fail early on a bad URL rather than on the first request
        Url::parse(&config.base_url).map_err(|_| BackendError::Url(config.base_url.clone()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for path segments; segments are percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|_| BackendError::Url(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Url(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<String, BackendError> {
        let url = self.url(segments)?;
        debug!(%method, %url, "backend request");
        let mut builder = self.client.request(method, url.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = error_message(&text);
            warn!(%url, status = status.as_u16(), %message, "backend request failed");
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(text)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, BackendError> {
        let text = self.request::<()>(Method::GET, segments, None).await?;
        decode(segments, &text)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, BackendError> {
        let text = self.request(Method::POST, segments, Some(body)).await?;
        decode(segments, &text)
    }

    /// `GET /api/hex-movement/{x}/{y}`
    pub async fn hex_movement(&self, coord: HexCoord) -> Result<MovementReport, BackendError> {
        let (x, y) = (coord.x.to_string(), coord.y.to_string());
        let response: MovementResponse = self
            .get(&["api", "hex-movement", x.as_str(), y.as_str()])
            .await?;
        Ok(MovementReport::from_response(response))
    }

    /// `POST /api/update-world-data`. The response body is ignored.
    pub async fn update_world_data(&self, world: &WorldFile) -> Result<(), BackendError> {
        let body = WorldDataBody {
            world_data: world,
            filename: None,
        };
        self.request(Method::POST, &["api", "update-world-data"], Some(&body))
            .await?;
        Ok(())
    }

    /// `POST /api/generate-world`, returning the raw world payload.
    pub async fn generate_world(
        &self,
        request: &GenerateWorldRequest,
    ) -> Result<serde_json::Value, BackendError> {
        self.post(&["api", "generate-world"], request).await
    }

    /// `POST /api/save-world`
    pub async fn save_world(
        &self,
        world: &WorldFile,
        filename: Option<&str>,
    ) -> Result<SaveWorldResponse, BackendError> {
        let body = WorldDataBody {
            world_data: world,
            filename,
        };
        self.post(&["api", "save-world"], &body).await
    }

    /// `GET /api/list-worlds`
    pub async fn list_worlds(&self) -> Result<Vec<String>, BackendError> {
        let list: WorldList = self.get(&["api", "list-worlds"]).await?;
        Ok(match list {
            WorldList::Bare(worlds) | WorldList::Wrapped { worlds } => worlds,
        })
    }

    /// `GET /api/load-world/{filename}`
    pub async fn load_world(&self, filename: &str) -> Result<serde_json::Value, BackendError> {
        self.get(&["api", "load-world", filename]).await
    }

    pub async fn terrain_types(&self) -> Result<serde_json::Value, BackendError> {
        self.get(&["api", "terrain-types"]).await
    }

    pub async fn race_types(&self) -> Result<serde_json::Value, BackendError> {
        self.get(&["api", "race-types"]).await
    }

    pub async fn settlement_names(&self) -> Result<serde_json::Value, BackendError> {
        self.get(&["api", "settlement-names"]).await
    }

    // Faction and player lifecycle, passed through untouched

    pub async fn starting_types(&self) -> Result<serde_json::Value, BackendError> {
        self.get(&["api", "starting-types"]).await
    }

    pub async fn register_player(
        &self,
        player: &serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        self.post(&["api", "register-player"], player).await
    }

    pub async fn create_faction(
        &self,
        faction: &serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        self.post(&["api", "create-faction"], faction).await
    }

    pub async fn current_world(&self) -> Result<serde_json::Value, BackendError> {
        self.get(&["api", "current-world"]).await
    }

    pub async fn lock_world(
        &self,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        self.post(&["api", "lock-world"], body).await
    }

    pub async fn game_status(&self) -> Result<serde_json::Value, BackendError> {
        self.get(&["api", "game-status"]).await
    }
}

fn decode<T: DeserializeOwned>(segments: &[&str], text: &str) -> Result<T, BackendError> {
    serde_json::from_str(text).map_err(|source| BackendError::Decode {
        endpoint: format!("/{}", segments.join("/")),
        source,
    })
}

/// Human-readable message from an error body: `{"error": "..."}` or the text.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no details".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// Race identifiers from a `/api/race-types` payload.
///
/// Accepts `{"races": {"human": {...}}}`, `{"race_types": [...]}` or a bare
/// array of names.
pub fn race_names(value: &serde_json::Value) -> Vec<String> {
    let inner = value
        .get("races")
        .or_else(|| value.get("race_types"))
        .unwrap_or(value);
    match inner {
        serde_json::Value::Object(map) => map.keys().cloned().collect(),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}
