//! Remote folder browser.
//!
//! The worker answers `GET <worker>?mode=folders[&refresh=true]` with the
//! whole Drive folder tree.  [`DriveClient`] fetches it (with retry, an
//! overall timeout and user cancel) and [`FolderBrowser`] walks it.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RemoteConfig;
use crate::protocol::Track;

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const CACHE_STATUS_HEADER: &str = "X-Cache-Status";

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Remote folder browsing is not configured")]
    NotConfigured,
    #[error("Invalid worker URL: {0}")]
    InvalidUrl(String),
    #[error("Authentication failed - Invalid API key")]
    Unauthorized,
    #[error("Access forbidden - Check configuration")]
    Forbidden,
    #[error("Rate limit exceeded - Please wait")]
    RateLimited,
    #[error("Server error (HTTP {0})")]
    Server(u16),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("{0}")]
    Remote(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Request cancelled")]
    Cancelled,
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Only server-side failures and dropped connections are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Server(_) | FetchError::Network(_))
    }

    fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => FetchError::Unauthorized,
            StatusCode::FORBIDDEN => FetchError::Forbidden,
            StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
            s if s.is_server_error() => FetchError::Server(s.as_u16()),
            s => FetchError::Status(s.as_u16()),
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteFile {
    pub name: String,
    #[serde(rename = "fileId", alias = "id")]
    pub file_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub size: Option<String>,
    #[serde(default, rename = "sizeBytes")]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl RemoteFile {
    pub fn to_track(&self) -> Track {
        let mut track = Track::remote(self.name.clone(), self.file_id.clone());
        track.size = self.size.clone();
        track.size_bytes = self.size_bytes;
        track.duration = self.duration;
        track
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FolderNode {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "audioCount")]
    pub audio_count: Option<usize>,
    #[serde(default)]
    pub files: Vec<RemoteFile>,
    #[serde(default)]
    pub folders: BTreeMap<String, FolderNode>,
}

impl FolderNode {
    pub fn audio_count(&self) -> usize {
        self.audio_count.unwrap_or(self.files.len())
    }
}

#[derive(Debug, Deserialize)]
struct FolderResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    folders: Option<FolderNode>,
}

/// Sizes arrive as either "3.2 MB" or a bare number.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
pub struct FolderListing {
    pub root: FolderNode,
    pub cache_status: Option<CacheStatus>,
}

impl FolderListing {
    pub fn message(&self) -> &'static str {
        match self.cache_status {
            Some(CacheStatus::Hit) => "Folder structure loaded (cached)",
            Some(CacheStatus::Miss) => "Folder structure loaded (fresh)",
            None => "Folder structure loaded",
        }
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    worker_url: Url,
    api_key: String,
    max_retries: u32,
    backoff_base: Duration,
    timeout: Duration,
}

impl DriveClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, FetchError> {
        if !config.is_configured() {
            return Err(FetchError::NotConfigured);
        }
        let worker_url = Url::parse(config.worker_url.trim())
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            http,
            worker_url,
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            backoff_base: config.backoff_base(),
            timeout: config.timeout(),
        })
    }

    pub fn folders_url(&self, refresh: bool) -> Url {
        let mut url = self.worker_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("mode", "folders");
            if refresh {
                query.append_pair("refresh", "true");
            }
        }
        url
    }

    /// Fetch the folder tree.  The whole operation, retries included, is
    /// bounded by the configured timeout and aborts as soon as `cancel` fires.
    pub async fn fetch_folders(
        &self,
        refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<FolderListing, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("drive: folder fetch cancelled");
                Err(FetchError::Cancelled)
            }
            res = tokio::time::timeout(self.timeout, self.fetch_with_retry(refresh)) => {
                res.unwrap_or_else(|_| {
                    warn!("drive: folder fetch timed out after {:?}", self.timeout);
                    Err(FetchError::Timeout(self.timeout.as_secs()))
                })
            }
        }
    }

    async fn fetch_with_retry(&self, refresh: bool) -> Result<FolderListing, FetchError> {
        let mut attempt = 0u32;
        loop {
            match self.fetch_once(refresh).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff_base * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        "drive: attempt {} failed ({}), retrying in {:?}",
                        attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn fetch_once(&self, refresh: bool) -> Result<FolderListing, FetchError> {
        let url = self.folders_url(refresh);
        debug!("drive: GET {}", url);
        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::from_status(status));
        }

        let cache_status = response
            .headers()
            .get(CACHE_STATUS_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| match v.trim().to_ascii_uppercase().as_str() {
                "HIT" => Some(CacheStatus::Hit),
                "MISS" => Some(CacheStatus::Miss),
                _ => None,
            });

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let root = parse_folder_response(&body)?;
        debug!(
            "drive: listing root={} folders={} cache={:?}",
            root.name,
            root.folders.len(),
            cache_status
        );
        Ok(FolderListing { root, cache_status })
    }
}

pub fn parse_folder_response(body: &str) -> Result<FolderNode, FetchError> {
    let parsed: FolderResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(e.to_string()))?;
    if parsed.status.as_deref() == Some("error") {
        return Err(FetchError::Remote(
            parsed
                .error
                .unwrap_or_else(|| "Failed to load folders".to_string()),
        ));
    }
    parsed
        .folders
        .ok_or_else(|| FetchError::Decode("response has no folder tree".to_string()))
}

// ── Navigation ────────────────────────────────────────────────────────────────

/// Cursor over a fetched folder tree.  `path[0]` is the root's name.
#[derive(Debug, Clone)]
pub struct FolderBrowser {
    root: FolderNode,
    path: Vec<String>,
}

impl FolderBrowser {
    pub fn new(root: FolderNode) -> Self {
        let path = vec![root.name.clone()];
        Self { root, path }
    }

    pub fn current(&self) -> &FolderNode {
        let mut node = &self.root;
        for name in self.path.iter().skip(1) {
            match node.folders.get(name) {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    pub fn subfolders(&self) -> Vec<(&str, &FolderNode)> {
        self.current()
            .folders
            .iter()
            .map(|(name, node)| (name.as_str(), node))
            .collect()
    }

    pub fn files(&self) -> &[RemoteFile] {
        &self.current().files
    }

    pub fn is_empty(&self) -> bool {
        let node = self.current();
        node.folders.is_empty() && node.files.is_empty()
    }

    pub fn open(&mut self, name: &str) -> bool {
        if self.current().folders.contains_key(name) {
            self.path.push(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.path.len() > 1
    }

    pub fn back(&mut self) -> bool {
        if self.can_go_back() {
            self.path.pop();
            true
        } else {
            false
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn breadcrumb(&self) -> String {
        let joined = self.path.join(" / ");
        if joined.trim().is_empty() {
            "/".to_string()
        } else {
            joined
        }
    }

    /// "3 folders, 1 audio file"
    pub fn stats_label(&self) -> String {
        let folders = self.current().folders.len();
        let files = self.current().files.len();
        format!(
            "{} folder{}, {} audio file{}",
            folders,
            if folders == 1 { "" } else { "s" },
            files,
            if files == 1 { "" } else { "s" }
        )
    }

    /// Tracks of the named subfolder (its own files, not nested ones).
    pub fn folder_tracks(&self, name: &str) -> Option<Vec<Track>> {
        let node = self.current().folders.get(name)?;
        Some(node.files.iter().map(RemoteFile::to_track).collect())
    }

    pub fn current_tracks(&self) -> Vec<Track> {
        self.current().files.iter().map(RemoteFile::to_track).collect()
    }
}
