//! Persisted playback session with a time-to-live.
//!
//! Remote tracks are stored in full.  Local tracks only leave a folder name
//! and file list behind, since a path picked in one run is not trusted in the
//! next; the user is asked to load the folder again.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::protocol::{Track, TrackLocation, TrackSource};
use crate::state::PlaybackState;
use crate::store::{KeyValueStore, StoreError};

pub const SESSION_KEY: &str = "audioPlayerPlaylist";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    /// Epoch milliseconds of the save.
    pub timestamp: i64,
    #[serde(default)]
    pub current_folder_mode: Option<String>,
    #[serde(default)]
    pub current_folder_name: String,
    /// Index into `remote_playlist`, or -1.
    #[serde(default = "no_index")]
    pub current_track_index: i64,
    #[serde(default, alias = "drivePlaylist")]
    pub remote_playlist: Vec<RemoteTrackRecord>,
    #[serde(default)]
    pub local_playlist: Option<LocalPlaylistRecord>,
    #[serde(default)]
    pub current_path: Vec<String>,
}

fn no_index() -> i64 {
    -1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTrackRecord {
    pub name: String,
    pub file_id: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPlaylistRecord {
    pub folder_name: String,
    pub file_names: Vec<String>,
    pub count: usize,
}

/// Restored remote session.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredSession {
    pub tracks: Vec<Track>,
    /// Checked to be inside `tracks`.
    pub current: Option<usize>,
    pub folder_mode: Option<String>,
    pub folder_name: String,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionRestore {
    Empty,
    /// Older than the TTL; the record has been removed.
    Expired,
    /// Unparseable; the record has been removed.
    Corrupt,
    Remote(RestoredSession),
    /// Only local tracks were saved.
    LocalOnly { folder_name: String, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Full,
    /// The full record did not fit; a trimmed one was written.
    Reduced,
}

pub struct SessionStore {
    ttl: Duration,
    reduced_track_limit: usize,
}

impl SessionStore {
    pub fn new(ttl: Duration, reduced_track_limit: usize) -> Self {
        Self {
            ttl,
            reduced_track_limit,
        }
    }

    pub fn save(
        &self,
        store: &mut dyn KeyValueStore,
        state: &PlaybackState,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, StoreError> {
        let session = snapshot_session(state, now);
        match store.set(SESSION_KEY, serde_json::to_string(&session)?) {
            Ok(()) => {
                debug!(
                    "session: saved {} remote tracks",
                    session.remote_playlist.len()
                );
                Ok(SaveOutcome::Full)
            }
            Err(StoreError::QuotaExceeded { needed, quota }) => {
                warn!(
                    "session: {} bytes over quota {}, saving first {} remote tracks",
                    needed, quota, self.reduced_track_limit
                );
                let reduced = reduce(session, self.reduced_track_limit);
                store.set(SESSION_KEY, serde_json::to_string(&reduced)?)?;
                Ok(SaveOutcome::Reduced)
            }
            Err(e) => Err(e),
        }
    }

    pub fn load(&self, store: &mut dyn KeyValueStore, now: DateTime<Utc>) -> SessionRestore {
        let Some(raw) = store.get(SESSION_KEY) else {
            return SessionRestore::Empty;
        };

        let session: PersistedSession = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                warn!("session: discarding malformed record: {}", e);
                self.clear(store);
                return SessionRestore::Corrupt;
            }
        };

        let expired = match Utc.timestamp_millis_opt(session.timestamp).single() {
            Some(saved_at) => now.signed_duration_since(saved_at) > self.ttl,
            None => true,
        };
        if expired {
            info!("session: record from {} expired", session.timestamp);
            self.clear(store);
            return SessionRestore::Expired;
        }

        if !session.remote_playlist.is_empty() {
            let tracks: Vec<Track> = session
                .remote_playlist
                .into_iter()
                .map(RemoteTrackRecord::into_track)
                .collect();
            let current = usize::try_from(session.current_track_index)
                .ok()
                .filter(|&i| i < tracks.len());
            return SessionRestore::Remote(RestoredSession {
                tracks,
                current,
                folder_mode: session.current_folder_mode,
                folder_name: session.current_folder_name,
                path: session.current_path,
            });
        }

        match session.local_playlist {
            Some(local) if local.count > 0 => SessionRestore::LocalOnly {
                folder_name: local.folder_name,
                count: local.count,
            },
            _ => SessionRestore::Empty,
        }
    }

    pub fn clear(&self, store: &mut dyn KeyValueStore) {
        if let Err(e) = store.remove(SESSION_KEY) {
            warn!("session: failed to clear record: {}", e);
        }
    }
}

impl RemoteTrackRecord {
    fn into_track(self) -> Track {
        let mut track = Track::remote(self.name, self.file_id);
        track.size = self.size;
        track
    }
}

fn snapshot_session(state: &PlaybackState, now: DateTime<Utc>) -> PersistedSession {
    let mut remote_playlist = Vec::new();
    let mut local_names = Vec::new();
    let mut current_track_index = -1;

    for (i, track) in state.playlist.iter().enumerate() {
        match &track.location {
            TrackLocation::Remote { file_id } => {
                if state.current == Some(i) {
                    current_track_index = remote_playlist.len() as i64;
                }
                remote_playlist.push(RemoteTrackRecord {
                    name: track.name.clone(),
                    file_id: file_id.clone(),
                    source: TrackSource::Remote.label().to_string(),
                    size: track.size.clone(),
                });
            }
            TrackLocation::Local { .. } => local_names.push(track.name.clone()),
        }
    }

    let local_playlist = (!local_names.is_empty()).then(|| LocalPlaylistRecord {
        folder_name: state.folder_name.clone(),
        count: local_names.len(),
        file_names: local_names,
    });

    PersistedSession {
        timestamp: now.timestamp_millis(),
        current_folder_mode: state.folder_mode.clone(),
        current_folder_name: state.folder_name.clone(),
        current_track_index,
        remote_playlist,
        local_playlist,
        current_path: state.current_path.clone(),
    }
}

fn reduce(mut session: PersistedSession, limit: usize) -> PersistedSession {
    session.remote_playlist.truncate(limit);
    session.local_playlist = None;
    if session.current_track_index >= session.remote_playlist.len() as i64 {
        session.current_track_index = -1;
    }
    session
}
