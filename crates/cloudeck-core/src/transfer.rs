//! Export/import of user preferences, and their persisted copy.
//!
//! The same document is written to `audio-player-state-YYYY-MM-DD.json` on
//! export and stored under [`PREFERENCES_KEY`] between runs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::library::{Favorites, RecentlyPlayed};
use crate::state::PlaybackState;
use crate::store::{KeyValueStore, StoreError};

pub const STATE_FILE_VERSION: &str = "2.2";
pub const PREFERENCES_KEY: &str = "playerPreferences";

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Invalid state file format")]
    InvalidFormat,
    #[error("cannot parse state file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    pub version: String,
    #[serde(default = "default_volume", deserialize_with = "lenient_volume")]
    pub volume: u8,
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default)]
    pub favorites: Vec<String>,
    #[serde(default)]
    pub recently_played: Vec<String>,
    #[serde(default)]
    pub current_folder_mode: Option<String>,
    #[serde(default)]
    pub current_folder_name: String,
    #[serde(default)]
    pub export_date: Option<String>,
}

fn default_volume() -> u8 {
    100
}

/// Older exports carry the volume as a slider string ("75") or a float left
/// over from unmuting. Anything unreadable falls back to full volume.
fn lenient_volume<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let level = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(match level {
        Some(v) if v.is_finite() => v.round().clamp(0.0, 100.0) as u8,
        _ => default_volume(),
    })
}

impl StateFile {
    pub fn capture(state: &PlaybackState, now: DateTime<Utc>) -> Self {
        Self {
            version: STATE_FILE_VERSION.to_string(),
            // A muted player exports the level it will return to.
            volume: state.muted_from.unwrap_or(state.volume),
            dark_mode: state.dark_mode,
            favorites: state.favorites.keys().to_vec(),
            recently_played: state.recent.keys().to_vec(),
            current_folder_mode: state.folder_mode.clone(),
            current_folder_name: state.folder_name.clone(),
            export_date: Some(now.to_rfc3339()),
        }
    }

    /// Copy the preferences into `state` and rebuild the view.
    pub fn apply(self, state: &mut PlaybackState) {
        state.volume = self.volume.min(100);
        state.muted_from = None;
        state.dark_mode = self.dark_mode;
        state.favorites = Favorites::from_keys(self.favorites);
        state.recent = RecentlyPlayed::from_keys(self.recently_played);
        state.folder_mode = self.current_folder_mode;
        state.folder_name = self.current_folder_name;
        state.refilter();
    }

    /// A document without a `version` field is rejected outright.
    pub fn parse(raw: &str) -> Result<Self, TransferError> {
        let mut value: Value = serde_json::from_str(raw)?;
        let version = match value.get("version") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(TransferError::InvalidFormat),
        };
        value["version"] = Value::String(version);
        Ok(serde_json::from_value(value)?)
    }
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("audio-player-state-{}.json", now.format("%Y-%m-%d"))
}

pub fn export(state: &PlaybackState, dir: &Path, now: DateTime<Utc>) -> Result<PathBuf, TransferError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(now));
    let raw = serde_json::to_string_pretty(&StateFile::capture(state, now))?;
    std::fs::write(&path, raw)?;
    info!("transfer: exported state to {}", path.display());
    Ok(path)
}

pub fn import(path: &Path) -> Result<StateFile, TransferError> {
    let raw = std::fs::read_to_string(path)?;
    StateFile::parse(&raw)
}

pub fn save_preferences(
    store: &mut dyn KeyValueStore,
    state: &PlaybackState,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    store.set(
        PREFERENCES_KEY,
        serde_json::to_string(&StateFile::capture(state, now))?,
    )
}

pub fn load_preferences(store: &dyn KeyValueStore) -> Option<StateFile> {
    let raw = store.get(PREFERENCES_KEY)?;
    match StateFile::parse(&raw) {
        Ok(prefs) => Some(prefs),
        Err(e) => {
            warn!("transfer: ignoring stored preferences: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Track;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    #[test]
    fn test_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = PlaybackState::new(40);
        state.dark_mode = true;
        state.favorites.toggle("f1");
        state.recent.record("r1");
        state.folder_mode = Some("Live".into());
        state.folder_name = "Live".into();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();

        let path = export(&state, dir.path(), now).unwrap();
        assert!(path.ends_with("audio-player-state-2024-03-09.json"));

        let imported = import(&path).unwrap();
        assert_eq!(imported.version, STATE_FILE_VERSION);
        let mut fresh = PlaybackState::new(100);
        fresh.set_playlist(vec![Track::remote("x", "f1")]);
        imported.apply(&mut fresh);
        assert_eq!(fresh.volume, 40);
        assert!(fresh.dark_mode);
        assert!(fresh.favorites.contains("f1"));
        assert_eq!(fresh.recent.keys(), ["r1".to_string()]);
        assert_eq!(fresh.folder_mode.as_deref(), Some("Live"));
    }

    #[test]
    fn test_missing_version_is_rejected() {
        let err = StateFile::parse(r#"{"volume": 50, "favorites": []}"#).unwrap_err();
        assert!(matches!(err, TransferError::InvalidFormat));
        assert_eq!(err.to_string(), "Invalid state file format");
        assert!(matches!(
            StateFile::parse("not json"),
            Err(TransferError::Parse(_))
        ));
    }

    #[test]
    fn test_sparse_document_gets_defaults() {
        let prefs = StateFile::parse(r#"{"version": 2}"#).unwrap();
        assert_eq!(prefs.version, "2");
        assert_eq!(prefs.volume, 100);
        assert!(prefs.favorites.is_empty());
    }

    #[test]
    fn test_volume_accepts_strings_and_floats() {
        let volume = |raw: &str| {
            StateFile::parse(&format!(r#"{{"version": "2.2", "volume": {}, "favorites": ["a"]}}"#, raw))
                .unwrap()
                .volume
        };
        assert_eq!(volume(r#""75""#), 75);
        assert_eq!(volume("56.99999999999999"), 57);
        assert_eq!(volume("250"), 100);
        assert_eq!(volume("-3"), 0);
        assert_eq!(volume(r#""loud""#), 100);
        assert_eq!(volume("null"), 100);

        let prefs = StateFile::parse(r#"{"version": "2.2", "volume": "40", "favorites": ["f1"]}"#).unwrap();
        assert_eq!(prefs.favorites, ["f1"]);
    }

    #[test]
    fn test_muted_volume_is_exported_unmuted() {
        let mut state = PlaybackState::new(0);
        state.muted_from = Some(65);
        assert_eq!(StateFile::capture(&state, Utc::now()).volume, 65);
    }

    #[test]
    fn test_preferences_round_trip() {
        let mut store = MemoryStore::new();
        let mut state = PlaybackState::new(70);
        state.favorites.toggle("a");
        save_preferences(&mut store, &state, Utc::now()).unwrap();
        let prefs = load_preferences(&store).unwrap();
        assert_eq!(prefs.volume, 70);
        assert_eq!(prefs.favorites, ["a"]);
    }
}
