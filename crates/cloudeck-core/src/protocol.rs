use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Remote-hosted tracks are streamed from this endpoint with the file id appended.
pub const REMOTE_STREAM_BASE: &str = "https://drive.google.com/uc?export=download&id=";

/// Where a track's audio lives.  A track has exactly one of the two.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackLocation {
    Local { path: PathBuf },
    Remote { file_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackSource {
    Local,
    Remote,
}

impl TrackSource {
    pub fn label(self) -> &'static str {
        match self {
            TrackSource::Local => "Local Folder",
            TrackSource::Remote => "Google Drive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub location: TrackLocation,
    /// Human readable size as reported by the source ("3.21 MB").
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl Track {
    pub fn local(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            location: TrackLocation::Local { path: path.into() },
            size: None,
            size_bytes: None,
            duration: None,
        }
    }

    pub fn remote(name: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: TrackLocation::Remote {
                file_id: file_id.into(),
            },
            size: None,
            size_bytes: None,
            duration: None,
        }
    }

    /// Identity used by favorites, recently-played and analytics: the remote
    /// file id when there is one, otherwise the file name.  Two local files
    /// with the same name share a key.
    pub fn id_key(&self) -> &str {
        match &self.location {
            TrackLocation::Remote { file_id } => file_id,
            TrackLocation::Local { .. } => &self.name,
        }
    }

    pub fn source(&self) -> TrackSource {
        match self.location {
            TrackLocation::Local { .. } => TrackSource::Local,
            TrackLocation::Remote { .. } => TrackSource::Remote,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.source() == TrackSource::Remote
    }

    /// Remote streams cannot be seeked.
    pub fn is_seekable(&self) -> bool {
        !self.is_remote()
    }

    /// What the media backend should open.
    pub fn play_target(&self) -> String {
        match &self.location {
            TrackLocation::Local { path } => path.to_string_lossy().into_owned(),
            TrackLocation::Remote { file_id } => format!("{REMOTE_STREAM_BASE}{file_id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// Off → All → One → Off.
    pub fn cycle(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RepeatMode::Off => "Repeat Off",
            RepeatMode::All => "Repeat All",
            RepeatMode::One => "Repeat One",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    All,
    Favorites,
    Recent,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::All, Tab::Favorites, Tab::Recent];

    pub fn label(self) -> &'static str {
        match self {
            Tab::All => "All",
            Tab::Favorites => "Favorites",
            Tab::Recent => "Recent",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Tab::All => Tab::Favorites,
            Tab::Favorites => Tab::Recent,
            Tab::Recent => Tab::All,
        }
    }
}

/// Player lifecycle as driven by commands and media events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    #[default]
    Idle, // nothing loaded or explicitly stopped
    Loading, // load sent, waiting for media-ready
    Playing,
    Paused,
    Ended, // natural completion, before the next selection is made
}

impl PlaybackStatus {
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackStatus::Loading | PlaybackStatus::Playing)
    }
}

/// Named intents accepted by the player.  The terminal front end maps keys to
/// these; nothing else mutates player state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    LoadTrack { view_index: usize },
    TogglePlayPause,
    Next,
    Previous,
    Stop,
    SeekTo { seconds: f64 },
    SeekRelative { seconds: f64 },
    SetVolume { value: u8 },
    VolumeStep { delta: i16 },
    ToggleMute,
    ToggleShuffle,
    CycleRepeat,
    /// `None` toggles the current track.
    ToggleFavorite { view_index: Option<usize> },
    SwitchTab { tab: Tab },
    Search { query: String },
    RemoveTrack { view_index: usize },
    ClearPlaylist,
    SortPlaylist,
    /// Replace the playlist with a folder's tracks.
    SetPlaylist {
        folder_name: String,
        tracks: Vec<Track>,
        path: Vec<String>,
    },
    ClearFolderMode,
    LoadLocalFolder { path: PathBuf },
    BrowseRemote { refresh: bool },
    CancelBrowse,
    ExportState,
    ImportState { path: PathBuf },
    ToggleDarkMode,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
