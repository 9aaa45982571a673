//! The single owned player state record.
//!
//! `current` always indexes `playlist`; `view` holds playlist indices and is
//! only ever rebuilt through [`PlaybackState::refilter`].

use std::sync::Arc;

use crate::filter;
use crate::library::{Favorites, RecentlyPlayed};
use crate::protocol::{PlaybackStatus, RepeatMode, Tab, Track};

#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub playlist: Arc<Vec<Track>>,
    pub view: Arc<Vec<usize>>,
    pub current: Option<usize>,
    pub status: PlaybackStatus,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    /// 0-100.
    pub volume: u8,
    /// Volume to restore when unmuting; `Some` while muted.
    pub muted_from: Option<u8>,
    pub tab: Tab,
    pub query: String,
    pub position: Option<f64>,
    pub duration: Option<f64>,
    pub favorites: Favorites,
    pub recent: RecentlyPlayed,
    /// Folder the playlist was loaded from, if any.
    pub folder_mode: Option<String>,
    pub folder_name: String,
    /// Remote folder navigation path at the time the playlist was loaded.
    pub current_path: Vec<String>,
    pub dark_mode: bool,
}

impl PlaybackState {
    pub fn new(volume: u8) -> Self {
        Self {
            playlist: Arc::new(Vec::new()),
            view: Arc::new(Vec::new()),
            current: None,
            status: PlaybackStatus::Idle,
            shuffle: false,
            repeat: RepeatMode::Off,
            volume: volume.min(100),
            muted_from: None,
            tab: Tab::All,
            query: String::new(),
            position: None,
            duration: None,
            favorites: Favorites::default(),
            recent: RecentlyPlayed::default(),
            folder_mode: None,
            folder_name: String::new(),
            current_path: Vec::new(),
            dark_mode: false,
        }
    }

    pub fn refilter(&mut self) {
        self.view = Arc::new(filter::filter(
            &self.playlist,
            self.tab,
            &self.favorites,
            &self.recent,
            &self.query,
        ));
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.playlist.get(i))
    }

    /// Position of the current track inside the filtered view.
    pub fn current_view_pos(&self) -> Option<usize> {
        let current = self.current?;
        self.view.iter().position(|&i| i == current)
    }

    /// Resolve a view position to its playlist index.
    pub fn playlist_index(&self, view_index: usize) -> Option<usize> {
        self.view.get(view_index).copied()
    }

    pub fn is_seekable(&self) -> bool {
        self.current_track().is_some_and(Track::is_seekable)
    }

    pub fn is_muted(&self) -> bool {
        self.muted_from.is_some()
    }

    /// Replace the playlist.  Nothing is selected afterwards and the view
    /// shows every track.
    pub fn set_playlist(&mut self, tracks: Vec<Track>) {
        self.playlist = Arc::new(tracks);
        self.current = None;
        self.status = PlaybackStatus::Idle;
        self.reset_timeline();
        self.tab = Tab::All;
        self.query.clear();
        self.refilter();
    }

    /// Remove one playlist entry, keeping `current` pointing at the same
    /// track.  Returns true when the removed entry was the current track.
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.playlist.len() {
            return false;
        }
        Arc::make_mut(&mut self.playlist).remove(index);
        let was_current = self.current == Some(index);
        self.current = match self.current {
            Some(c) if c == index => None,
            Some(c) if c > index => Some(c - 1),
            other => other,
        };
        self.refilter();
        was_current
    }

    pub fn clear(&mut self) {
        self.playlist = Arc::new(Vec::new());
        self.view = Arc::new(Vec::new());
        self.current = None;
        self.status = PlaybackStatus::Idle;
        self.reset_timeline();
        self.query.clear();
        self.folder_mode = None;
        self.folder_name.clear();
        self.current_path.clear();
    }

    /// Case-insensitive sort by name; the current track stays current.
    pub fn sort_by_name(&mut self) {
        let mut order: Vec<usize> = (0..self.playlist.len()).collect();
        order.sort_by_cached_key(|&i| self.playlist[i].name.to_lowercase());
        let sorted: Vec<Track> = order.iter().map(|&i| self.playlist[i].clone()).collect();
        self.current = self
            .current
            .and_then(|c| order.iter().position(|&i| i == c));
        self.playlist = Arc::new(sorted);
        self.refilter();
    }

    pub fn reset_timeline(&mut self) {
        self.position = None;
        self.duration = None;
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            playlist: Arc::clone(&self.playlist),
            view: Arc::clone(&self.view),
            current: self.current,
            current_view_pos: self.current_view_pos(),
            status: self.status,
            shuffle: self.shuffle,
            repeat: self.repeat,
            volume: self.volume,
            muted: self.is_muted(),
            tab: self.tab,
            query: self.query.clone(),
            position: self.position,
            duration: self.duration,
            seekable: self.is_seekable(),
            favorites: self.favorites.clone(),
            folder_mode: self.folder_mode.clone(),
            folder_name: self.folder_name.clone(),
            dark_mode: self.dark_mode,
        }
    }
}

/// Read-only copy of the state handed to the renderer.
#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub playlist: Arc<Vec<Track>>,
    pub view: Arc<Vec<usize>>,
    pub current: Option<usize>,
    pub current_view_pos: Option<usize>,
    pub status: PlaybackStatus,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub volume: u8,
    pub muted: bool,
    pub tab: Tab,
    pub query: String,
    pub position: Option<f64>,
    pub duration: Option<f64>,
    /// False for remote streams; the progress bar renders disabled.
    pub seekable: bool,
    pub favorites: Favorites,
    pub folder_mode: Option<String>,
    pub folder_name: String,
    pub dark_mode: bool,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        PlaybackState::new(100).snapshot()
    }
}

impl PlayerSnapshot {
    pub fn current_track(&self) -> Option<&Track> {
        self.current.and_then(|i| self.playlist.get(i))
    }

    pub fn view_track(&self, view_index: usize) -> Option<&Track> {
        self.view.get(view_index).and_then(|&i| self.playlist.get(i))
    }

    /// Playback progress 0.0..=1.0 when both position and duration are known.
    pub fn progress(&self) -> Option<f64> {
        match (self.position, self.duration) {
            (Some(pos), Some(dur)) if dur > 0.0 => Some((pos / dur).clamp(0.0, 1.0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(names: &[&str]) -> PlaybackState {
        let mut state = PlaybackState::new(80);
        state.set_playlist(
            names
                .iter()
                .map(|n| Track::local(*n, format!("/m/{n}")))
                .collect(),
        );
        state
    }

    #[test]
    fn test_set_playlist_resets_selection_and_view() {
        let mut state = state_with(&["a", "b"]);
        state.current = Some(1);
        state.tab = Tab::Favorites;
        state.query = "x".into();
        state.set_playlist(vec![Track::local("c", "/m/c")]);
        assert_eq!(state.current, None);
        assert_eq!(state.tab, Tab::All);
        assert!(state.query.is_empty());
        assert_eq!(*state.view, vec![0]);
    }

    #[test]
    fn test_remove_keeps_current_on_same_track() {
        let mut state = state_with(&["a", "b", "c"]);
        state.current = Some(2);
        assert!(!state.remove(0));
        assert_eq!(state.current, Some(1));
        assert_eq!(state.current_track().unwrap().name, "c");

        assert!(state.remove(1));
        assert_eq!(state.current, None);
        assert_eq!(*state.view, vec![0]);
        assert!(!state.remove(9));
    }

    #[test]
    fn test_sort_follows_current() {
        let mut state = state_with(&["delta", "Alpha", "charlie", "bravo"]);
        state.current = Some(0);
        state.sort_by_name();
        let names: Vec<&str> = state.playlist.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "bravo", "charlie", "delta"]);
        assert_eq!(state.current, Some(3));
        assert_eq!(state.current_view_pos(), Some(3));
    }

    #[test]
    fn test_current_view_pos_tracks_filter() {
        let mut state = state_with(&["rock.mp3", "jazz.mp3", "rockabilly.mp3"]);
        state.current = Some(2);
        state.query = "rock".into();
        state.refilter();
        assert_eq!(state.current_view_pos(), Some(1));
        let snap = state.snapshot();
        assert_eq!(snap.view_track(1).map(|t| t.name.as_str()), Some("rockabilly.mp3"));
        assert!(snap.view_track(2).is_none());
        state.query = "jazz".into();
        state.refilter();
        assert_eq!(state.current_view_pos(), None);
        assert_eq!(state.current, Some(2));
    }

    #[test]
    fn test_snapshot_progress() {
        let mut state = state_with(&["a"]);
        state.current = Some(0);
        state.position = Some(30.0);
        state.duration = Some(120.0);
        let snap = state.snapshot();
        assert_eq!(snap.progress(), Some(0.25));
        assert!(snap.seekable);
    }
}
