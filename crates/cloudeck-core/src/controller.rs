//! PlayerController: command dispatcher and playback state machine.
//!
//! The controller owns the [`PlaybackState`] and is the only thing that
//! mutates it.  It never performs I/O: every command or media event returns a
//! list of [`Effect`]s (media commands, persistence requests, notices) that the
//! runtime carries out.
//!
//! ```text
//!   Idle ──LoadTrack──▶ Loading ──Ready──▶ Playing ◀──toggle──▶ Paused
//!                          │                   │
//!                        Failed              Ended ──▶ next track | Idle
//!                          ▼
//!                        Idle
//! ```

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::protocol::{Command, Notice, PlaybackStatus, RepeatMode, Tab, Track};
use crate::selector::{self, Previous};
use crate::session::RestoredSession;
use crate::state::PlaybackState;
use crate::transfer::StateFile;

/// Instructions for the media backend.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaCommand {
    Load {
        target: String,
        seekable: bool,
        volume: u8,
    },
    Pause,
    Resume,
    SeekTo(f64),
    SetVolume(u8),
    Stop,
}

/// What the media backend reports back.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// The loaded track started producing audio.
    Ready,
    /// The track could not be opened.
    Failed(String),
    /// A pause/resume request was refused.
    Rejected(String),
    /// The backend's own pause flag changed.
    Paused(bool),
    Position(Option<f64>),
    Duration(Option<f64>),
    /// Natural completion.
    Ended,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Media(MediaCommand),
    /// Persist the session (the runtime debounces this).
    SaveSession,
    SavePreferences,
    ClearSession,
    Notify(Notice),
    /// A track played to its end; feeds analytics.
    TrackPlayed { id: String, duration: Option<f64> },
}

pub struct PlayerController<R: Rng = StdRng> {
    state: PlaybackState,
    rng: R,
    restart_threshold: f64,
}

impl<R: Rng> PlayerController<R> {
    pub fn new(state: PlaybackState, rng: R, restart_threshold: f64) -> Self {
        Self {
            state,
            rng,
            restart_threshold,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    pub fn dispatch(&mut self, cmd: Command) -> Vec<Effect> {
        debug!("controller: {:?}", cmd);
        match cmd {
            Command::LoadTrack { view_index } => self.load_track(view_index),
            Command::TogglePlayPause => self.toggle_play_pause(),
            Command::Next => self.play_next(),
            Command::Previous => self.play_previous(),
            Command::Stop => self.stop(),
            Command::SeekTo { seconds } => self.seek_to(seconds),
            Command::SeekRelative { seconds } => {
                let base = self.state.position.unwrap_or(0.0);
                self.seek_to(base + seconds)
            }
            Command::SetVolume { value } => self.set_volume(value),
            Command::VolumeStep { delta } => {
                let base = self.state.muted_from.unwrap_or(self.state.volume);
                let value = i16::from(base).saturating_add(delta).clamp(0, 100) as u8;
                self.set_volume(value)
            }
            Command::ToggleMute => self.toggle_mute(),
            Command::ToggleShuffle => {
                self.state.shuffle = !self.state.shuffle;
                let label = if self.state.shuffle { "Shuffle On" } else { "Shuffle Off" };
                vec![Effect::Notify(Notice::info(label))]
            }
            Command::CycleRepeat => {
                self.state.repeat = self.state.repeat.cycle();
                vec![Effect::Notify(Notice::info(self.state.repeat.label()))]
            }
            Command::ToggleFavorite { view_index } => self.toggle_favorite(view_index),
            Command::SwitchTab { tab } => {
                self.state.tab = tab;
                self.state.query.clear();
                self.state.refilter();
                Vec::new()
            }
            Command::Search { query } => {
                self.state.query = query;
                self.state.refilter();
                Vec::new()
            }
            Command::RemoveTrack { view_index } => self.remove_track(view_index),
            Command::ClearPlaylist => {
                self.state.clear();
                vec![
                    Effect::Media(MediaCommand::Stop),
                    Effect::ClearSession,
                    Effect::Notify(Notice::info("Playlist cleared")),
                ]
            }
            Command::SortPlaylist => {
                self.state.sort_by_name();
                vec![Effect::SaveSession, Effect::Notify(Notice::info("Sorted A-Z"))]
            }
            Command::SetPlaylist {
                folder_name,
                tracks,
                path,
            } => self.set_playlist(folder_name, tracks, path),
            Command::ClearFolderMode => {
                let was_loaded = self.state.current.is_some();
                self.state.clear();
                let mut fx = vec![
                    Effect::SaveSession,
                    Effect::Notify(Notice::info("Folder mode cleared")),
                ];
                if was_loaded {
                    fx.insert(0, Effect::Media(MediaCommand::Stop));
                }
                fx
            }
            Command::ToggleDarkMode => {
                self.state.dark_mode = !self.state.dark_mode;
                vec![Effect::SavePreferences]
            }
            // Runtime concerns: folder scans, network, files, lifecycle.
            Command::LoadLocalFolder { .. }
            | Command::BrowseRemote { .. }
            | Command::CancelBrowse
            | Command::ExportState
            | Command::ImportState { .. }
            | Command::Shutdown => Vec::new(),
        }
    }

    fn load_track(&mut self, view_index: usize) -> Vec<Effect> {
        match self.state.playlist_index(view_index) {
            Some(index) => self.load_playlist_index(index),
            None => {
                debug!("controller: view index {} out of range", view_index);
                Vec::new()
            }
        }
    }

    fn load_playlist_index(&mut self, index: usize) -> Vec<Effect> {
        let Some(track) = self.state.playlist.get(index).cloned() else {
            return Vec::new();
        };
        info!("controller: loading '{}'", track.name);
        self.state.current = Some(index);
        self.state.status = PlaybackStatus::Loading;
        self.state.reset_timeline();
        self.state.duration = track.duration;
        self.state.recent.record(track.id_key());

        vec![
            Effect::Media(MediaCommand::Load {
                target: track.play_target(),
                seekable: track.is_seekable(),
                volume: self.state.volume,
            }),
            Effect::SaveSession,
            Effect::SavePreferences,
        ]
    }

    fn toggle_play_pause(&mut self) -> Vec<Effect> {
        match self.state.status {
            PlaybackStatus::Playing | PlaybackStatus::Loading => {
                self.state.status = PlaybackStatus::Paused;
                vec![Effect::Media(MediaCommand::Pause)]
            }
            PlaybackStatus::Paused => {
                self.state.status = PlaybackStatus::Playing;
                vec![Effect::Media(MediaCommand::Resume)]
            }
            PlaybackStatus::Idle | PlaybackStatus::Ended => match self.state.current {
                Some(index) => self.load_playlist_index(index),
                None if !self.state.view.is_empty() => self.load_track(0),
                None => Vec::new(),
            },
        }
    }

    fn play_next(&mut self) -> Vec<Effect> {
        let selection = selector::next(
            self.state.view.len(),
            self.state.current_view_pos(),
            self.state.shuffle,
            self.state.repeat,
            &mut self.rng,
        );
        match selection {
            Some(sel) => self.load_track(sel.index),
            None => Vec::new(),
        }
    }

    fn play_previous(&mut self) -> Vec<Effect> {
        let elapsed = self
            .state
            .current
            .map(|_| self.state.position.unwrap_or(0.0));
        let choice = selector::previous(
            self.state.view.len(),
            self.state.current_view_pos(),
            elapsed,
            self.state.is_seekable(),
            self.restart_threshold,
        );
        match choice {
            Some(Previous::Restart) => {
                self.state.position = Some(0.0);
                vec![Effect::Media(MediaCommand::SeekTo(0.0))]
            }
            Some(Previous::Index(i)) => self.load_track(i),
            None => Vec::new(),
        }
    }

    fn stop(&mut self) -> Vec<Effect> {
        self.state.status = PlaybackStatus::Idle;
        self.state.reset_timeline();
        vec![Effect::Media(MediaCommand::Stop), Effect::SaveSession]
    }

    fn seek_to(&mut self, seconds: f64) -> Vec<Effect> {
        let Some(track) = self.state.current_track() else {
            return Vec::new();
        };
        if !track.is_seekable() {
            return vec![Effect::Notify(Notice::info(
                "Seeking is not available for Drive tracks",
            ))];
        }
        let upper = self.state.duration.unwrap_or(f64::MAX);
        let target = seconds.clamp(0.0, upper.max(0.0));
        self.state.position = Some(target);
        vec![Effect::Media(MediaCommand::SeekTo(target))]
    }

    fn set_volume(&mut self, value: u8) -> Vec<Effect> {
        let value = value.min(100);
        self.state.volume = value;
        self.state.muted_from = None;
        vec![
            Effect::Media(MediaCommand::SetVolume(value)),
            Effect::SavePreferences,
        ]
    }

    fn toggle_mute(&mut self) -> Vec<Effect> {
        match self.state.muted_from.take() {
            Some(previous) => self.state.volume = previous,
            None => {
                self.state.muted_from = Some(self.state.volume);
                self.state.volume = 0;
            }
        }
        vec![
            Effect::Media(MediaCommand::SetVolume(self.state.volume)),
            Effect::SavePreferences,
        ]
    }

    fn toggle_favorite(&mut self, view_index: Option<usize>) -> Vec<Effect> {
        let track = match view_index {
            Some(i) => self.state.playlist_index(i),
            None => self.state.current,
        }
        .and_then(|i| self.state.playlist.get(i));
        let Some(key) = track.map(|t| t.id_key().to_string()) else {
            return Vec::new();
        };

        let added = self.state.favorites.toggle(&key);
        if self.state.tab == Tab::Favorites {
            self.state.refilter();
        }
        let message = if added {
            "Added to favorites"
        } else {
            "Removed from favorites"
        };
        vec![
            Effect::SavePreferences,
            Effect::Notify(Notice::success(message)),
        ]
    }

    fn remove_track(&mut self, view_index: usize) -> Vec<Effect> {
        let Some(index) = self.state.playlist_index(view_index) else {
            return Vec::new();
        };
        let was_current = self.state.remove(index);
        let mut fx = vec![Effect::Notify(Notice::info("Track removed"))];

        if was_current {
            if self.state.view.is_empty() {
                fx.extend(self.stop());
            } else {
                let next = view_index.min(self.state.view.len() - 1);
                fx.extend(self.load_track(next));
            }
        } else {
            fx.push(Effect::SaveSession);
        }
        fx
    }

    fn set_playlist(&mut self, folder_name: String, tracks: Vec<Track>, path: Vec<String>) -> Vec<Effect> {
        if tracks.is_empty() {
            return vec![Effect::Notify(Notice::info("No audio files in this folder"))];
        }
        let was_loaded = self.state.current.is_some();
        let count = tracks.len();
        self.state.set_playlist(tracks);
        self.state.folder_mode = Some(folder_name.clone());
        self.state.folder_name = folder_name.clone();
        self.state.current_path = path;

        let mut fx = vec![
            Effect::SaveSession,
            Effect::Notify(Notice::success(format!(
                "Loaded {} tracks from \"{}\"",
                count, folder_name
            ))),
        ];
        if was_loaded {
            fx.insert(0, Effect::Media(MediaCommand::Stop));
        }
        fx
    }

    // ── Media events ──────────────────────────────────────────────────────────

    pub fn on_media(&mut self, event: MediaEvent) -> Vec<Effect> {
        match event {
            MediaEvent::Ready => {
                if self.state.status == PlaybackStatus::Loading {
                    self.state.status = PlaybackStatus::Playing;
                }
                Vec::new()
            }
            MediaEvent::Failed(reason) => {
                warn!("controller: load failed: {}", reason);
                self.state.status = PlaybackStatus::Idle;
                self.state.reset_timeline();
                let name = self
                    .state
                    .current_track()
                    .map(|t| t.name.clone())
                    .unwrap_or_default();
                vec![Effect::Notify(Notice::error(format!(
                    "Playback failed: {}",
                    name
                )))]
            }
            MediaEvent::Rejected(reason) => {
                warn!("controller: playback rejected: {}", reason);
                if self.state.current.is_some() {
                    self.state.status = PlaybackStatus::Paused;
                }
                vec![Effect::Notify(Notice::warning("Playback failed"))]
            }
            MediaEvent::Paused(paused) => {
                match (self.state.status, paused) {
                    (PlaybackStatus::Playing, true) => self.state.status = PlaybackStatus::Paused,
                    (PlaybackStatus::Paused, false) => self.state.status = PlaybackStatus::Playing,
                    _ => {}
                }
                Vec::new()
            }
            MediaEvent::Position(pos) => {
                if self.state.current.is_some() {
                    self.state.position = pos;
                }
                Vec::new()
            }
            MediaEvent::Duration(dur) => {
                if self.state.current.is_some() {
                    self.state.duration = dur.or(self.state.duration);
                }
                Vec::new()
            }
            MediaEvent::Ended => self.handle_track_end(),
        }
    }

    /// Repeat-one and shuffle always continue; repeat-all wraps; repeat-off
    /// stops after the last track of the view.
    fn handle_track_end(&mut self) -> Vec<Effect> {
        // A stale end-of-file from the previous track can arrive while the
        // next one is still loading.
        if self.state.status != PlaybackStatus::Playing {
            return Vec::new();
        }
        let Some(track) = self.state.current_track() else {
            return Vec::new();
        };
        let mut fx = vec![Effect::TrackPlayed {
            id: track.id_key().to_string(),
            duration: self.state.duration,
        }];
        self.state.status = PlaybackStatus::Ended;

        let selection = selector::next(
            self.state.view.len(),
            self.state.current_view_pos(),
            self.state.shuffle,
            self.state.repeat,
            &mut self.rng,
        );
        let stop_at_end = !self.state.shuffle && self.state.repeat == RepeatMode::Off;
        match selection {
            Some(sel) if !(sel.wrapped && stop_at_end) => fx.extend(self.load_track(sel.index)),
            _ => {
                info!("controller: end of playlist");
                self.state.status = PlaybackStatus::Idle;
                self.state.reset_timeline();
                fx.push(Effect::SaveSession);
            }
        }
        fx
    }

    // ── Startup / import ──────────────────────────────────────────────────────

    /// Reinstate a saved remote session without starting playback.
    pub fn restore_session(&mut self, restored: RestoredSession) -> Vec<Effect> {
        let count = restored.tracks.len();
        self.state.set_playlist(restored.tracks);
        self.state.current = restored.current;
        self.state.folder_mode = restored.folder_mode;
        self.state.folder_name = restored.folder_name;
        self.state.current_path = restored.path;
        vec![Effect::Notify(Notice::info(format!(
            "Restored {} tracks from last session",
            count
        )))]
    }

    pub fn apply_preferences(&mut self, prefs: StateFile) {
        prefs.apply(&mut self.state);
    }

    pub fn import_state(&mut self, prefs: StateFile) -> Vec<Effect> {
        prefs.apply(&mut self.state);
        vec![
            Effect::Media(MediaCommand::SetVolume(self.state.volume)),
            Effect::SavePreferences,
            Effect::Notify(Notice::success("State imported successfully")),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::NoticeLevel;
    use rand::SeedableRng;

    fn controller(tracks: Vec<Track>) -> PlayerController<StdRng> {
        let mut state = PlaybackState::new(80);
        state.set_playlist(tracks);
        PlayerController::new(state, StdRng::seed_from_u64(1), 3.0)
    }

    fn remote(names: &[&str]) -> Vec<Track> {
        names.iter().map(|n| Track::remote(*n, format!("id-{n}"))).collect()
    }

    fn local(names: &[&str]) -> Vec<Track> {
        names.iter().map(|n| Track::local(*n, format!("/m/{n}"))).collect()
    }

    fn loaded_target(fx: &[Effect]) -> Option<String> {
        fx.iter().find_map(|e| match e {
            Effect::Media(MediaCommand::Load { target, .. }) => Some(target.clone()),
            _ => None,
        })
    }

    fn notice(fx: &[Effect]) -> Option<&Notice> {
        fx.iter().find_map(|e| match e {
            Effect::Notify(n) => Some(n),
            _ => None,
        })
    }

    fn play(c: &mut PlayerController<StdRng>, view_index: usize) {
        c.dispatch(Command::LoadTrack { view_index });
        c.on_media(MediaEvent::Ready);
    }

    #[test]
    fn test_load_track_effects() {
        let mut c = controller(remote(&["a", "b"]));
        let fx = c.dispatch(Command::LoadTrack { view_index: 1 });
        assert_eq!(c.state().current, Some(1));
        assert_eq!(c.state().status, PlaybackStatus::Loading);
        assert_eq!(
            fx[0],
            Effect::Media(MediaCommand::Load {
                target: "https://drive.google.com/uc?export=download&id=id-b".into(),
                seekable: false,
                volume: 80,
            })
        );
        assert!(fx.contains(&Effect::SaveSession));
        assert_eq!(c.state().recent.keys(), ["id-b".to_string()]);

        c.on_media(MediaEvent::Ready);
        assert_eq!(c.state().status, PlaybackStatus::Playing);
    }

    #[test]
    fn test_out_of_range_load_is_ignored() {
        let mut c = controller(remote(&["a"]));
        assert!(c.dispatch(Command::LoadTrack { view_index: 5 }).is_empty());
        assert_eq!(c.state().current, None);
    }

    #[test]
    fn test_toggle_with_nothing_loaded_plays_first() {
        let mut c = controller(local(&["a", "b"]));
        let fx = c.dispatch(Command::TogglePlayPause);
        assert_eq!(loaded_target(&fx).as_deref(), Some("/m/a"));
        c.on_media(MediaEvent::Ready);
        assert_eq!(
            c.dispatch(Command::TogglePlayPause),
            vec![Effect::Media(MediaCommand::Pause)]
        );
        assert_eq!(c.state().status, PlaybackStatus::Paused);
        assert_eq!(
            c.dispatch(Command::TogglePlayPause),
            vec![Effect::Media(MediaCommand::Resume)]
        );
        assert_eq!(c.state().status, PlaybackStatus::Playing);
    }

    #[test]
    fn test_toggle_on_empty_view_does_nothing() {
        let mut c = controller(Vec::new());
        assert!(c.dispatch(Command::TogglePlayPause).is_empty());
    }

    #[test]
    fn test_repeat_all_next_from_last_wraps() {
        let mut c = controller(remote(&["A", "B", "C"]));
        c.dispatch(Command::CycleRepeat);
        assert_eq!(c.state().repeat, RepeatMode::All);
        play(&mut c, 2);
        let fx = c.on_media(MediaEvent::Ended);
        assert_eq!(c.state().current, Some(0));
        assert!(fx.contains(&Effect::TrackPlayed {
            id: "id-C".into(),
            duration: None
        }));
    }

    #[test]
    fn test_track_end_stops_at_last_with_repeat_off() {
        let mut c = controller(local(&["a", "b"]));
        play(&mut c, 0);
        c.on_media(MediaEvent::Ended);
        assert_eq!(c.state().current, Some(1));
        c.on_media(MediaEvent::Ready);
        let fx = c.on_media(MediaEvent::Ended);
        assert_eq!(c.state().status, PlaybackStatus::Idle);
        assert_eq!(c.state().current, Some(1));
        assert!(loaded_target(&fx).is_none());
    }

    #[test]
    fn test_end_while_loading_is_ignored() {
        let mut c = controller(local(&["a", "b"]));
        play(&mut c, 0);
        c.dispatch(Command::LoadTrack { view_index: 1 });
        assert!(c.on_media(MediaEvent::Ended).is_empty());
        assert_eq!(c.state().current, Some(1));
        assert_eq!(c.state().status, PlaybackStatus::Loading);
    }

    #[test]
    fn test_manual_next_wraps_even_with_repeat_off() {
        let mut c = controller(local(&["a", "b"]));
        play(&mut c, 1);
        c.dispatch(Command::Next);
        assert_eq!(c.state().current, Some(0));
    }

    #[test]
    fn test_repeat_one_replays_on_end() {
        let mut c = controller(local(&["a", "b"]));
        c.dispatch(Command::CycleRepeat);
        c.dispatch(Command::CycleRepeat);
        play(&mut c, 0);
        let fx = c.on_media(MediaEvent::Ended);
        assert_eq!(loaded_target(&fx).as_deref(), Some("/m/a"));
    }

    #[test]
    fn test_shuffle_single_track_replays() {
        let mut c = controller(local(&["solo"]));
        c.dispatch(Command::ToggleShuffle);
        play(&mut c, 0);
        c.on_media(MediaEvent::Ended);
        assert_eq!(c.state().current, Some(0));
        assert_eq!(c.state().status, PlaybackStatus::Loading);
    }

    #[test]
    fn test_previous_restarts_or_steps_back() {
        let mut c = controller(local(&["a", "b", "c"]));
        play(&mut c, 1);
        c.on_media(MediaEvent::Position(Some(12.0)));
        assert_eq!(
            c.dispatch(Command::Previous),
            vec![Effect::Media(MediaCommand::SeekTo(0.0))]
        );
        c.on_media(MediaEvent::Position(Some(1.0)));
        c.dispatch(Command::Previous);
        assert_eq!(c.state().current, Some(0));
    }

    #[test]
    fn test_remote_tracks_refuse_seek() {
        let mut c = controller(remote(&["a"]));
        play(&mut c, 0);
        let fx = c.dispatch(Command::SeekTo { seconds: 30.0 });
        assert_eq!(fx.len(), 1);
        assert!(matches!(&fx[0], Effect::Notify(n) if n.level == NoticeLevel::Info));
        assert!(!c.state().is_seekable());
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let mut c = controller(local(&["a"]));
        play(&mut c, 0);
        c.on_media(MediaEvent::Duration(Some(100.0)));
        assert_eq!(
            c.dispatch(Command::SeekTo { seconds: 250.0 }),
            vec![Effect::Media(MediaCommand::SeekTo(100.0))]
        );
        assert_eq!(
            c.dispatch(Command::SeekRelative { seconds: -500.0 }),
            vec![Effect::Media(MediaCommand::SeekTo(0.0))]
        );
    }

    #[test]
    fn test_rejection_reverts_to_paused() {
        let mut c = controller(local(&["a"]));
        play(&mut c, 0);
        let fx = c.on_media(MediaEvent::Rejected("device busy".into()));
        assert_eq!(c.state().status, PlaybackStatus::Paused);
        assert_eq!(notice(&fx).unwrap().level, NoticeLevel::Warning);
    }

    #[test]
    fn test_load_failure_goes_idle() {
        let mut c = controller(local(&["a"]));
        c.dispatch(Command::LoadTrack { view_index: 0 });
        let fx = c.on_media(MediaEvent::Failed("no such file".into()));
        assert_eq!(c.state().status, PlaybackStatus::Idle);
        assert_eq!(c.state().current, Some(0));
        assert_eq!(notice(&fx).unwrap().message, "Playback failed: a");
    }

    #[test]
    fn test_mute_restores_previous_volume() {
        let mut c = controller(local(&["a"]));
        c.dispatch(Command::SetVolume { value: 60 });
        c.dispatch(Command::ToggleMute);
        assert_eq!(c.state().volume, 0);
        assert!(c.state().is_muted());
        let fx = c.dispatch(Command::ToggleMute);
        assert_eq!(c.state().volume, 60);
        assert_eq!(fx[0], Effect::Media(MediaCommand::SetVolume(60)));
        c.dispatch(Command::VolumeStep { delta: 50 });
        assert_eq!(c.state().volume, 100);
    }

    #[test]
    fn test_favorite_refilters_favorites_tab() {
        let mut c = controller(remote(&["a", "b"]));
        c.dispatch(Command::ToggleFavorite { view_index: Some(0) });
        c.dispatch(Command::SwitchTab { tab: Tab::Favorites });
        assert_eq!(c.state().view.len(), 1);
        let fx = c.dispatch(Command::ToggleFavorite { view_index: Some(0) });
        assert!(c.state().view.is_empty());
        assert_eq!(notice(&fx).unwrap().message, "Removed from favorites");
    }

    #[test]
    fn test_switch_tab_clears_query() {
        let mut c = controller(local(&["Test.mp3", "other.mp3"]));
        c.dispatch(Command::Search { query: "test".into() });
        assert_eq!(c.state().view.len(), 1);
        c.dispatch(Command::SwitchTab { tab: Tab::All });
        assert!(c.state().query.is_empty());
        assert_eq!(c.state().view.len(), 2);
    }

    #[test]
    fn test_removing_playing_track_loads_neighbour() {
        let mut c = controller(local(&["a", "b", "c"]));
        play(&mut c, 1);
        let fx = c.dispatch(Command::RemoveTrack { view_index: 1 });
        assert_eq!(loaded_target(&fx).as_deref(), Some("/m/c"));
        assert_eq!(c.state().current, Some(1));

        play(&mut c, 1);
        c.dispatch(Command::RemoveTrack { view_index: 1 });
        assert_eq!(c.state().current_track().unwrap().name, "a");
    }

    #[test]
    fn test_removing_last_playing_track_stops() {
        let mut c = controller(local(&["a"]));
        play(&mut c, 0);
        let fx = c.dispatch(Command::RemoveTrack { view_index: 0 });
        assert!(fx.contains(&Effect::Media(MediaCommand::Stop)));
        assert_eq!(c.state().current, None);
        assert_eq!(c.state().status, PlaybackStatus::Idle);
    }

    #[test]
    fn test_set_playlist_and_clear() {
        let mut c = controller(Vec::new());
        let fx = c.dispatch(Command::SetPlaylist {
            folder_name: "Live".into(),
            tracks: remote(&["x", "y"]),
            path: vec!["Music".into(), "Live".into()],
        });
        assert_eq!(notice(&fx).unwrap().message, "Loaded 2 tracks from \"Live\"");
        assert_eq!(c.state().folder_mode.as_deref(), Some("Live"));
        assert_eq!(c.state().current, None);

        let fx = c.dispatch(Command::SetPlaylist {
            folder_name: "Empty".into(),
            tracks: Vec::new(),
            path: Vec::new(),
        });
        assert_eq!(notice(&fx).unwrap().message, "No audio files in this folder");
        assert_eq!(c.state().playlist.len(), 2);

        let fx = c.dispatch(Command::ClearPlaylist);
        assert!(fx.contains(&Effect::ClearSession));
        assert!(c.state().playlist.is_empty());
        assert_eq!(c.state().folder_mode, None);
    }

    #[test]
    fn test_current_stays_in_bounds_through_edits() {
        let mut c = controller(local(&["d", "c", "b", "a"]));
        play(&mut c, 3);
        c.dispatch(Command::SortPlaylist);
        assert_eq!(c.state().current_track().unwrap().name, "a");
        c.dispatch(Command::RemoveTrack { view_index: 2 });
        c.dispatch(Command::RemoveTrack { view_index: 2 });
        let state = c.state();
        assert!(state.current.is_some_and(|i| i < state.playlist.len()));
    }
}
