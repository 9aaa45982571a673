/// PlayerCore: single-owner event loop for all mutable player state.
///
/// Runs embedded in the TUI process.  Key presses arrive as `Command`s, mpv
/// pushes property changes and end-of-file events, background tasks report
/// folder scans and remote listings; all of them are `CoreEvent`s on one
/// channel.  PlayerCore owns the `PlayerController`, the key/value store and
/// the `MpvDriver` exclusively; no other task touches them.
///
/// The controller decides, PlayerCore executes: every `Effect` the controller
/// returns is carried out here (mpv IPC, persistence, notices), then a fresh
/// `PlayerSnapshot` is broadcast to the UI.
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cloudeck_core::analytics::Analytics;
use cloudeck_core::config::Config;
use cloudeck_core::controller::{Effect, MediaCommand, MediaEvent, PlayerController};
use cloudeck_core::drive::{DriveClient, FetchError, FolderListing};
use cloudeck_core::local::{self, LocalFolder};
use cloudeck_core::protocol::{Command, Notice};
use cloudeck_core::schedule::Debouncer;
use cloudeck_core::session::{SaveOutcome, SessionRestore, SessionStore};
use cloudeck_core::state::PlaybackState;
use cloudeck_core::store::{FileStore, KeyValueStore, MemoryStore};
use cloudeck_core::transfer;

use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, OBS_DURATION, OBS_PAUSE, OBS_TIME_POS};
use crate::BroadcastMessage;

// ── CoreEvent ─────────────────────────────────────────────────────────────────

/// All inputs into the PlayerCore loop.
#[derive(Debug)]
pub enum CoreEvent {
    /// A command from the TUI.
    Command(Command),
    /// Raw mpv unsolicited event (forwarded from reader task).
    Mpv(MpvEvent),
    /// The session-save debounce elapsed.
    SaveDue,
    BrowseDone(Result<FolderListing, FetchError>),
    LocalScanned(anyhow::Result<LocalFolder>),
    /// Heartbeat: check process liveness.
    HeartbeatTick,
}

// ── PlayerCore ────────────────────────────────────────────────────────────────

pub struct PlayerCore {
    config: Config,
    controller: PlayerController<StdRng>,
    store: Box<dyn KeyValueStore>,
    sessions: SessionStore,
    analytics: Analytics,
    save_debounce: Debouncer,
    /// A session save was requested and has not been written yet.
    save_dirty: bool,
    mpv_driver: MpvDriver,
    /// Live handle to the mpv IO tasks.  `None` when mpv is not yet connected.
    mpv_handle: Option<MpvHandle>,
    drive: Option<DriveClient>,
    browse_cancel: Option<CancellationToken>,
    event_tx: mpsc::Sender<CoreEvent>,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    /// Whole second last broadcast for the playback position.
    last_second: Option<u64>,
}

impl PlayerCore {
    pub fn new(
        config: Config,
        broadcast_tx: broadcast::Sender<BroadcastMessage>,
        event_tx: mpsc::Sender<CoreEvent>,
    ) -> Self {
        let store = open_store(&config);
        let state = PlaybackState::new(config.player.default_volume);
        let controller = PlayerController::new(
            state,
            StdRng::from_entropy(),
            config.player.restart_threshold_secs,
        );
        let sessions = SessionStore::new(
            chrono::Duration::hours(config.storage.session_ttl_hours),
            config.storage.reduced_track_limit,
        );
        let drive = match DriveClient::new(&config.remote) {
            Ok(client) => Some(client),
            Err(e) => {
                info!("PlayerCore: remote browsing disabled: {}", e);
                None
            }
        };

        Self {
            save_debounce: Debouncer::new(Duration::from_millis(config.storage.save_debounce_ms)),
            save_dirty: false,
            mpv_driver: MpvDriver::new(config.player.default_volume),
            config,
            controller,
            store,
            sessions,
            analytics: Analytics::default(),
            mpv_handle: None,
            drive,
            browse_cancel: None,
            event_tx,
            broadcast_tx,
            last_second: None,
        }
    }

    /// Run the core event loop.  Returns on `Command::Shutdown` or when the
    /// event channel is closed (TUI exited).
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");
        self.startup();

        let heartbeat_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(10)).await;
                if heartbeat_tx.send(CoreEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        while let Some(evt) = event_rx.recv().await {
            match evt {
                CoreEvent::Command(Command::Shutdown) => {
                    info!("PlayerCore: shutdown requested");
                    break;
                }
                CoreEvent::Command(cmd) => self.handle_command(cmd).await,
                CoreEvent::Mpv(evt) => self.handle_mpv_event(evt).await,
                CoreEvent::SaveDue => {
                    self.save_session();
                }
                CoreEvent::BrowseDone(result) => self.on_browse_done(result),
                CoreEvent::LocalScanned(result) => self.on_local_scanned(result).await,
                CoreEvent::HeartbeatTick => self.heartbeat().await,
            }
        }

        self.cleanup().await;
        Ok(())
    }

    // ── startup ───────────────────────────────────────────────────────────────

    /// Restore preferences and the last session, and count this run.
    fn startup(&mut self) {
        if let Some(prefs) = transfer::load_preferences(self.store.as_ref()) {
            debug!("PlayerCore: applying saved preferences");
            self.controller.apply_preferences(prefs);
            self.mpv_driver.last_volume = self.controller.state().volume;
        }

        match self.sessions.load(self.store.as_mut(), Utc::now()) {
            SessionRestore::Remote(restored) => {
                info!("PlayerCore: restoring {} tracks", restored.tracks.len());
                let effects = self.controller.restore_session(restored);
                for effect in effects {
                    if let Effect::Notify(notice) = effect {
                        self.notify(notice);
                    }
                }
            }
            SessionRestore::LocalOnly { folder_name, count } => {
                self.notify(Notice::info(format!(
                    "Last session had {} local tracks from \"{}\" - press o to load the folder again",
                    count, folder_name
                )));
            }
            SessionRestore::Expired => info!("PlayerCore: saved session expired"),
            SessionRestore::Corrupt => warn!("PlayerCore: saved session was unreadable"),
            SessionRestore::Empty => {}
        }

        self.analytics = Analytics::load(self.store.as_ref());
        self.analytics.record_session(Utc::now());
        info!(
            "PlayerCore: session #{}, {} tracks played, most played {:?}",
            self.analytics.sessions_count,
            self.analytics.tracks_played,
            self.analytics.top_tracks(3)
        );
        if let Err(e) = self.analytics.save(self.store.as_mut()) {
            warn!("PlayerCore: failed to save analytics: {}", e);
        }
        self.broadcast_state();
    }

    // ── command handlers ──────────────────────────────────────────────────────

    async fn handle_command(&mut self, cmd: Command) {
        debug!("PlayerCore: command {:?}", cmd);
        let effects = match cmd {
            Command::LoadLocalFolder { path } => {
                let tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = tokio::task::spawn_blocking(move || local::scan_folder(&path))
                        .await
                        .unwrap_or_else(|e| Err(anyhow::anyhow!("folder scan panicked: {}", e)));
                    let _ = tx.send(CoreEvent::LocalScanned(result)).await;
                });
                Vec::new()
            }
            Command::BrowseRemote { refresh } => {
                self.start_browse(refresh);
                Vec::new()
            }
            Command::CancelBrowse => {
                if let Some(token) = self.browse_cancel.take() {
                    token.cancel();
                }
                Vec::new()
            }
            Command::ExportState => {
                let dir = self.config.paths.export_dir.clone();
                match transfer::export(self.controller.state(), &dir, Utc::now()) {
                    Ok(path) => vec![Effect::Notify(Notice::success(format!(
                        "State exported to {}",
                        path.display()
                    )))],
                    Err(e) => {
                        error!("PlayerCore: export failed: {}", e);
                        vec![Effect::Notify(Notice::error(format!("Export failed: {}", e)))]
                    }
                }
            }
            Command::ImportState { path } => match transfer::import(&path) {
                Ok(prefs) => self.controller.import_state(prefs),
                Err(e) => {
                    warn!("PlayerCore: import of {} failed: {}", path.display(), e);
                    vec![Effect::Notify(Notice::error(format!("Import failed: {}", e)))]
                }
            },
            other => self.controller.dispatch(other),
        };
        self.apply_effects(effects).await;
        self.broadcast_state();
    }

    fn start_browse(&mut self, refresh: bool) {
        let Some(client) = self.drive.clone() else {
            self.notify(Notice::warning(format!(
                "{} - set [remote] worker_url in {}",
                FetchError::NotConfigured,
                Config::config_path().display()
            )));
            return;
        };
        if let Some(previous) = self.browse_cancel.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.browse_cancel = Some(token.clone());
        let _ = self.broadcast_tx.send(BroadcastMessage::Browsing(true));

        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = client.fetch_folders(refresh, &token).await;
            let _ = tx.send(CoreEvent::BrowseDone(result)).await;
        });
    }

    fn on_browse_done(&mut self, result: Result<FolderListing, FetchError>) {
        self.browse_cancel = None;
        let _ = self.broadcast_tx.send(BroadcastMessage::Browsing(false));
        match result {
            Ok(listing) => {
                self.notify(Notice::success(listing.message()));
                let _ = self
                    .broadcast_tx
                    .send(BroadcastMessage::FolderTree(Arc::new(listing.root)));
            }
            Err(FetchError::Cancelled) => self.notify(Notice::info("Folder loading cancelled")),
            Err(e) => {
                warn!("PlayerCore: folder fetch failed: {}", e);
                self.notify(Notice::error(e.to_string()));
            }
        }
    }

    async fn on_local_scanned(&mut self, result: anyhow::Result<LocalFolder>) {
        match result {
            Ok(folder) if folder.tracks.is_empty() => {
                self.notify(Notice::warning("No audio files found in that folder"));
            }
            Ok(folder) => {
                self.handle_command(Command::SetPlaylist {
                    folder_name: folder.name,
                    tracks: folder.tracks,
                    path: Vec::new(),
                })
                .await;
            }
            Err(e) => {
                warn!("PlayerCore: local scan failed: {:#}", e);
                self.notify(Notice::error(format!("Cannot open folder: {:#}", e)));
            }
        }
    }

    // ── effects ───────────────────────────────────────────────────────────────

    async fn apply_effects(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Media(cmd) => {
                    if let Some(event) = self.run_media(cmd).await {
                        queue.extend(self.controller.on_media(event));
                    }
                }
                Effect::SaveSession => self.schedule_save(),
                Effect::SavePreferences => {
                    if let Err(e) = transfer::save_preferences(
                        self.store.as_mut(),
                        self.controller.state(),
                        Utc::now(),
                    ) {
                        warn!("PlayerCore: failed to save preferences: {}", e);
                    }
                }
                Effect::ClearSession => {
                    self.save_debounce.cancel();
                    self.save_dirty = false;
                    self.sessions.clear(self.store.as_mut());
                }
                Effect::Notify(notice) => self.notify(notice),
                Effect::TrackPlayed { id, duration } => {
                    self.analytics.record_play(&id, duration);
                    if let Err(e) = self.analytics.save(self.store.as_mut()) {
                        warn!("PlayerCore: failed to save analytics: {}", e);
                    }
                }
            }
        }
    }

    /// Carry out one media command.  A failure comes back as the media event
    /// the controller should see.
    async fn run_media(&mut self, cmd: MediaCommand) -> Option<MediaEvent> {
        if let MediaCommand::SetVolume(volume) = cmd {
            self.mpv_driver.last_volume = volume;
        }
        let handle = match cmd {
            // Nothing to stop, pause or seek without a connection.
            MediaCommand::Load { .. } => match self.ensure_mpv_handle().await {
                Some(h) => h,
                None => return Some(MediaEvent::Failed("mpv is not available".into())),
            },
            _ => self.mpv_handle.clone()?,
        };

        match cmd {
            MediaCommand::Load {
                target, volume, ..
            } => {
                self.last_second = None;
                if let Err(e) = handle.load(&target, volume).await {
                    warn!("PlayerCore: failed to load '{}': {}", target, e);
                    return Some(MediaEvent::Failed(e.to_string()));
                }
            }
            MediaCommand::Pause => {
                if let Err(e) = handle.set_pause(true).await {
                    warn!("PlayerCore: pause failed: {}", e);
                }
            }
            MediaCommand::Resume => {
                if let Err(e) = handle.set_pause(false).await {
                    return Some(MediaEvent::Rejected(e.to_string()));
                }
            }
            MediaCommand::SeekTo(secs) => {
                if let Err(e) = handle.seek_to(secs).await {
                    warn!("PlayerCore: seek to {:.1}s failed: {}", secs, e);
                }
            }
            MediaCommand::SetVolume(volume) => {
                if let Err(e) = handle.set_volume(volume).await {
                    warn!("PlayerCore: set volume failed: {}", e);
                }
            }
            MediaCommand::Stop => {
                if let Err(e) = handle.stop().await {
                    warn!("PlayerCore: stop failed: {}", e);
                }
            }
        }
        None
    }

    fn schedule_save(&mut self) {
        self.save_dirty = true;
        let tx = self.event_tx.clone();
        self.save_debounce.schedule(async move {
            let _ = tx.send(CoreEvent::SaveDue).await;
        });
    }

    fn save_session(&mut self) {
        self.save_dirty = false;
        match self
            .sessions
            .save(self.store.as_mut(), self.controller.state(), Utc::now())
        {
            Ok(SaveOutcome::Full) => {}
            Ok(SaveOutcome::Reduced) => self.notify(Notice::warning(format!(
                "Storage full - only the first {} tracks were saved",
                self.config.storage.reduced_track_limit
            ))),
            Err(e) => {
                error!("PlayerCore: session save failed: {}", e);
                self.notify(Notice::error("Could not save playlist"));
            }
        }
    }

    // ── mpv event handler ─────────────────────────────────────────────────────

    async fn handle_mpv_event(&mut self, evt: MpvEvent) {
        let Some(media) = media_event(&evt) else {
            return;
        };
        let redraw = match &media {
            MediaEvent::Position(pos) => {
                let second = pos.map(|p| p.max(0.0) as u64);
                let changed = second != self.last_second;
                self.last_second = second;
                changed
            }
            _ => true,
        };
        let effects = self.controller.on_media(media);
        let had_effects = !effects.is_empty();
        self.apply_effects(effects).await;
        if redraw || had_effects {
            self.broadcast_state();
        }
    }

    // ── mpv handle management ─────────────────────────────────────────────────

    async fn heartbeat(&mut self) {
        if self.mpv_handle.is_some() && !self.mpv_driver.process_alive() {
            warn!("PlayerCore: heartbeat: mpv process died");
            self.mpv_handle = None;
            if self.controller.state().status.is_active() {
                let effects = self
                    .controller
                    .on_media(MediaEvent::Failed("mpv exited".into()));
                self.apply_effects(effects).await;
                self.broadcast_state();
            }
        }
    }

    async fn ensure_mpv_handle(&mut self) -> Option<MpvHandle> {
        if self.mpv_handle.is_some() && !self.mpv_driver.process_alive() {
            warn!("PlayerCore: mpv process died, dropping handle");
            self.mpv_handle = None;
        }
        if self.mpv_handle.is_none() {
            // One forwarder per connection, fed by whichever path connects.
            let (event_tx, mut event_rx) = mpsc::channel::<MpvEvent>(64);
            let core_tx = self.event_tx.clone();
            tokio::spawn(async move {
                while let Some(evt) = event_rx.recv().await {
                    if core_tx.send(CoreEvent::Mpv(evt)).await.is_err() {
                        break;
                    }
                }
            });

            let handle = match self.mpv_driver.try_reconnect(event_tx.clone()).await {
                Some(h) => h,
                None => match self.mpv_driver.spawn_and_connect(event_tx).await {
                    Ok(h) => h,
                    Err(e) => {
                        warn!("PlayerCore: failed to start mpv: {}", e);
                        self.notify(Notice::error(format!(
                            "Cannot start mpv ({}) - is it installed?",
                            e
                        )));
                        return None;
                    }
                },
            };
            handle.observe_all_properties().await;
            self.mpv_handle = Some(handle);
        }
        self.mpv_handle.clone()
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    fn notify(&self, notice: Notice) {
        debug!("PlayerCore: notice {:?}: {}", notice.level, notice.message);
        let _ = self.broadcast_tx.send(BroadcastMessage::Notice(notice));
    }

    fn broadcast_state(&self) {
        let snapshot = Arc::new(self.controller.state().snapshot());
        let _ = self
            .broadcast_tx
            .send(BroadcastMessage::StateUpdated(snapshot));
    }

    async fn cleanup(&mut self) {
        info!("PlayerCore: cleanup: flushing session and killing mpv");
        if let Some(token) = self.browse_cancel.take() {
            token.cancel();
        }
        // The timer may already have fired with its SaveDue queued behind
        // the shutdown, so go by the flag rather than the timer.
        if self.save_dirty {
            self.save_debounce.cancel();
            self.save_session();
        }
        if let Some(handle) = self.mpv_handle.take() {
            let _ = handle.stop().await;
        }
        self.mpv_driver.kill().await;
    }
}

/// Open the on-disk store, or a volatile one when its directory cannot be
/// created.
fn open_store(config: &Config) -> Box<dyn KeyValueStore> {
    let path = &config.storage.store_file;
    let writable = path
        .parent()
        .map(|dir| std::fs::create_dir_all(dir).is_ok())
        .unwrap_or(true);
    if writable {
        Box::new(FileStore::open(path, config.storage.quota_bytes))
    } else {
        warn!(
            "PlayerCore: cannot create {:?}, nothing will persist this run",
            path.parent()
        );
        Box::new(MemoryStore::with_quota(config.storage.quota_bytes))
    }
}

/// Translate a raw mpv event into what the controller understands.
fn media_event(evt: &MpvEvent) -> Option<MediaEvent> {
    if let Some((obs_id, data)) = evt.as_property_change() {
        return match obs_id {
            OBS_PAUSE => data.as_bool().map(MediaEvent::Paused),
            OBS_TIME_POS => Some(MediaEvent::Position(data.as_f64())),
            OBS_DURATION => Some(MediaEvent::Duration(data.as_f64())),
            _ => None,
        };
    }
    match evt.event_name()? {
        "file-loaded" => Some(MediaEvent::Ready),
        "end-file" => match evt.end_reason() {
            Some("eof") => Some(MediaEvent::Ended),
            Some("error") => Some(MediaEvent::Failed(
                evt.file_error().unwrap_or("unknown error").to_string(),
            )),
            // "stop" and "redirect" follow our own loadfile/stop commands.
            _ => None,
        },
        _ => None,
    }
}
