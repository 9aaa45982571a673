//! App: component-based event loop for the terminal UI.
//!
//! Architecture:
//! - `App` owns all components and `AppState` (shared read-only data for components).
//! - A `tokio::mpsc` channel carries `AppMessage` events in from background tasks.
//! - The event loop draws each frame, then awaits the next message.
//! - Components return `Vec<Action>`; App dispatches each Action.
//! - Commands to the player flow out through the `cmd_tx` channel.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    widgets::Block,
    Frame, Terminal,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, trace, warn};

use cloudeck_core::config::Config;
use cloudeck_core::protocol::{Command, Tab};
use cloudeck_core::schedule::{Debouncer, Throttle};

use crate::core::CoreEvent;
use crate::BroadcastMessage;
use crate::{
    action::{Action, PromptKind},
    app_state::AppState,
    component::Component,
    components::{
        folder_browser::FolderBrowserPanel, help_overlay::HelpOverlay, now_playing::NowPlaying,
        playlist::Playlist,
    },
    widgets::{
        filter_input::{FilterAction, FilterInput},
        status_bar::{self, InputMode},
        toast::ToastManager,
    },
};

// ── AppMessage ────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum AppMessage {
    /// Terminal input.
    Event(Event),
    /// Forwarded from the player core.
    Broadcast(BroadcastMessage),
}

/// Where each pane was drawn last frame, for mouse routing.
#[derive(Debug, Default, Clone, Copy)]
struct PaneAreas {
    now_playing: Rect,
    playlist: Rect,
}

/// An open path prompt.
struct Prompt {
    kind: PromptKind,
    input: FilterInput,
}

// ── App ───────────────────────────────────────────────────────────────────────

pub struct App {
    cmd_tx: mpsc::Sender<CoreEvent>,
    state: AppState,

    now_playing: NowPlaying,
    playlist: Playlist,
    browser: FolderBrowserPanel,
    help_overlay: HelpOverlay,
    toast: ToastManager,
    prompt: Option<Prompt>,

    search_debounce: Debouncer,
    skip_throttle: Throttle,
    seek_step: f64,
    volume_step: i16,

    areas: PaneAreas,
    should_quit: bool,
}

impl App {
    pub fn new(cmd_tx: mpsc::Sender<CoreEvent>, config: &Config) -> Self {
        Self {
            cmd_tx,
            state: AppState::new(config.ui.page_size),
            now_playing: NowPlaying::new(),
            playlist: Playlist::new(),
            browser: FolderBrowserPanel::new(),
            help_overlay: HelpOverlay::new(),
            toast: ToastManager::new(),
            prompt: None,
            search_debounce: Debouncer::new(Duration::from_millis(config.ui.search_debounce_ms)),
            skip_throttle: Throttle::new(Duration::from_millis(config.ui.key_repeat_ms)),
            seek_step: config.player.seek_step_secs,
            volume_step: i16::from(config.player.volume_step),
            areas: PaneAreas::default(),
            should_quit: false,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(
        mut self,
        mut broadcast_rx: broadcast::Receiver<BroadcastMessage>,
    ) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: broadcast receiver (PlayerCore → AppMessage) ─────
        let bc_tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(msg) => {
                        if bc_tx.send(AppMessage::Broadcast(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("broadcast receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        // Toast expiry check + spinner animation
        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    const MAX_DRAIN: usize = 256;
                    let mut redraw = self.handle_message(msg).await;
                    let mut drained = 0usize;
                    while drained < MAX_DRAIN {
                        let next = match rx.try_recv() {
                            Ok(v) => v,
                            Err(_) => break,
                        };
                        drained += 1;
                        redraw |= self.handle_message(next).await;
                    }
                    needs_redraw = redraw;
                }

                _ = toast_tick.tick() => {
                    needs_redraw = self.toast.tick();
                }
            }

            if self.should_quit {
                break;
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        self.search_debounce.cancel();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        Ok(())
    }

    // ── Message handling ──────────────────────────────────────────────────────

    /// Returns true when the screen needs a redraw.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(ev) => match ev {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        return false;
                    }
                    let actions = self.handle_key(key);
                    for a in actions {
                        self.dispatch(a).await;
                    }
                    self.sync_input_mode();
                }
                Event::Mouse(mouse) => {
                    if mouse.kind == MouseEventKind::Moved {
                        return false;
                    }
                    let actions = self.handle_mouse(mouse);
                    for a in actions {
                        self.dispatch(a).await;
                    }
                }
                Event::Resize(_, _) => {}
                _ => return false,
            },

            AppMessage::Broadcast(BroadcastMessage::StateUpdated(snapshot)) => {
                self.state.player = snapshot;
                self.playlist.on_state(&self.state);
                self.now_playing.on_state(&self.state);
            }

            AppMessage::Broadcast(BroadcastMessage::Notice(notice)) => {
                self.toast.notice(notice);
            }

            AppMessage::Broadcast(BroadcastMessage::FolderTree(root)) => {
                self.browser.set_tree((*root).clone());
            }

            AppMessage::Broadcast(BroadcastMessage::Browsing(active)) => {
                self.state.browsing = active;
                if active {
                    self.toast.spinner("Loading folders...");
                } else {
                    self.toast.dismiss_spinner();
                }
            }
        }
        true
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return vec![Action::Quit];
        }

        // An open prompt takes every key
        if let Some(prompt) = self.prompt.as_mut() {
            return match prompt.input.handle_key(key) {
                FilterAction::Confirmed(text) if !text.trim().is_empty() => vec![
                    Action::PromptConfirmed(prompt.kind, expand_home(text.trim())),
                    Action::ClosePrompt,
                ],
                FilterAction::Confirmed(_) | FilterAction::Cancelled => vec![Action::ClosePrompt],
                FilterAction::Changed(_) | FilterAction::None => vec![],
            };
        }

        // Help overlay captures all keys when visible
        if self.help_overlay.visible {
            let actions = self.help_overlay.handle_key(key, &self.state);
            if !actions.is_empty() {
                return actions;
            }
            // Any other key closes the overlay
            return vec![Action::ToggleHelp];
        }

        if self.browser.visible {
            return self.browser.handle_key(key, &self.state);
        }

        if self.playlist.is_search_active() {
            return self.playlist.handle_key(key, &self.state);
        }

        let player = &self.state.player;
        let cmd = |c: Command| vec![Action::SendCommand(c)];
        match key.code {
            KeyCode::Char('q') => return vec![Action::Quit],
            KeyCode::Char('?') => return vec![Action::ToggleHelp],
            // ── Playback ──────────────────────────────────────────────────────
            KeyCode::Char(' ') => return cmd(Command::TogglePlayPause),
            KeyCode::Char('n') => return vec![Action::Skip(Command::Next)],
            KeyCode::Char('p') => return vec![Action::Skip(Command::Previous)],
            KeyCode::Right => {
                return cmd(Command::SeekRelative {
                    seconds: self.seek_step,
                })
            }
            KeyCode::Left => {
                return cmd(Command::SeekRelative {
                    seconds: -self.seek_step,
                })
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                return cmd(Command::VolumeStep {
                    delta: self.volume_step,
                })
            }
            KeyCode::Char('-') => {
                return cmd(Command::VolumeStep {
                    delta: -self.volume_step,
                })
            }
            KeyCode::Char('m') => return cmd(Command::ToggleMute),
            KeyCode::Char('s') => return cmd(Command::ToggleShuffle),
            KeyCode::Char('r') => return cmd(Command::CycleRepeat),
            // ── Playlist ──────────────────────────────────────────────────────
            KeyCode::Char('F') => return cmd(Command::ToggleFavorite { view_index: None }),
            KeyCode::Tab => return cmd(Command::SwitchTab { tab: player.tab.next() }),
            KeyCode::Char(c @ '1'..='3') => {
                let tab = Tab::ALL[(c as usize) - ('1' as usize)];
                return cmd(Command::SwitchTab { tab });
            }
            KeyCode::Char('S') => return cmd(Command::SortPlaylist),
            KeyCode::Char('C') => return cmd(Command::ClearPlaylist),
            KeyCode::Char('X') => return cmd(Command::ClearFolderMode),
            KeyCode::Char('g') => return vec![Action::JumpToCurrent],
            // ── Folders & state ───────────────────────────────────────────────
            KeyCode::Char('b') => return vec![Action::OpenBrowser],
            KeyCode::Char('R') => {
                return vec![
                    Action::SendCommand(Command::BrowseRemote { refresh: true }),
                    Action::OpenBrowser,
                ]
            }
            KeyCode::Char('o') => return vec![Action::OpenPrompt(PromptKind::LocalFolder)],
            KeyCode::Char('e') => return cmd(Command::ExportState),
            KeyCode::Char('i') => return vec![Action::OpenPrompt(PromptKind::ImportState)],
            KeyCode::Char('d') => return cmd(Command::ToggleDarkMode),
            KeyCode::Esc => {
                if self.state.browsing {
                    return cmd(Command::CancelBrowse);
                }
                if !player.query.is_empty() {
                    return vec![Action::CloseSearch];
                }
                return vec![];
            }
            _ => {}
        }

        self.playlist.handle_key(key, &self.state)
    }

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        if self.prompt.is_some() || self.help_overlay.visible || self.browser.visible {
            return vec![];
        }

        fn hit(r: Rect, col: u16, row: u16) -> bool {
            r.width > 0
                && r.height > 0
                && col >= r.x
                && col < r.x + r.width
                && row >= r.y
                && row < r.y + r.height
        }

        let (col, row) = (event.column, event.row);
        let areas = self.areas;
        let (target, area): (&mut dyn Component, Rect) = if hit(areas.now_playing, col, row) {
            (&mut self.now_playing, areas.now_playing)
        } else if hit(areas.playlist, col, row) {
            (&mut self.playlist, areas.playlist)
        } else {
            return vec![];
        };
        trace!("mouse {:?} → {:?}", event.kind, target.id());
        target.handle_mouse(event, area, &self.state)
    }

    // ── Action dispatcher ─────────────────────────────────────────────────────

    async fn dispatch(&mut self, action: Action) {
        // Components see the action first so their view state is current
        let secondary: Vec<Action> = {
            let s = &self.state;
            let mut out = Vec::new();
            out.extend(self.playlist.on_action(&action, s));
            out.extend(self.now_playing.on_action(&action, s));
            out.extend(self.browser.on_action(&action, s));
            out.extend(self.help_overlay.on_action(&action, s));
            out
        };

        self.apply_action(action).await;

        for a in secondary {
            self.apply_action(a).await;
        }
    }

    async fn apply_action(&mut self, action: Action) {
        match &action {
            Action::SearchChanged(_) => {}
            _ => debug!("apply_action: {:?}", action),
        }
        match action {
            Action::SendCommand(cmd) => self.send_cmd(cmd).await,
            Action::Skip(cmd) => {
                if self.skip_throttle.ready(Instant::now()) {
                    self.send_cmd(cmd).await;
                }
            }

            // ── Search ────────────────────────────────────────────────────────
            Action::SearchChanged(query) => {
                let tx = self.cmd_tx.clone();
                self.search_debounce.schedule(async move {
                    let _ = tx.send(CoreEvent::Command(Command::Search { query })).await;
                });
            }
            Action::SearchConfirmed(query) => {
                self.search_debounce.cancel();
                self.send_cmd(Command::Search { query }).await;
            }
            Action::CloseSearch => {
                self.search_debounce.cancel();
                if !self.state.player.query.is_empty() {
                    self.send_cmd(Command::Search {
                        query: String::new(),
                    })
                    .await;
                }
            }

            // ── Prompts ───────────────────────────────────────────────────────
            Action::OpenPrompt(kind) => {
                let placeholder = match kind {
                    PromptKind::LocalFolder => "~/Music/album",
                    PromptKind::ImportState => "~/cloudeck-state.json",
                };
                let mut input = FilterInput::new(kind.prefix(), placeholder);
                input.activate();
                self.prompt = Some(Prompt { kind, input });
            }
            Action::ClosePrompt => self.prompt = None,
            Action::PromptConfirmed(kind, path) => {
                let cmd = match kind {
                    PromptKind::LocalFolder => Command::LoadLocalFolder { path },
                    PromptKind::ImportState => Command::ImportState { path },
                };
                self.send_cmd(cmd).await;
            }

            // ── Remote folders ────────────────────────────────────────────────
            Action::OpenBrowser => {
                if !self.browser.has_tree() && !self.state.browsing {
                    self.send_cmd(Command::BrowseRemote { refresh: false }).await;
                }
            }

            Action::Quit => {
                self.send_cmd(Command::Shutdown).await;
                self.should_quit = true;
            }

            // Handled by the components in `dispatch`
            Action::JumpToCurrent
            | Action::OpenSearch
            | Action::CloseBrowser
            | Action::ToggleHelp => {}
        }
    }

    async fn send_cmd(&self, cmd: Command) {
        if self.cmd_tx.send(CoreEvent::Command(cmd)).await.is_err() {
            warn!("player core is gone; command dropped");
        }
    }

    fn sync_input_mode(&mut self) {
        self.state.input_mode = if self.prompt.is_some() {
            InputMode::Prompt
        } else if self.browser.visible {
            InputMode::Browse
        } else if self.playlist.is_search_active() {
            InputMode::Search
        } else {
            InputMode::Normal
        };
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let p = self.state.palette();

        frame.render_widget(Block::default().style(Style::default().bg(p.bg)), area);

        let prompt_h = if self.prompt.is_some() { 1 } else { 0 };
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(self.now_playing.min_height()),
                Constraint::Min(self.playlist.min_height()),
                Constraint::Length(prompt_h),
                Constraint::Length(1),
            ])
            .split(area);

        self.now_playing.draw(frame, outer[0], false, &self.state);
        self.areas.now_playing = outer[0];

        let list_focused = self.prompt.is_none() && !self.browser.visible;
        self.playlist.draw(frame, outer[1], list_focused, &self.state);
        self.areas.playlist = outer[1];

        if let Some(prompt) = &self.prompt {
            prompt.input.draw(frame, outer[2], p);
        }
        status_bar::draw_keys_bar(frame, outer[3], self.state.input_mode, p);

        // ── Overlays ──────────────────────────────────────────────────────────
        self.browser.draw(frame, area, true, &self.state);
        self.help_overlay.draw(frame, area, false, &self.state);
        self.toast.draw(frame, area, p);
    }
}

/// `~/x` → `$HOME/x`; anything else is taken as is.
fn expand_home(text: &str) -> PathBuf {
    match text.strip_prefix("~/").or(if text == "~" { Some("") } else { None }) {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(text),
        },
        None => PathBuf::from(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cloudeck_core::protocol::Track;
    use cloudeck_core::state::PlaybackState;
    use ratatui::backend::TestBackend;

    fn app() -> (App, mpsc::Receiver<CoreEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (App::new(tx, &Config::default()), rx)
    }

    fn key(code: KeyCode) -> AppMessage {
        AppMessage::Event(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn sent(rx: &mut mpsc::Receiver<CoreEvent>) -> Vec<Command> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            if let CoreEvent::Command(cmd) = ev {
                out.push(cmd);
            }
        }
        out
    }

    fn with_tracks(app: &mut App, names: &[&str]) {
        let mut ps = PlaybackState::new(80);
        ps.set_playlist(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| Track::remote(*n, format!("id{i}")))
                .collect(),
        );
        app.state.player = Arc::new(ps.snapshot());
    }

    #[tokio::test]
    async fn test_playback_keys_send_commands() {
        let (mut app, mut rx) = app();
        app.handle_message(key(KeyCode::Char(' '))).await;
        app.handle_message(key(KeyCode::Char('m'))).await;
        app.handle_message(key(KeyCode::Char('r'))).await;
        app.handle_message(key(KeyCode::Right)).await;
        let cmds = sent(&mut rx);
        assert!(matches!(cmds[0], Command::TogglePlayPause));
        assert!(matches!(cmds[1], Command::ToggleMute));
        assert!(matches!(cmds[2], Command::CycleRepeat));
        assert!(matches!(cmds[3], Command::SeekRelative { seconds } if seconds > 0.0));
    }

    #[tokio::test]
    async fn test_rapid_skips_are_throttled() {
        let (mut app, mut rx) = app();
        app.handle_message(key(KeyCode::Char('n'))).await;
        app.handle_message(key(KeyCode::Char('n'))).await;
        let cmds = sent(&mut rx);
        assert_eq!(cmds.len(), 1);
        assert!(matches!(cmds[0], Command::Next));
    }

    #[tokio::test]
    async fn test_enter_loads_selected_track() {
        let (mut app, mut rx) = app();
        with_tracks(&mut app, &["a.mp3", "b.mp3"]);
        app.handle_message(key(KeyCode::Down)).await;
        app.handle_message(key(KeyCode::Enter)).await;
        assert!(matches!(
            sent(&mut rx).as_slice(),
            [Command::LoadTrack { view_index: 1 }]
        ));
    }

    #[tokio::test]
    async fn test_search_is_debounced_until_confirmed() {
        let (mut app, mut rx) = app();
        app.handle_message(key(KeyCode::Char('/'))).await;
        assert_eq!(app.state.input_mode, InputMode::Search);
        app.handle_message(key(KeyCode::Char('l'))).await;
        app.handle_message(key(KeyCode::Char('i'))).await;
        assert!(sent(&mut rx).is_empty());
        app.handle_message(key(KeyCode::Enter)).await;
        assert!(matches!(
            sent(&mut rx).as_slice(),
            [Command::Search { query }] if query == "li"
        ));
        assert_eq!(app.state.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn test_prompt_sends_local_folder() {
        let (mut app, mut rx) = app();
        app.handle_message(key(KeyCode::Char('o'))).await;
        assert_eq!(app.state.input_mode, InputMode::Prompt);
        for c in "/tmp/m".chars() {
            app.handle_message(key(KeyCode::Char(c))).await;
        }
        // 'q' types into the prompt instead of quitting
        app.handle_message(key(KeyCode::Char('q'))).await;
        app.handle_message(key(KeyCode::Enter)).await;
        assert!(!app.should_quit);
        assert!(matches!(
            sent(&mut rx).as_slice(),
            [Command::LoadLocalFolder { path }] if path == &PathBuf::from("/tmp/mq")
        ));
        assert!(app.prompt.is_none());
    }

    #[tokio::test]
    async fn test_open_browser_fetches_once() {
        let (mut app, mut rx) = app();
        app.handle_message(key(KeyCode::Char('b'))).await;
        assert!(app.browser.visible);
        assert!(matches!(
            sent(&mut rx).as_slice(),
            [Command::BrowseRemote { refresh: false }]
        ));
        app.handle_message(AppMessage::Broadcast(BroadcastMessage::Browsing(true)))
            .await;
        app.handle_message(key(KeyCode::Esc)).await;
        assert!(matches!(sent(&mut rx).as_slice(), [Command::CancelBrowse]));
    }

    #[tokio::test]
    async fn test_quit_sends_shutdown() {
        let (mut app, mut rx) = app();
        app.handle_message(key(KeyCode::Char('q'))).await;
        assert!(app.should_quit);
        assert!(matches!(sent(&mut rx).as_slice(), [Command::Shutdown]));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/Music"), home.join("Music"));
        }
    }

    #[test]
    fn test_render_shows_tracks() {
        let (mut app, _rx) = app();
        with_tracks(&mut app, &["first song.mp3", "second song.mp3"]);
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        let screen: String = terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(screen.contains("first song.mp3"));
        assert!(screen.contains("second song.mp3"));
        assert!(screen.contains("NORMAL"));
    }
}
