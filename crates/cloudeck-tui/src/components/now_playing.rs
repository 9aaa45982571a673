//! NowPlaying component: top panel with the current track, progress and
//! playback modes.
//!
//! Not focusable; the only input it takes is a click on the progress bar.

use cloudeck_core::protocol::{Command, PlaybackStatus, RepeatMode};
use ratatui::crossterm::event::{KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    widgets::progress_bar::draw_progress,
};

pub struct NowPlaying {
    /// Where the progress bar cells were drawn last frame.
    bar_area: Rect,
}

impl NowPlaying {
    pub fn new() -> Self {
        Self {
            bar_area: Rect::default(),
        }
    }
}

/// Seconds to seek to for a click at `column` on a bar drawn in `bar`.
pub fn seek_target(bar: Rect, column: u16, duration: f64) -> Option<f64> {
    if bar.width == 0 || column < bar.x || column >= bar.x + bar.width || duration <= 0.0 {
        return None;
    }
    let fraction = f64::from(column - bar.x) / f64::from(bar.width);
    Some(fraction * duration)
}

impl Component for NowPlaying {
    fn id(&self) -> ComponentId {
        ComponentId::NowPlaying
    }

    fn handle_key(&mut self, _key: KeyEvent, _state: &AppState) -> Vec<Action> {
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, state: &AppState) -> Vec<Action> {
        if event.kind != MouseEventKind::Down(MouseButton::Left) || event.row != self.bar_area.y {
            return vec![];
        }
        let player = &state.player;
        if player.current.is_none() {
            return vec![];
        }
        if !player.seekable {
            // Let the controller explain why.
            return vec![Action::SendCommand(Command::SeekTo { seconds: 0.0 })];
        }
        match player
            .duration
            .and_then(|d| seek_target(self.bar_area, event.column, d))
        {
            Some(seconds) => vec![Action::SendCommand(Command::SeekTo { seconds })],
            None => vec![],
        }
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        let p = state.palette();
        let player = &state.player;

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(p.style_border(false))
            .title(Line::from(Span::styled(
                " cloudeck ",
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
            )));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 {
            return;
        }

        // ── Row 1: status + title ─────────────────────────────────────────────
        let (icon, label, color) = match player.status {
            PlaybackStatus::Playing => ("▶", "playing", p.playing),
            PlaybackStatus::Paused => ("⏸", "paused", p.loading),
            PlaybackStatus::Loading => ("⋯", "loading", p.loading),
            PlaybackStatus::Ended => ("■", "ended", p.muted),
            PlaybackStatus::Idle => ("■", "stopped", p.muted),
        };
        let mut title = vec![
            Span::styled(format!(" {} ", icon), Style::default().fg(color)),
            Span::styled(format!("{:<8}", label), Style::default().fg(color)),
        ];
        match player.current_track() {
            Some(track) => {
                title.push(Span::styled(
                    track.name.clone(),
                    Style::default().fg(p.primary).add_modifier(Modifier::BOLD),
                ));
                title.push(Span::styled(
                    format!("  {}", track.source().label()),
                    Style::default().fg(if track.is_remote() { p.remote } else { p.muted }),
                ));
                if player.favorites.contains(track.id_key()) {
                    title.push(Span::styled("  ★", Style::default().fg(p.favorite)));
                }
            }
            None => title.push(Span::styled("no track selected", p.style_muted())),
        }
        frame.render_widget(Paragraph::new(Line::from(title)), Rect { height: 1, ..inner });

        // ── Row 2: progress ───────────────────────────────────────────────────
        if inner.height >= 2 {
            let row = Rect {
                x: inner.x + 1,
                y: inner.y + 1,
                width: inner.width.saturating_sub(2),
                height: 1,
            };
            self.bar_area = draw_progress(
                frame,
                row,
                player.progress().unwrap_or(0.0),
                player.position,
                player.duration,
                player.seekable || player.current.is_none(),
                p,
            );
        }

        // ── Row 3: modes ──────────────────────────────────────────────────────
        if inner.height >= 3 {
            let on = |active: bool| {
                if active {
                    Style::default().fg(p.accent).add_modifier(Modifier::BOLD)
                } else {
                    p.style_muted()
                }
            };
            let volume = if player.muted {
                "muted".to_string()
            } else {
                format!("{}%", player.volume)
            };
            let mut modes = vec![
                Span::styled(" vol ", p.style_secondary()),
                Span::styled(volume, on(!player.muted).fg(p.primary)),
                Span::styled("  │  ", Style::default().fg(p.separator)),
                Span::styled("shuffle", on(player.shuffle)),
                Span::styled("  │  ", Style::default().fg(p.separator)),
                Span::styled(
                    player.repeat.label().to_lowercase(),
                    on(player.repeat != RepeatMode::Off),
                ),
            ];
            if let Some(folder) = &player.folder_mode {
                modes.push(Span::styled("  │  ", Style::default().fg(p.separator)));
                modes.push(Span::styled(format!("folder {}", folder), p.style_secondary()));
            }
            if state.browsing {
                modes.push(Span::styled("  │  ", Style::default().fg(p.separator)));
                modes.push(Span::styled("fetching folders", Style::default().fg(p.remote)));
            }
            frame.render_widget(
                Paragraph::new(Line::from(modes)),
                Rect {
                    y: inner.y + 2,
                    height: 1,
                    ..inner
                },
            );
        }
    }

    fn min_height(&self) -> u16 {
        5
    }
}
