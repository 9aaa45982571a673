//! Playlist component: tabbed, paginated track list with search.

use std::time::Instant;

use cloudeck_core::filter::{page_bounds, page_count, page_of};
use cloudeck_core::format::format_time;
use cloudeck_core::protocol::{Command, PlaybackStatus, Tab, Track};
use ratatui::crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::Palette,
    widgets::filter_input::{FilterAction, FilterInput},
};

pub struct Playlist {
    /// Selected position within the filtered view.
    selected: usize,
    pub search: FilterInput,
    list_state: ListState,
    /// Playlist index that was current in the previous snapshot.
    last_current: Option<usize>,
    /// View positions `[page_start, page_end)` drawn last frame, for mouse hits.
    page_start: usize,
    page_end: usize,
    /// Where the rows were drawn last frame.
    list_area: Rect,
    last_click: Option<(usize, Instant)>,
}

impl Playlist {
    pub fn new() -> Self {
        Self {
            selected: 0,
            search: FilterInput::new("/ ", "search tracks..."),
            list_state: ListState::default(),
            last_current: None,
            page_start: 0,
            page_end: 0,
            list_area: Rect::default(),
            last_click: None,
        }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn is_search_active(&self) -> bool {
        self.search.is_active()
    }

    fn view_len(state: &AppState) -> usize {
        state.player.view.len()
    }

    fn select(&mut self, pos: usize, state: &AppState) {
        let len = Self::view_len(state);
        self.selected = if len == 0 { 0 } else { pos.min(len - 1) };
    }

    fn select_up(&mut self, n: usize, state: &AppState) {
        self.select(self.selected.saturating_sub(n), state);
    }

    fn select_down(&mut self, n: usize, state: &AppState) {
        self.select(self.selected.saturating_add(n), state);
    }

    fn page_step(&mut self, forward: bool, state: &AppState) {
        let size = state.page_size;
        let page = page_of(self.selected, size);
        let target = if forward {
            (page + 1).min(page_count(Self::view_len(state), size) - 1)
        } else {
            page.saturating_sub(1)
        };
        self.select(target * size, state);
    }

    fn render_row<'a>(
        &self,
        pos: usize,
        track: &'a Track,
        playlist_idx: usize,
        width: u16,
        state: &AppState,
    ) -> ListItem<'a> {
        let p = state.palette();
        let player = &state.player;
        let is_current = player.current == Some(playlist_idx);
        let is_selected = pos == self.selected;

        let (icon, icon_color): (&str, Color) = if is_current {
            match player.status {
                PlaybackStatus::Playing => ("▶", p.playing),
                PlaybackStatus::Paused => ("⏸", p.loading),
                PlaybackStatus::Loading => ("⋯", p.loading),
                PlaybackStatus::Ended | PlaybackStatus::Idle => ("■", p.muted),
            }
        } else {
            (" ", p.muted)
        };

        let fav = if state.is_favorite(track.id_key()) {
            "★ "
        } else {
            "  "
        };

        let meta = row_meta(track);
        let number = format!("{:>4} ", pos + 1);
        let fixed = 2 + 2 + number.width() + meta.width() + 1;
        let name_w = (width as usize).saturating_sub(fixed);
        let name = fit(&track.name, name_w);

        let name_color = if is_current {
            icon_color
        } else if is_selected {
            p.primary
        } else {
            p.secondary
        };
        let mut name_style = Style::default().fg(name_color);
        if is_current || is_selected {
            name_style = name_style.add_modifier(Modifier::BOLD);
        }

        let line = Line::from(vec![
            Span::styled(fav, Style::default().fg(p.favorite)),
            Span::styled(format!("{} ", icon), Style::default().fg(icon_color)),
            Span::styled(number, Style::default().fg(p.muted)),
            Span::styled(name, name_style),
            Span::raw(" "),
            Span::styled(
                meta,
                Style::default().fg(if track.is_remote() { p.remote } else { p.muted }),
            ),
        ]);
        let item = ListItem::new(line);
        if is_selected {
            item.style(Style::default().bg(p.selection_bg))
        } else {
            item
        }
    }

    fn empty_message(state: &AppState) -> String {
        let player = &state.player;
        if player.playlist.is_empty() {
            return "  no tracks - o opens a local folder, b browses remote folders".into();
        }
        if !player.query.trim().is_empty() {
            return format!("  no tracks match \"{}\"", player.query.trim());
        }
        match player.tab {
            Tab::Favorites => "  no favorites here yet - f marks the selected track".into(),
            Tab::Recent => "  nothing played from this playlist yet".into(),
            Tab::All => "  playlist is empty".into(),
        }
    }
}

/// Right-hand column: duration when known, else the reported size, plus a
/// source tag for remote tracks.
fn row_meta(track: &Track) -> String {
    let detail = match (track.duration, &track.size) {
        (Some(d), _) => format_time(d),
        (None, Some(size)) => size.clone(),
        (None, None) => String::new(),
    };
    match (track.is_remote(), detail.is_empty()) {
        (true, true) => "drive".into(),
        (true, false) => format!("{}  drive", detail),
        (false, _) => detail,
    }
}

/// Truncate to `width` display columns, padding short names.
fn fit(text: &str, width: usize) -> String {
    if text.width() <= width {
        return format!("{}{}", text, " ".repeat(width - text.width()));
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    if width > 0 {
        out.push('…');
        used += 1;
    }
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}

fn tabs_line(state: &AppState, p: &Palette) -> Line<'static> {
    let player = &state.player;
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" │ ", Style::default().fg(p.separator)));
        }
        let label = format!("{} {}", i + 1, tab.label());
        let style = if *tab == player.tab {
            Style::default().fg(p.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(p.secondary)
        };
        spans.push(Span::styled(label, style));
    }
    spans.push(Span::styled(
        format!("   {} shown", player.view.len()),
        Style::default().fg(p.muted),
    ));
    Line::from(spans)
}

impl Component for Playlist {
    fn id(&self) -> ComponentId {
        ComponentId::Playlist
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }

        if self.search.is_active() {
            match key.code {
                KeyCode::Up => {
                    self.select_up(1, state);
                    return vec![];
                }
                KeyCode::Down => {
                    self.select_down(1, state);
                    return vec![];
                }
                _ => {}
            }
            return match self.search.handle_key(key) {
                FilterAction::Changed(q) => vec![Action::SearchChanged(q)],
                FilterAction::Confirmed(q) => vec![Action::SearchConfirmed(q)],
                FilterAction::Cancelled => vec![Action::CloseSearch],
                FilterAction::None => vec![],
            };
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.select_up(1, state),
            KeyCode::Down | KeyCode::Char('j') => self.select_down(1, state),
            KeyCode::PageUp => self.page_step(false, state),
            KeyCode::PageDown => self.page_step(true, state),
            KeyCode::Home => self.select(0, state),
            KeyCode::End => self.select(usize::MAX, state),
            KeyCode::Enter if Self::view_len(state) > 0 => {
                return vec![Action::SendCommand(Command::LoadTrack {
                    view_index: self.selected,
                })];
            }
            KeyCode::Char('f') if Self::view_len(state) > 0 => {
                return vec![Action::SendCommand(Command::ToggleFavorite {
                    view_index: Some(self.selected),
                })];
            }
            KeyCode::Delete | KeyCode::Char('x') if Self::view_len(state) > 0 => {
                return vec![Action::SendCommand(Command::RemoveTrack {
                    view_index: self.selected,
                })];
            }
            KeyCode::Char('/') => {
                self.search.set_value(&state.player.query);
                self.search.activate();
                return vec![Action::OpenSearch];
            }
            _ => {}
        }
        vec![]
    }

    fn handle_mouse(&mut self, event: MouseEvent, _area: Rect, state: &AppState) -> Vec<Action> {
        let rows = self.list_area;
        match event.kind {
            MouseEventKind::ScrollUp => self.select_up(3, state),
            MouseEventKind::ScrollDown => self.select_down(3, state),
            MouseEventKind::Down(MouseButton::Left)
                if event.row >= rows.y && event.row < rows.bottom() =>
            {
                let row = (event.row - rows.y) as usize;
                let pos = self.page_start + self.list_state.offset() + row;
                // Rows below a short page are empty, not the next page.
                if pos >= self.page_end || pos >= Self::view_len(state) {
                    return vec![];
                }
                let is_double = self
                    .last_click
                    .is_some_and(|(p, t)| p == pos && t.elapsed().as_millis() < 400);
                self.selected = pos;
                if is_double {
                    self.last_click = None;
                    return vec![Action::SendCommand(Command::LoadTrack { view_index: pos })];
                }
                self.last_click = Some((pos, Instant::now()));
            }
            _ => {}
        }
        vec![]
    }

    fn on_action(&mut self, action: &Action, state: &AppState) -> Vec<Action> {
        match action {
            Action::JumpToCurrent => match state.player.current_view_pos {
                Some(pos) => self.select(pos, state),
                None => return vec![],
            },
            Action::CloseSearch => {
                self.search.clear();
                self.search.deactivate();
            }
            Action::SendCommand(Command::SwitchTab { .. }) => {
                self.search.clear();
                self.search.deactivate();
                self.selected = 0;
            }
            Action::SearchChanged(_) | Action::SearchConfirmed(_) => self.selected = 0,
            _ => {}
        }
        vec![]
    }

    fn on_state(&mut self, state: &AppState) {
        let player = &state.player;
        if player.current != self.last_current {
            // Follow the playing track when the cursor was sitting on the old one.
            let was_on_current = self
                .last_current
                .and_then(|c| player.view.iter().position(|&i| i == c))
                .map_or(true, |pos| pos == self.selected);
            if was_on_current {
                if let Some(pos) = player.current_view_pos {
                    self.selected = pos;
                }
            }
            self.last_current = player.current;
        }
        let selected = self.selected;
        self.select(selected, state);
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let p = state.palette();
        let player = &state.player;

        let title = match &player.folder_mode {
            Some(folder) => format!(" {} ", folder),
            None => " playlist ".to_string(),
        };
        let pages = page_count(player.view.len(), state.page_size);
        let page = page_of(self.selected, state.page_size).min(pages - 1);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(p.style_border(focused))
            .title(Line::from(Span::styled(
                title,
                Style::default().fg(p.primary).add_modifier(Modifier::BOLD),
            )))
            .title_top(
                Line::from(Span::styled(
                    format!(" {} tracks · page {}/{} ", player.playlist.len(), page + 1, pages),
                    Style::default().fg(p.muted),
                ))
                .right_aligned(),
            );
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height == 0 {
            return;
        }

        frame.render_widget(
            Paragraph::new(tabs_line(state, p)),
            Rect { height: 1, ..inner },
        );

        let show_search = self.search.is_active() || !player.query.is_empty();
        let search_h = u16::from(show_search);
        let list_area = Rect {
            y: inner.y + 1,
            height: inner.height.saturating_sub(1 + search_h),
            ..inner
        };

        self.list_area = list_area;
        self.page_end = 0;
        if player.view.is_empty() {
            frame.render_widget(
                Paragraph::new(Span::styled(Self::empty_message(state), p.style_muted())),
                list_area,
            );
        } else {
            let (start, end) = page_bounds(player.view.len(), page, state.page_size);
            self.page_start = start;
            self.page_end = end;
            let items: Vec<ListItem> = (start..end)
                .filter_map(|pos| {
                    let track = player.view_track(pos)?;
                    Some(self.render_row(pos, track, player.view[pos], list_area.width, state))
                })
                .collect();
            self.list_state
                .select(Some(self.selected.saturating_sub(start).min(end - start - 1)));
            frame.render_stateful_widget(List::new(items), list_area, &mut self.list_state);
        }

        if show_search {
            let search_area = Rect {
                y: inner.y + inner.height - 1,
                height: 1,
                ..inner
            };
            if !self.search.is_active() && self.search.text() != player.query {
                self.search.set_value(&player.query);
            }
            self.search.draw(frame, search_area, p);
        }
    }

    fn min_height(&self) -> u16 {
        5
    }
}
