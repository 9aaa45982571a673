//! Key reference popup, toggled with `?`.

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::{Constraint, Flex, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    theme::Palette,
};

const KEY_COLUMN: usize = 20;

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "playback",
        &[
            ("enter", "play selected track"),
            ("space", "play / pause"),
            ("n / p", "next / previous track"),
            ("← / →", "seek back / forward"),
            ("+ / -", "volume up / down"),
            ("m", "mute"),
            ("s", "toggle shuffle"),
            ("r", "cycle repeat off / all / one"),
        ],
    ),
    (
        "playlist",
        &[
            ("↑ / ↓  or  j / k", "move selection"),
            ("pg up / pg dn", "previous / next page"),
            ("/", "search (esc clears and closes)"),
            ("tab  or  1 / 2 / 3", "all / favorites / recent"),
            ("f / F", "favorite selected / playing track"),
            ("x", "remove selected track"),
            ("S / C", "sort / clear playlist"),
            ("X", "leave folder mode"),
            ("g", "jump to playing track"),
        ],
    ),
    (
        "folders and state",
        &[
            ("b", "browse remote folders"),
            ("R", "refresh remote folders"),
            ("o", "open a local folder"),
            ("e / i", "export / import state"),
            ("d", "toggle dark mode"),
            ("esc", "cancel folder loading"),
        ],
    ),
    (
        "general",
        &[("?", "toggle this help"), ("q / ctrl+c", "quit")],
    ),
];

#[derive(Default)]
pub struct HelpOverlay {
    pub visible: bool,
}

impl HelpOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    fn lines(p: &Palette) -> Vec<Line<'static>> {
        let bold = Modifier::BOLD;
        let mut lines = vec![Line::from(Span::styled(
            " keyboard shortcuts",
            Style::default().fg(p.primary).add_modifier(bold),
        ))];
        for (title, rows) in SECTIONS {
            lines.push(Line::default());
            lines.push(Line::styled(
                format!(" {}", title),
                Style::default().fg(p.muted).add_modifier(bold),
            ));
            lines.extend(rows.iter().map(|(key, desc)| {
                Line::from(vec![
                    Span::styled(
                        format!(" {:<width$}", key, width = KEY_COLUMN),
                        Style::default().fg(p.primary).add_modifier(bold),
                    ),
                    Span::styled(*desc, Style::default().fg(p.secondary)),
                ])
            }));
        }
        lines.push(Line::default());
        lines.push(Line::styled(" ? or esc closes", Style::default().fg(p.muted)));
        lines
    }
}

impl Component for HelpOverlay {
    fn id(&self) -> ComponentId {
        ComponentId::HelpOverlay
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if !self.visible || key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        // While open the overlay swallows every key.
        match key.code {
            KeyCode::Char('?' | 'q') | KeyCode::Esc => vec![Action::ToggleHelp],
            _ => Vec::new(),
        }
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        if matches!(action, Action::ToggleHelp) {
            self.visible = !self.visible;
        }
        Vec::new()
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        if !self.visible {
            return;
        }
        let p = state.palette();
        let lines = Self::lines(p);
        let height = u16::try_from(lines.len() + 2).unwrap_or(u16::MAX);
        let popup = centered_rect(64, height, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(p.style_border(false))
            .style(Style::default().bg(p.bg));
        frame.render_widget(Clear, popup);
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }
}

/// A rect `percent_x` wide and `height` rows tall, centered in `r`.
pub fn centered_rect(percent_x: u16, height: u16, r: Rect) -> Rect {
    let [row] = Layout::vertical([Constraint::Length(height.min(r.height))])
        .flex(Flex::Center)
        .areas(r);
    let [popup] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(row);
    popup
}
