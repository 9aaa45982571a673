//! Status bar: bottom line with input mode and keybindings.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::Palette;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Search,
    /// Typing a filesystem path (local folder or state import).
    Prompt,
    /// The remote folder browser has the keyboard.
    Browse,
}

impl InputMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Search => "SEARCH",
            Self::Prompt => "PATH",
            Self::Browse => "FOLDERS",
        }
    }

    pub fn color(self, palette: &Palette) -> Color {
        match self {
            Self::Normal => palette.secondary,
            Self::Search => palette.filter_fg,
            Self::Prompt => palette.accent,
            Self::Browse => palette.remote,
        }
    }

    fn keys(self) -> &'static str {
        match self {
            Self::Normal => {
                " Space play/pause  n/p next/prev  ←→ seek  +/- vol  m mute  s shuffle  r repeat  f fav  / search  b folders  o open  ? help  q quit"
            }
            Self::Search => " type to search  ↑↓ move  Enter keep  Esc clear+close",
            Self::Prompt => " type a path  Enter confirm  Esc cancel",
            Self::Browse => " ↑↓ select  Enter open  Backspace up  p play folder  R refresh  Esc close",
        }
    }
}

/// Draw the keybindings footer bar (one row).
pub fn draw_keys_bar(frame: &mut Frame, area: Rect, mode: InputMode, palette: &Palette) {
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", mode.label()),
            Style::default()
                .fg(mode.color(palette))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(mode.keys(), Style::default().fg(palette.muted)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}
