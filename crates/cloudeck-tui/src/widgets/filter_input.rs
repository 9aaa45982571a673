//! FilterInput: wraps tui-input for the search bar and the path prompts.

use ratatui::crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use tui_input::{backend::crossterm::EventHandler, Input};

use crate::theme::Palette;

#[derive(Debug, PartialEq)]
pub enum FilterAction {
    Changed(String),
    Confirmed(String),
    Cancelled,
    None,
}

pub struct FilterInput {
    input: Input,
    pub active: bool,
    prefix: &'static str,
    placeholder: String,
}

impl FilterInput {
    pub fn new(prefix: &'static str, placeholder: impl Into<String>) -> Self {
        Self {
            input: Input::default(),
            active: false,
            prefix,
            placeholder: placeholder.into(),
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn clear(&mut self) {
        self.input = Input::default();
    }

    pub fn set_value(&mut self, value: &str) {
        self.input = Input::new(value.to_string());
    }

    pub fn text(&self) -> &str {
        self.input.value()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Handle a key event. Returns what happened.
    ///
    /// Esc behaviour:
    ///   - If the input has text: clear the text, emit `Changed("")`
    ///   - If the input is already empty: deactivate and emit `Cancelled`
    pub fn handle_key(&mut self, key: KeyEvent) -> FilterAction {
        match key.code {
            KeyCode::Esc => {
                if !self.input.value().is_empty() {
                    self.input = Input::default();
                    FilterAction::Changed(String::new())
                } else {
                    self.deactivate();
                    FilterAction::Cancelled
                }
            }
            KeyCode::Enter => {
                self.deactivate();
                FilterAction::Confirmed(self.input.value().to_string())
            }
            _ => {
                let changed = self
                    .input
                    .handle_event(&ratatui::crossterm::event::Event::Key(key))
                    .is_some_and(|c| c.value);
                if changed {
                    FilterAction::Changed(self.input.value().to_string())
                } else {
                    FilterAction::None
                }
            }
        }
    }

    /// Render the input bar into `area`.
    pub fn draw(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        let prefix_w = self.prefix.chars().count() as u16;
        let scroll = self
            .input
            .visual_scroll(area.width.saturating_sub(prefix_w + 2) as usize);
        let value = self.input.value();
        let display = if value.is_empty() {
            Span::styled(
                format!("{}{}", self.prefix, self.placeholder),
                Style::default().fg(palette.muted),
            )
        } else {
            let visible: String = value.chars().skip(scroll).collect();
            Span::styled(
                format!("{}{}", self.prefix, visible),
                Style::default().fg(palette.filter_fg),
            )
        };

        let paragraph =
            Paragraph::new(Line::from(vec![display])).style(Style::default().bg(palette.filter_bg));
        frame.render_widget(paragraph, area);

        if self.active && area.width > 0 {
            let cursor_x = area.x + prefix_w + (self.input.visual_cursor() - scroll) as u16;
            frame.set_cursor_position((cursor_x.min(area.x + area.width - 1), area.y));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_typing_then_double_escape() {
        let mut input = FilterInput::new("/ ", "search...");
        input.activate();
        assert_eq!(
            input.handle_key(key(KeyCode::Char('a'))),
            FilterAction::Changed("a".into())
        );
        assert_eq!(
            input.handle_key(key(KeyCode::Esc)),
            FilterAction::Changed(String::new())
        );
        assert!(input.is_active());
        assert_eq!(input.handle_key(key(KeyCode::Esc)), FilterAction::Cancelled);
        assert!(!input.is_active());
    }

    #[test]
    fn test_enter_confirms_value() {
        let mut input = FilterInput::new("path: ", "");
        input.activate();
        input.set_value("/music");
        assert_eq!(
            input.handle_key(key(KeyCode::Enter)),
            FilterAction::Confirmed("/music".into())
        );
        assert!(!input.is_active());
    }
}
