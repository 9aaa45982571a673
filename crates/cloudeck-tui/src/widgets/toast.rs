//! Toast notification system: transient status messages.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use cloudeck_core::protocol::{Notice, NoticeLevel};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};

use crate::theme::Palette;

struct Toast {
    message: String,
    level: NoticeLevel,
    expires: Instant,
}

/// A persistent spinner toast that animates until dismissed.
struct SpinnerToast {
    message: String,
    frame: usize,
}

const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

pub struct ToastManager {
    toasts: VecDeque<Toast>,
    spinner: Option<SpinnerToast>,
    max_visible: usize,
}

impl ToastManager {
    pub fn new() -> Self {
        Self {
            toasts: VecDeque::new(),
            spinner: None,
            max_visible: 4,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, level: NoticeLevel, duration: Duration) {
        let msg = message.into();
        self.toasts.retain(|t| t.message != msg);
        self.toasts.push_back(Toast {
            message: msg,
            level,
            expires: Instant::now() + duration,
        });
        while self.toasts.len() > self.max_visible * 2 {
            self.toasts.pop_front();
        }
    }

    /// Show a notice from the player core.  Errors linger longest.
    pub fn notice(&mut self, notice: Notice) {
        let secs = match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => 3,
            NoticeLevel::Warning => 4,
            NoticeLevel::Error => 5,
        };
        self.push(notice.message, notice.level, Duration::from_secs(secs));
    }

    /// Start or replace the spinner.  It animates on every `tick()` and does
    /// not expire until `dismiss_spinner` is called.
    pub fn spinner(&mut self, message: impl Into<String>) {
        self.spinner = Some(SpinnerToast {
            message: message.into(),
            frame: 0,
        });
    }

    pub fn dismiss_spinner(&mut self) {
        self.spinner = None;
    }

    /// Remove expired toasts and advance the spinner frame. Call each tick.
    /// Returns whether anything visible changed.
    pub fn tick(&mut self) -> bool {
        let now = Instant::now();
        let before = self.toasts.len();
        self.toasts.retain(|t| t.expires > now);
        if let Some(ref mut s) = self.spinner {
            s.frame = (s.frame + 1) % SPINNER_FRAMES.len();
            return true;
        }
        before != self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty() && self.spinner.is_none()
    }

    /// Render toasts in the top-right corner of `area`.
    pub fn draw(&self, frame: &mut Frame, area: Rect, palette: &Palette) {
        if self.is_empty() || area.height == 0 {
            return;
        }
        let max_width = (area.width / 2).clamp(30, 60).min(area.width);
        let mut y = area.y + 1;

        if let Some(ref s) = self.spinner {
            let icon = SPINNER_FRAMES[s.frame % SPINNER_FRAMES.len()];
            let line = format!(" {} {} ", icon, &s.message);
            draw_line(frame, area, y, max_width, line, palette.toast_info);
            y += 1;
        }

        for toast in self.toasts.iter().rev().take(self.max_visible) {
            if y >= area.y + area.height {
                break;
            }
            let (color, icon) = match toast.level {
                NoticeLevel::Info => (palette.toast_info, "·"),
                NoticeLevel::Success => (palette.toast_success, "✓"),
                NoticeLevel::Warning => (palette.toast_warning, "!"),
                NoticeLevel::Error => (palette.toast_error, "✗"),
            };
            let line = format!(" {} {} ", icon, &toast.message);
            draw_line(frame, area, y, max_width, line, color);
            y += 1;
        }
    }
}

fn draw_line(
    frame: &mut Frame,
    area: Rect,
    y: u16,
    max_width: u16,
    text: String,
    color: ratatui::style::Color,
) {
    if y >= area.y + area.height {
        return;
    }
    let w = (unicode_width::UnicodeWidthStr::width(text.as_str()) as u16).min(max_width);
    let x = area.x + area.width.saturating_sub(w + 1);
    let toast_area = Rect {
        x,
        y,
        width: w,
        height: 1,
    };
    frame.render_widget(Clear, toast_area);
    let paragraph = Paragraph::new(Line::from(vec![Span::styled(
        text,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )]));
    frame.render_widget(paragraph, toast_area);
}

impl Default for ToastManager {
    fn default() -> Self {
        Self::new()
    }
}
