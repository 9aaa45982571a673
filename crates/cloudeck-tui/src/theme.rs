//! Color palettes and style helpers for the dark and light themes.

use ratatui::style::{Color, Modifier, Style};

// ── Palette ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub bg: Color,
    pub accent: Color,
    pub playing: Color,
    pub loading: Color,
    pub muted: Color,
    pub separator: Color,
    pub secondary: Color,
    pub primary: Color,
    pub selection_bg: Color,
    pub border: Color,
    pub border_focused: Color,
    pub filter_bg: Color,
    pub filter_fg: Color,
    pub favorite: Color,
    pub remote: Color,
    pub toast_info: Color,
    pub toast_success: Color,
    pub toast_warning: Color,
    pub toast_error: Color,
}

pub const DARK: Palette = Palette {
    bg: Color::Rgb(18, 18, 18),
    accent: Color::Rgb(255, 95, 95),
    playing: Color::Rgb(80, 200, 120),
    loading: Color::Rgb(255, 184, 80),
    muted: Color::Rgb(72, 72, 88),
    separator: Color::Rgb(40, 40, 52),
    secondary: Color::Rgb(115, 115, 138),
    primary: Color::Rgb(210, 210, 225),
    selection_bg: Color::Rgb(28, 28, 40),
    border: Color::Rgb(40, 40, 52),
    border_focused: Color::Rgb(120, 100, 200),
    filter_bg: Color::Rgb(20, 20, 32),
    filter_fg: Color::Rgb(255, 200, 80),
    favorite: Color::Rgb(255, 210, 50),
    remote: Color::Rgb(80, 140, 200),
    toast_info: Color::Rgb(80, 160, 220),
    toast_success: Color::Rgb(80, 200, 120),
    toast_warning: Color::Rgb(255, 184, 80),
    toast_error: Color::Rgb(255, 95, 95),
};

pub const LIGHT: Palette = Palette {
    bg: Color::Rgb(246, 246, 242),
    accent: Color::Rgb(200, 50, 60),
    playing: Color::Rgb(30, 140, 70),
    loading: Color::Rgb(190, 120, 0),
    muted: Color::Rgb(160, 160, 170),
    separator: Color::Rgb(215, 215, 222),
    secondary: Color::Rgb(95, 95, 115),
    primary: Color::Rgb(30, 30, 40),
    selection_bg: Color::Rgb(225, 225, 236),
    border: Color::Rgb(205, 205, 215),
    border_focused: Color::Rgb(100, 80, 180),
    filter_bg: Color::Rgb(236, 236, 228),
    filter_fg: Color::Rgb(150, 90, 0),
    favorite: Color::Rgb(200, 150, 0),
    remote: Color::Rgb(40, 100, 170),
    toast_info: Color::Rgb(40, 110, 180),
    toast_success: Color::Rgb(30, 140, 70),
    toast_warning: Color::Rgb(190, 120, 0),
    toast_error: Color::Rgb(200, 50, 60),
};

pub fn palette(dark_mode: bool) -> &'static Palette {
    if dark_mode {
        &DARK
    } else {
        &LIGHT
    }
}

// ── Predefined styles ─────────────────────────────────────────────────────────

impl Palette {
    pub fn style_secondary(&self) -> Style {
        Style::default().fg(self.secondary)
    }

    pub fn style_selected(&self) -> Style {
        Style::default().bg(self.selection_bg).fg(self.primary)
    }

    pub fn style_selected_focused(&self) -> Style {
        self.style_selected().add_modifier(Modifier::BOLD)
    }

    pub fn style_border(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.border_focused)
        } else {
            Style::default().fg(self.border)
        }
    }

    pub fn style_muted(&self) -> Style {
        Style::default().fg(self.muted)
    }
}
