//! Smooth Unicode progress bar widget.

use cloudeck_core::format::format_time;
use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::theme::Palette;

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Fill `width` cells to `progress` (0.0..=1.0) using eighth blocks.
pub fn bar_cells(progress: f64, width: usize) -> String {
    let eighths = (progress.clamp(0.0, 1.0) * width as f64 * 8.0) as usize;
    let full_blocks = (eighths / 8).min(width);
    let partial = eighths % 8;

    let mut bar = String::with_capacity(width * 3);
    for _ in 0..full_blocks {
        bar.push('█');
    }
    if full_blocks < width {
        bar.push(BLOCKS[partial]);
        for _ in (full_blocks + 1)..width {
            bar.push(' ');
        }
    }
    bar
}

/// Render a progress bar in `area` with elapsed/total labels.  A disabled bar
/// (non-seekable stream) is a muted dashed line.  Returns the cells the bar
/// itself occupies, for click-to-seek.
pub fn draw_progress(
    frame: &mut Frame,
    area: Rect,
    progress: f64,
    time_pos: Option<f64>,
    duration: Option<f64>,
    enabled: bool,
    palette: &Palette,
) -> Rect {
    if area.width < 4 || area.height == 0 {
        return Rect::default();
    }

    let left_label = time_pos.map(format_time).unwrap_or_else(|| "0:00".into());
    let right_label = duration.map(format_time).unwrap_or_else(|| "--:--".into());
    let label_w = (left_label.len() + right_label.len() + 2) as u16;
    let bar_w = area.width.saturating_sub(label_w).max(4) as usize;

    let (bar, bar_style) = if enabled {
        (bar_cells(progress, bar_w), Style::default().fg(palette.playing))
    } else {
        ("┄".repeat(bar_w), Style::default().fg(palette.muted))
    };

    let spans = vec![
        Span::styled(
            format!("{} ", left_label),
            Style::default().fg(palette.secondary),
        ),
        Span::styled(bar, bar_style),
        Span::styled(
            format!(" {}", right_label),
            Style::default().fg(palette.muted),
        ),
    ];

    frame.render_widget(Paragraph::new(Line::from(spans)), area);

    let bar_x = area.x + left_label.len() as u16 + 1;
    Rect {
        x: bar_x,
        y: area.y,
        width: (bar_w as u16).min((area.x + area.width).saturating_sub(bar_x)),
        height: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_cells() {
        assert_eq!(bar_cells(0.0, 4), "    ");
        assert_eq!(bar_cells(1.0, 4), "████");
        assert_eq!(bar_cells(0.5, 4), "██  ");
        // 3/16 of 4 cells = 6 eighths → one partial cell.
        assert_eq!(bar_cells(0.1875, 4), "▊   ");
        assert_eq!(bar_cells(2.0, 3).chars().count(), 3);
    }
}
