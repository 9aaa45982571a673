//! FolderBrowserPanel: centered popup for navigating the remote folder tree.
//!
//! Holds its own navigation path; the player only hears about a folder once
//! the user plays it.

use cloudeck_core::drive::{FolderBrowser, FolderNode};
use cloudeck_core::protocol::{Command, Track};
use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::help_overlay::centered_rect,
};

/// One row of the listing.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Up,
    Folder { name: String, count: usize },
    File { index: usize, name: String, size: Option<String> },
}

pub struct FolderBrowserPanel {
    pub visible: bool,
    browser: Option<FolderBrowser>,
    selected: usize,
    list_state: ListState,
}

impl FolderBrowserPanel {
    pub fn new() -> Self {
        Self {
            visible: false,
            browser: None,
            selected: 0,
            list_state: ListState::default(),
        }
    }

    pub fn has_tree(&self) -> bool {
        self.browser.is_some()
    }

    /// Install a freshly fetched tree, staying in the same folder when it
    /// still exists.
    pub fn set_tree(&mut self, root: FolderNode) {
        let previous: Vec<String> = self
            .browser
            .as_ref()
            .map(|b| b.path().iter().skip(1).cloned().collect())
            .unwrap_or_default();
        let mut browser = FolderBrowser::new(root);
        for name in &previous {
            if !browser.open(name) {
                break;
            }
        }
        self.browser = Some(browser);
        self.selected = 0;
    }

    pub fn entries(&self) -> Vec<Entry> {
        let Some(browser) = &self.browser else {
            return Vec::new();
        };
        let mut out = Vec::new();
        if browser.can_go_back() {
            out.push(Entry::Up);
        }
        for (name, node) in browser.subfolders() {
            out.push(Entry::Folder {
                name: name.to_string(),
                count: node.audio_count(),
            });
        }
        for (index, file) in browser.files().iter().enumerate() {
            out.push(Entry::File {
                index,
                name: file.name.clone(),
                size: file.size.clone(),
            });
        }
        out
    }

    fn clamp(&mut self) {
        let len = self.entries().len();
        self.selected = if len == 0 { 0 } else { self.selected.min(len - 1) };
    }

    fn play(&self, folder_name: String, tracks: Vec<Track>, path: Vec<String>) -> Action {
        Action::SendCommand(Command::SetPlaylist {
            folder_name,
            tracks,
            path,
        })
    }

    /// Play the folder under the cursor, or the folder being shown when the
    /// cursor is not on a subfolder.
    fn play_selected_folder(&self) -> Vec<Action> {
        let Some(browser) = &self.browser else {
            return vec![];
        };
        match self.entries().get(self.selected) {
            Some(Entry::Folder { name, .. }) => {
                let tracks = browser.folder_tracks(name).unwrap_or_default();
                let mut path = browser.path().to_vec();
                path.push(name.clone());
                vec![self.play(name.clone(), tracks, path), Action::CloseBrowser]
            }
            _ => {
                let name = browser.path().last().cloned().unwrap_or_default();
                vec![
                    self.play(name, browser.current_tracks(), browser.path().to_vec()),
                    Action::CloseBrowser,
                ]
            }
        }
    }
}

impl Component for FolderBrowserPanel {
    fn id(&self) -> ComponentId {
        ComponentId::FolderBrowser
    }

    fn handle_key(&mut self, key: KeyEvent, state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release || !self.visible {
            return vec![];
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                if state.browsing {
                    return vec![Action::SendCommand(Command::CancelBrowse)];
                }
                return vec![Action::CloseBrowser];
            }
            KeyCode::Char('R') => {
                return vec![Action::SendCommand(Command::BrowseRemote { refresh: true })];
            }
            _ => {}
        }

        let entries = self.entries();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < entries.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = entries.len().saturating_sub(1),
            KeyCode::Backspace | KeyCode::Left | KeyCode::Char('h') => {
                if let Some(b) = self.browser.as_mut() {
                    if b.back() {
                        self.selected = 0;
                    }
                }
            }
            KeyCode::Char('p') => return self.play_selected_folder(),
            KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
                match entries.get(self.selected).cloned() {
                    Some(Entry::Up) => {
                        if let Some(b) = self.browser.as_mut() {
                            b.back();
                        }
                        self.selected = 0;
                    }
                    Some(Entry::Folder { name, .. }) => {
                        if let Some(b) = self.browser.as_mut() {
                            b.open(&name);
                        }
                        self.selected = 0;
                    }
                    Some(Entry::File { index, .. }) => {
                        // Play this folder starting at the chosen file.
                        let mut actions = self.play_selected_folder();
                        actions.insert(
                            1,
                            Action::SendCommand(Command::LoadTrack { view_index: index }),
                        );
                        return actions;
                    }
                    None => {}
                }
            }
            _ => {}
        }
        self.clamp();
        vec![]
    }

    fn on_action(&mut self, action: &Action, _state: &AppState) -> Vec<Action> {
        match action {
            Action::OpenBrowser => self.visible = true,
            Action::CloseBrowser => self.visible = false,
            _ => {}
        }
        vec![]
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, _focused: bool, state: &AppState) {
        if !self.visible {
            return;
        }
        let p = state.palette();
        let height = area.height.saturating_mul(7) / 10;
        let popup = centered_rect(70, height.max(8), area);

        let title = match &self.browser {
            Some(b) => format!(" {} ", b.breadcrumb()),
            None => " remote folders ".to_string(),
        };
        let footer = match &self.browser {
            Some(b) => format!(" {} ", b.stats_label()),
            None => String::new(),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(p.style_border(true))
            .style(Style::default().bg(p.bg))
            .title(Line::from(Span::styled(
                title,
                Style::default().fg(p.primary).add_modifier(Modifier::BOLD),
            )))
            .title_bottom(Line::from(Span::styled(footer, p.style_muted())));
        let inner = block.inner(popup);
        frame.render_widget(Clear, popup);
        frame.render_widget(block, popup);

        let entries = self.entries();
        if entries.is_empty() {
            let msg = if state.browsing {
                "  loading folders... (Esc cancels)"
            } else if self.browser.is_some() {
                "  this folder is empty"
            } else {
                "  no folder listing yet - press R to fetch"
            };
            frame.render_widget(Paragraph::new(Span::styled(msg, p.style_muted())), inner);
            return;
        }

        let items: Vec<ListItem> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let line = match entry {
                    Entry::Up => Line::from(Span::styled("  ..", p.style_secondary())),
                    Entry::Folder { name, count } => Line::from(vec![
                        Span::styled("  ▸ ", Style::default().fg(p.remote)),
                        Span::styled(name.clone(), Style::default().fg(p.primary)),
                        Span::styled(format!("  {} audio", count), p.style_muted()),
                    ]),
                    Entry::File { name, size, .. } => Line::from(vec![
                        Span::styled("  ♪ ", p.style_muted()),
                        Span::styled(name.clone(), p.style_secondary()),
                        Span::styled(
                            size.as_ref().map(|s| format!("  {}", s)).unwrap_or_default(),
                            p.style_muted(),
                        ),
                    ]),
                };
                let item = ListItem::new(line);
                if i == self.selected {
                    item.style(p.style_selected_focused())
                } else {
                    item
                }
            })
            .collect();
        self.list_state.select(Some(self.selected));
        frame.render_stateful_widget(List::new(items), inner, &mut self.list_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    const TREE: &str = r#"{
        "status": "success",
        "folders": {
            "name": "Music",
            "files": [],
            "folders": {
                "Live": {
                    "audioCount": 2,
                    "files": [
                        {"name": "one.mp3", "fileId": "f1"},
                        {"name": "two.mp3", "fileId": "f2"}
                    ],
                    "folders": {
                        "Encores": {"audioCount": 1, "files": [{"name": "e.mp3", "fileId": "f3"}]}
                    }
                }
            }
        }
    }"#;

    fn panel() -> FolderBrowserPanel {
        let mut panel = FolderBrowserPanel::new();
        panel.visible = true;
        panel.set_tree(cloudeck_core::drive::parse_folder_response(TREE).unwrap());
        panel
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_navigate_into_and_back() {
        let state = AppState::new(50);
        let mut panel = panel();
        assert_eq!(
            panel.entries(),
            vec![Entry::Folder {
                name: "Live".into(),
                count: 2
            }]
        );
        panel.handle_key(key(KeyCode::Enter), &state);
        let entries = panel.entries();
        assert_eq!(entries[0], Entry::Up);
        assert_eq!(entries.len(), 4);
        panel.handle_key(key(KeyCode::Backspace), &state);
        assert_eq!(panel.entries().len(), 1);
    }

    #[test]
    fn test_play_subfolder_sends_its_tracks_and_path() {
        let state = AppState::new(50);
        let mut panel = panel();
        let actions = panel.handle_key(key(KeyCode::Char('p')), &state);
        match actions.as_slice() {
            [Action::SendCommand(Command::SetPlaylist {
                folder_name,
                tracks,
                path,
            }), Action::CloseBrowser] => {
                assert_eq!(folder_name, "Live");
                assert_eq!(tracks.len(), 2);
                assert_eq!(path, &["Music".to_string(), "Live".to_string()]);
            }
            other => panic!("unexpected actions {other:?}"),
        }
    }

    #[test]
    fn test_enter_on_file_plays_from_that_file() {
        let state = AppState::new(50);
        let mut panel = panel();
        panel.handle_key(key(KeyCode::Enter), &state);
        // "..", "Encores", "one.mp3", "two.mp3"
        panel.handle_key(key(KeyCode::End), &state);
        let actions = panel.handle_key(key(KeyCode::Enter), &state);
        assert!(matches!(
            actions.as_slice(),
            [
                Action::SendCommand(Command::SetPlaylist { .. }),
                Action::SendCommand(Command::LoadTrack { view_index: 1 }),
                Action::CloseBrowser
            ]
        ));
    }

    #[test]
    fn test_refresh_keeps_current_folder() {
        let mut panel = panel();
        let state = AppState::new(50);
        panel.handle_key(key(KeyCode::Enter), &state);
        panel.set_tree(cloudeck_core::drive::parse_folder_response(TREE).unwrap());
        assert_eq!(panel.entries()[0], Entry::Up);
    }

    #[test]
    fn test_escape_cancels_fetch_in_flight() {
        let mut state = AppState::new(50);
        state.browsing = true;
        let mut panel = panel();
        assert!(matches!(
            panel.handle_key(key(KeyCode::Esc), &state).as_slice(),
            [Action::SendCommand(Command::CancelBrowse)]
        ));
    }
}
