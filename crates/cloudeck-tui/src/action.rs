//! Action enum: all user-initiated intents and internal events.

use std::path::PathBuf;

use cloudeck_core::protocol::Command;

/// Unique identifier for a UI component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Playlist,
    NowPlaying,
    FolderBrowser,
    HelpOverlay,
}

/// What a path prompt is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    LocalFolder,
    ImportState,
}

impl PromptKind {
    pub fn prefix(self) -> &'static str {
        match self {
            PromptKind::LocalFolder => "open folder: ",
            PromptKind::ImportState => "import file: ",
        }
    }
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone)]
pub enum Action {
    // ── Player ───────────────────────────────────────────────────────────────
    /// Forward a command to the player core as is.
    SendCommand(Command),
    /// Next/previous from the keyboard, rate-limited against key repeat.
    Skip(Command),

    // ── Selection ────────────────────────────────────────────────────────────
    JumpToCurrent,

    // ── Search ───────────────────────────────────────────────────────────────
    OpenSearch,
    CloseSearch,
    /// The search text changed; filtering runs after a quiet period.
    SearchChanged(String),
    /// Enter in the search bar: filter now.
    SearchConfirmed(String),

    // ── Prompts ──────────────────────────────────────────────────────────────
    OpenPrompt(PromptKind),
    ClosePrompt,
    PromptConfirmed(PromptKind, PathBuf),

    // ── Remote folders ───────────────────────────────────────────────────────
    OpenBrowser,
    CloseBrowser,

    // ── UI toggles ───────────────────────────────────────────────────────────
    ToggleHelp,

    // ── System ───────────────────────────────────────────────────────────────
    Quit,
}
