//! AppState: shared read-only data passed to all components during render/event.
//!
//! Components read this for player state, but never mutate it.
//! The App event-loop is the only thing that writes to AppState.

use std::sync::Arc;

use cloudeck_core::state::PlayerSnapshot;

use crate::theme::{self, Palette};
use crate::widgets::status_bar::InputMode;

pub struct AppState {
    /// Latest snapshot broadcast by the player core.
    pub player: Arc<PlayerSnapshot>,
    pub input_mode: InputMode,
    /// A remote folder fetch is in flight.
    pub browsing: bool,
    /// Rows per playlist page.
    pub page_size: usize,
}

impl AppState {
    pub fn new(page_size: usize) -> Self {
        Self {
            player: Arc::new(PlayerSnapshot::default()),
            input_mode: InputMode::Normal,
            browsing: false,
            page_size: page_size.max(1),
        }
    }

    pub fn palette(&self) -> &'static Palette {
        theme::palette(self.player.dark_mode)
    }

    pub fn is_favorite(&self, id_key: &str) -> bool {
        self.player.favorites.contains(id_key)
    }
}
