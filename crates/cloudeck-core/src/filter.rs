//! Playlist filtering and pagination.
//!
//! The filtered view is a list of playlist indices.  It is always rebuilt from
//! the playlist, never edited on its own.

use crate::library::{Favorites, RecentlyPlayed, RECENT_LIMIT};
use crate::protocol::{Tab, Track};

/// Tab restriction first, then the case-insensitive name query.
pub fn filter(
    playlist: &[Track],
    tab: Tab,
    favorites: &Favorites,
    recent: &RecentlyPlayed,
    query: &str,
) -> Vec<usize> {
    let mut view: Vec<usize> = match tab {
        Tab::All => (0..playlist.len()).collect(),
        Tab::Favorites => (0..playlist.len())
            .filter(|&i| favorites.contains(playlist[i].id_key()))
            .collect(),
        Tab::Recent => {
            let mut ranked: Vec<(usize, usize)> = playlist
                .iter()
                .enumerate()
                .filter_map(|(i, t)| recent.rank(t.id_key()).map(|rank| (rank, i)))
                .collect();
            // Stable on playlist order when two tracks share a key.
            ranked.sort_by_key(|&(rank, i)| (rank, i));
            ranked.into_iter().map(|(_, i)| i).take(RECENT_LIMIT).collect()
        }
    };

    let query = query.trim();
    if !query.is_empty() {
        let needle = query.to_lowercase();
        view.retain(|&i| playlist[i].name.to_lowercase().contains(&needle));
    }
    view
}

/// Number of pages needed for `len` rows; at least one.
pub fn page_count(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 1;
    }
    len.div_ceil(page_size).max(1)
}

/// `[start, end)` of `page` (clamped to the last page).
pub fn page_bounds(len: usize, page: usize, page_size: usize) -> (usize, usize) {
    if page_size == 0 {
        return (0, len);
    }
    let page = page.min(page_count(len, page_size) - 1);
    let start = page * page_size;
    let end = (start + page_size).min(len);
    (start.min(len), end)
}

/// The page that contains view position `pos`.
pub fn page_of(pos: usize, page_size: usize) -> usize {
    if page_size == 0 {
        0
    } else {
        pos / page_size
    }
}
