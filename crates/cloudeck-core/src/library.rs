//! Favorites and recently-played lists, both keyed by track identity.

use serde::{Deserialize, Serialize};

pub const RECENT_LIMIT: usize = 50;

/// Favorite identity keys in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Favorites(Vec<String>);

impl Favorites {
    pub fn from_keys(keys: impl IntoIterator<Item = String>) -> Self {
        let mut favorites = Self::default();
        for key in keys {
            if !favorites.contains(&key) {
                favorites.0.push(key);
            }
        }
        favorites
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|k| k == key)
    }

    /// Flip membership; returns true when the key is now a favorite.
    pub fn toggle(&mut self, key: &str) -> bool {
        if let Some(pos) = self.0.iter().position(|k| k == key) {
            self.0.remove(pos);
            false
        } else {
            self.0.push(key.to_string());
            true
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }
}

/// Most-recent-first identity keys, capped at [`RECENT_LIMIT`], no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentlyPlayed(Vec<String>);

impl RecentlyPlayed {
    pub fn from_keys(keys: impl IntoIterator<Item = String>) -> Self {
        let mut recent = Self::default();
        // Oldest first so the head of the input stays at the front.
        let keys: Vec<String> = keys.into_iter().collect();
        for key in keys.into_iter().rev() {
            recent.record(&key);
        }
        recent
    }

    /// Move `key` to the front, dropping the oldest entry past the cap.
    pub fn record(&mut self, key: &str) {
        self.0.retain(|k| k != key);
        self.0.insert(0, key.to_string());
        self.0.truncate(RECENT_LIMIT);
    }

    /// Position in recency order (0 = most recent).
    pub fn rank(&self, key: &str) -> Option<usize> {
        self.0.iter().position(|k| k == key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }
}
