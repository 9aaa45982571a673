//! Local listening statistics.  Nothing leaves the machine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::{KeyValueStore, StoreError};

pub const ANALYTICS_KEY: &str = "playerAnalytics";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    #[serde(default)]
    pub tracks_played: u64,
    /// Seconds of audio played to completion.
    #[serde(default)]
    pub total_playtime: f64,
    #[serde(default)]
    pub most_played_tracks: BTreeMap<String, u64>,
    #[serde(default)]
    pub sessions_count: u64,
    /// Epoch milliseconds of the latest start.
    #[serde(default)]
    pub last_session: Option<i64>,
}

impl Analytics {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let Some(raw) = store.get(ANALYTICS_KEY) else {
            return Self::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("analytics: discarding malformed record: {}", e);
            Self::default()
        })
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        store.set(ANALYTICS_KEY, serde_json::to_string(self)?)
    }

    pub fn record_session(&mut self, now: DateTime<Utc>) {
        self.sessions_count += 1;
        self.last_session = Some(now.timestamp_millis());
    }

    /// A track played through to its natural end.
    pub fn record_play(&mut self, track_id: &str, duration_secs: Option<f64>) {
        self.tracks_played += 1;
        if let Some(secs) = duration_secs.filter(|s| s.is_finite() && *s > 0.0) {
            self.total_playtime += secs;
        }
        *self
            .most_played_tracks
            .entry(track_id.to_string())
            .or_insert(0) += 1;
    }

    /// Highest play counts first; ties by id.
    pub fn top_tracks(&self, n: usize) -> Vec<(&str, u64)> {
        let mut all: Vec<(&str, u64)> = self
            .most_played_tracks
            .iter()
            .map(|(id, count)| (id.as_str(), *count))
            .collect();
        all.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        all.truncate(n);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_record_and_persist() {
        let mut store = MemoryStore::new();
        let mut stats = Analytics::load(&store);
        stats.record_session(Utc::now());
        stats.record_play("a", Some(120.0));
        stats.record_play("b", None);
        stats.record_play("a", Some(f64::NAN));
        stats.save(&mut store).unwrap();

        let loaded = Analytics::load(&store);
        assert_eq!(loaded.tracks_played, 3);
        assert_eq!(loaded.total_playtime, 120.0);
        assert_eq!(loaded.sessions_count, 1);
        assert_eq!(loaded.top_tracks(1), vec![("a", 2)]);
    }

    #[test]
    fn test_wire_names() {
        let mut stats = Analytics::default();
        stats.record_play("id", Some(1.0));
        let raw = serde_json::to_value(&stats).unwrap();
        assert_eq!(raw["mostPlayedTracks"]["id"], 1);
        assert_eq!(raw["tracksPlayed"], 1);
        assert!(raw.get("totalPlaytime").is_some());
    }

    #[test]
    fn test_malformed_record_resets() {
        let mut store = MemoryStore::new();
        store.set(ANALYTICS_KEY, "[1,2".into()).unwrap();
        assert_eq!(Analytics::load(&store), Analytics::default());
    }
}
