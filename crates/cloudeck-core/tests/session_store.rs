//! Session, preference and analytics persistence through the on-disk store,
//! including a reopen between "runs".

use chrono::{Duration, TimeZone, Utc};
use cloudeck_core::analytics::Analytics;
use cloudeck_core::controller::{Effect, MediaEvent, PlayerController};
use cloudeck_core::protocol::{Command, Track};
use cloudeck_core::session::{SaveOutcome, SessionRestore, SessionStore, SESSION_KEY};
use cloudeck_core::state::PlaybackState;
use cloudeck_core::store::{FileStore, KeyValueStore};
use cloudeck_core::transfer;
use rand::rngs::StdRng;
use rand::SeedableRng;

const QUOTA: usize = 5 * 1024 * 1024;

fn sessions() -> SessionStore {
    SessionStore::new(Duration::hours(24), 100)
}

fn remote_tracks(n: usize) -> Vec<Track> {
    (0..n)
        .map(|i| Track::remote(format!("set {i:02}.mp3"), format!("drive-{i}")))
        .collect()
}

#[test]
fn session_survives_reopen_within_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let saved_at = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();

    let mut controller = PlayerController::new(PlaybackState::new(90), StdRng::seed_from_u64(3), 3.0);
    controller.dispatch(Command::SetPlaylist {
        folder_name: "Sets".into(),
        tracks: remote_tracks(4),
        path: vec!["Music".into(), "Sets".into()],
    });
    let fx = controller.dispatch(Command::LoadTrack { view_index: 2 });
    assert!(fx.contains(&Effect::SaveSession));
    controller.on_media(MediaEvent::Ready);

    {
        let mut store = FileStore::open(&path, QUOTA);
        let outcome = sessions()
            .save(&mut store, controller.state(), saved_at)
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Full);
        transfer::save_preferences(&mut store, controller.state(), saved_at).unwrap();
    }

    let mut store = FileStore::open(&path, QUOTA);
    let restored = match sessions().load(&mut store, saved_at + Duration::hours(23)) {
        SessionRestore::Remote(r) => r,
        other => panic!("expected remote session, got {other:?}"),
    };
    assert_eq!(restored.tracks.len(), 4);
    assert_eq!(restored.current, Some(2));
    assert_eq!(restored.folder_mode.as_deref(), Some("Sets"));
    assert_eq!(restored.path, ["Music", "Sets"]);

    let prefs = transfer::load_preferences(&store).unwrap();
    let mut next_run = PlayerController::new(PlaybackState::new(100), StdRng::seed_from_u64(3), 3.0);
    next_run.apply_preferences(prefs);
    next_run.restore_session(restored);
    let state = next_run.state();
    assert_eq!(state.volume, 90);
    assert_eq!(state.recent.keys(), ["drive-2".to_string()]);
    assert_eq!(state.current_track().unwrap().name, "set 02.mp3");
}

#[test]
fn session_older_than_a_day_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");
    let saved_at = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();

    let mut state = PlaybackState::new(100);
    state.set_playlist(remote_tracks(3));
    let mut store = FileStore::open(&path, QUOTA);
    sessions().save(&mut store, &state, saved_at).unwrap();

    let mut store = FileStore::open(&path, QUOTA);
    assert_eq!(
        sessions().load(&mut store, saved_at + Duration::hours(25)),
        SessionRestore::Expired
    );
    assert!(store.get(SESSION_KEY).is_none());

    // The removal reached the disk too.
    let store = FileStore::open(&path, QUOTA);
    assert!(store.get(SESSION_KEY).is_none());
}

#[test]
fn oversized_session_is_saved_reduced() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = PlaybackState::new(100);
    state.set_playlist(remote_tracks(400));
    state.current = Some(250);

    // Room for roughly a hundred records, not four hundred.
    let mut store = FileStore::open(dir.path().join("store.json"), 12 * 1024);
    let now = Utc::now();
    assert_eq!(
        sessions().save(&mut store, &state, now).unwrap(),
        SaveOutcome::Reduced
    );
    match sessions().load(&mut store, now) {
        SessionRestore::Remote(r) => {
            assert_eq!(r.tracks.len(), 100);
            // The playing track fell outside the kept prefix.
            assert_eq!(r.current, None);
        }
        other => panic!("expected remote session, got {other:?}"),
    }
}

#[test]
fn local_only_session_asks_for_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = PlaybackState::new(100);
    state.set_playlist(vec![
        Track::local("a.mp3", "/music/a.mp3"),
        Track::local("b.mp3", "/music/b.mp3"),
    ]);
    state.folder_name = "Evening".into();

    let mut store = FileStore::open(dir.path().join("store.json"), QUOTA);
    let now = Utc::now();
    sessions().save(&mut store, &state, now).unwrap();
    assert_eq!(
        sessions().load(&mut store, now),
        SessionRestore::LocalOnly {
            folder_name: "Evening".into(),
            count: 2,
        }
    );
}

#[test]
fn analytics_accumulate_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.json");

    for _ in 0..2 {
        let mut store = FileStore::open(&path, QUOTA);
        let mut analytics = Analytics::load(&store);
        analytics.record_session(Utc::now());
        analytics.record_play("drive-1", Some(180.0));
        analytics.save(&mut store).unwrap();
    }

    let store = FileStore::open(&path, QUOTA);
    let analytics = Analytics::load(&store);
    assert_eq!(analytics.sessions_count, 2);
    assert_eq!(analytics.tracks_played, 2);
    assert_eq!(analytics.total_playtime, 360.0);
    assert_eq!(analytics.top_tracks(1), vec![("drive-1", 2)]);
}
