use segue::domain::{PlayerState, Queue, Track};
use segue::error::PersistError;
use segue::persist::{
    PersistSnapshot, SNAPSHOT_VERSION, load_snapshot, save_snapshot, spawn_debounced_writer,
};
use segue::settings::PlaybackSettings;
use std::fs;
use std::time::Duration;

fn state(current: usize, position: f64) -> PlayerState {
    let queue = Queue::new(vec![
        Track::new("a", "A", 3.0).with_artist("X"),
        Track::new("b", "B", 4.0),
    ]);
    PlayerState {
        current_track: queue.get(current).cloned(),
        queue,
        is_playing: true,
        position_secs: position,
        duration_secs: 3.0,
        ..PlayerState::default()
    }
}

#[test]
fn snapshot_roundtrip_restores_queue_and_track() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = PlaybackSettings {
        crossfade_secs: 6.0,
        ..PlaybackSettings::default()
    };
    let snap = PersistSnapshot::capture(&state(1, 1.5), &settings);
    save_snapshot(dir.path(), &snap).expect("save");

    let loaded = load_snapshot(dir.path()).expect("load");
    assert_eq!(loaded.version, SNAPSHOT_VERSION);
    assert_eq!(loaded.queue().len(), 2);
    assert_eq!(loaded.current_track().map(|t| t.id.as_str()), Some("b"));
    assert_eq!(loaded.player.position_secs, 1.5);
    assert_eq!(loaded.settings.crossfade_secs, 6.0);
    assert_eq!(loaded.queue().get(0).map(|t| t.artist.as_str()), Some("X"));
}

#[test]
fn snapshot_version_mismatch_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut snap = PersistSnapshot::capture(&state(0, 0.0), &PlaybackSettings::default());
    snap.version = SNAPSHOT_VERSION + 1;
    save_snapshot(dir.path(), &snap).expect("save");

    let err = load_snapshot(dir.path()).expect_err("version");
    assert!(matches!(
        err,
        PersistError::IncompatibleVersion { found, .. } if found == SNAPSHOT_VERSION + 1
    ));
}

#[test]
fn snapshot_corrupt_file_is_serde_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("player_state.json"), b"{oops").expect("write");
    assert!(matches!(
        load_snapshot(dir.path()),
        Err(PersistError::Serde(_))
    ));
}

#[tokio::test]
async fn debounced_writer_keeps_only_latest() {
    let dir = tempfile::tempdir().expect("tempdir");
    let writer = spawn_debounced_writer(dir.path().to_path_buf(), Duration::from_millis(50));
    let sink = writer.sink();

    for i in 0..5 {
        sink(PersistSnapshot::capture(
            &state(0, i as f64),
            &PlaybackSettings::default(),
        ));
    }
    drop(sink);
    writer.shutdown().await;

    let loaded = load_snapshot(dir.path()).expect("load");
    assert_eq!(loaded.player.position_secs, 4.0);
}
