use segue::controller::{NoticeKind, PlaybackNotice};
use segue::domain::{PlayerState, Queue, RepeatMode, Track};
use segue::error::PlaybackError;
use segue::persist::PersistSnapshot;
use segue::player::{Backend, PlayerHandle, PlayerOptions, spawn_player};
use segue::settings::{PlaybackSettings, SettingsPatch};
use segue::store::MemoryTrackStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

fn tracks() -> Vec<Track> {
    vec![
        Track::new("a", "A", 3.0),
        Track::new("b", "B", 4.0),
        Track::new("c", "C", 5.0),
    ]
}

fn store_with(ids: &[&str]) -> Arc<MemoryTrackStore> {
    let store = MemoryTrackStore::new();
    for id in ids {
        store.insert(*id, vec![1u8; 32]);
    }
    Arc::new(store)
}

fn start(store: Arc<MemoryTrackStore>, settings: PlaybackSettings) -> PlayerHandle {
    spawn_player(
        store,
        PlayerOptions {
            settings,
            backend: Backend::Null,
            seed: Some(42),
            ..PlayerOptions::default()
        },
    )
}

fn crossfade(secs: f64) -> PlaybackSettings {
    PlaybackSettings {
        crossfade_secs: secs,
        ..PlaybackSettings::default()
    }
}

async fn wait_state(
    rx: &mut mpsc::UnboundedReceiver<PlayerState>,
    pred: impl Fn(&PlayerState) -> bool,
) -> PlayerState {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let s = rx.recv().await.expect("subscription closed");
            if pred(&s) {
                return s;
            }
        }
    })
    .await
    .expect("state not reached")
}

fn current_is(id: &'static str) -> impl Fn(&PlayerState) -> bool {
    move |s| s.current_track.as_ref().is_some_and(|t| t.id.as_str() == id) && s.is_playing
}

#[tokio::test(start_paused = true)]
async fn plays_through_queue_with_crossfade() {
    let player = start(store_with(&["a", "b", "c"]), crossfade(2.0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = player.subscribe(move |s| {
        let _ = tx.send(s.clone());
    });

    let t = tracks();
    player
        .play(t[0].clone(), Some(Queue::new(t.clone())))
        .await
        .unwrap();

    wait_state(&mut rx, current_is("a")).await;
    wait_state(&mut rx, current_is("b")).await;
    let snap = player.snapshot().await.unwrap();
    assert!(snap.position_secs > 1.5, "b should enter mid-fade, at {}", snap.position_secs);

    wait_state(&mut rx, current_is("c")).await;
    let end = wait_state(&mut rx, |s| !s.is_playing).await;
    assert_eq!(end.current_track.unwrap().id.as_str(), "c");
}

#[tokio::test(start_paused = true)]
async fn failing_track_is_skipped_with_notice() {
    let store = store_with(&["a", "b", "c"]);
    store.set_failing("b");
    let player = start(Arc::clone(&store), crossfade(0.0));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = player.subscribe(move |s| {
        let _ = tx.send(s.clone());
    });
    let notices: Arc<Mutex<Vec<PlaybackNotice>>> = Arc::default();
    let sink = Arc::clone(&notices);
    let _notice_sub = player.subscribe_notices(move |n| {
        sink.lock().unwrap().push(n.clone());
    });

    let t = tracks();
    player
        .play(t[0].clone(), Some(Queue::new(t.clone())))
        .await
        .unwrap();
    wait_state(&mut rx, current_is("c")).await;

    let notices = notices.lock().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].track_id.as_str(), "b");
    assert_eq!(notices[0].kind, NoticeKind::SourceUnavailable);
}

#[tokio::test(start_paused = true)]
async fn seek_and_volume_are_clamped() {
    let player = start(store_with(&["a", "b", "c"]), crossfade(0.0));

    assert!(matches!(
        player.seek_to(1.0).await,
        Err(PlaybackError::NoCurrentTrack)
    ));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = player.subscribe(move |s| {
        let _ = tx.send(s.clone());
    });
    let t = tracks();
    player
        .play(t[2].clone(), Some(Queue::new(t.clone())))
        .await
        .unwrap();
    wait_state(&mut rx, current_is("c")).await;

    player.seek_to(-4.0).await.unwrap();
    let s = player.snapshot().await.unwrap();
    assert_eq!(s.position_secs, 0.0);

    player.set_volume(3.0).await.unwrap();
    assert_eq!(player.settings().await.unwrap().volume, 1.0);
    player.set_volume(f32::NAN).await.unwrap();
    assert_eq!(player.settings().await.unwrap().volume, 1.0);
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_and_resume_continues() {
    let player = start(store_with(&["a", "b", "c"]), crossfade(0.0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = player.subscribe(move |s| {
        let _ = tx.send(s.clone());
    });
    let t = tracks();
    player
        .play(t[2].clone(), Some(Queue::new(t.clone())))
        .await
        .unwrap();
    wait_state(&mut rx, current_is("c")).await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    player.toggle_play_pause().await.unwrap();
    let paused = wait_state(&mut rx, |s| !s.is_playing).await;

    tokio::time::sleep(Duration::from_secs(2)).await;
    let still = player.snapshot().await.unwrap();
    assert_eq!(still.position_secs, paused.position_secs);

    player.toggle_play_pause().await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let moving = player.snapshot().await.unwrap();
    assert!(moving.position_secs > paused.position_secs);
}

#[tokio::test(start_paused = true)]
async fn repeat_all_wraps_to_first_track() {
    let player = start(
        store_with(&["a", "b"]),
        PlaybackSettings {
            crossfade_secs: 0.0,
            repeat: RepeatMode::All,
            ..PlaybackSettings::default()
        },
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = player.subscribe(move |s| {
        let _ = tx.send(s.clone());
    });
    let t = tracks()[..2].to_vec();
    player
        .play(t[1].clone(), Some(Queue::new(t.clone())))
        .await
        .unwrap();
    wait_state(&mut rx, current_is("b")).await;
    wait_state(&mut rx, current_is("a")).await;
}

#[tokio::test(start_paused = true)]
async fn settings_patch_and_shuffle_publish() {
    let player = start(store_with(&["a", "b", "c"]), crossfade(0.0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = player.subscribe(move |s| {
        let _ = tx.send(s.clone());
    });
    let t = tracks();
    player
        .play(t[0].clone(), Some(Queue::new(t.clone())))
        .await
        .unwrap();
    wait_state(&mut rx, current_is("a")).await;

    player
        .update_settings(SettingsPatch {
            shuffle: Some(true),
            tempo: Some(9.0),
            ..SettingsPatch::default()
        })
        .await
        .unwrap();
    wait_state(&mut rx, |s| s.shuffle).await;
    let settings = player.settings().await.unwrap();
    assert!(settings.shuffle);
    assert_eq!(settings.tempo, 4.0);

    player.set_repeat(RepeatMode::One).await.unwrap();
    wait_state(&mut rx, |s| s.repeat == RepeatMode::One).await;
}

#[tokio::test(start_paused = true)]
async fn persist_sink_receives_snapshots() {
    let saved: Arc<Mutex<Vec<PersistSnapshot>>> = Arc::default();
    let sink = Arc::clone(&saved);
    let player = spawn_player(
        store_with(&["a", "b", "c"]),
        PlayerOptions {
            settings: crossfade(0.0),
            backend: Backend::Null,
            persist: Some(Box::new(move |s| sink.lock().unwrap().push(s))),
            seed: Some(1),
            ..PlayerOptions::default()
        },
    );
    let t = tracks();
    player
        .play(t[1].clone(), Some(Queue::new(t.clone())))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    player.shutdown().await.unwrap();

    let saved = saved.lock().unwrap();
    let last = saved.last().expect("at least one snapshot");
    assert_eq!(last.player.current_track_id.as_ref().unwrap().as_str(), "b");
    assert_eq!(last.player.queue.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn commands_after_shutdown_report_closed() {
    let player = start(store_with(&[]), crossfade(0.0));
    player.shutdown().await.unwrap();
    assert!(matches!(player.play_next().await, Err(PlaybackError::Closed)));
    assert!(matches!(player.snapshot().await, Err(PlaybackError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn unsubscribed_listener_gets_nothing() {
    let player = start(store_with(&["a", "b", "c"]), crossfade(0.0));
    let hits = Arc::new(Mutex::new(0usize));
    let h = Arc::clone(&hits);
    let sub = player.subscribe(move |_| *h.lock().unwrap() += 1);
    sub.unsubscribe();

    let t = tracks();
    player
        .play(t[0].clone(), Some(Queue::new(t.clone())))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(*hits.lock().unwrap(), 0);
    assert!(player.snapshot().await.unwrap().is_playing);
}

#[tokio::test(start_paused = true)]
async fn slow_source_delays_start() {
    let store = store_with(&["a", "b", "c"]);
    store.set_delay("a", Duration::from_secs(2));
    let player = start(Arc::clone(&store), crossfade(0.0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = player.subscribe(move |s| {
        let _ = tx.send(s.clone());
    });

    let t = tracks();
    player
        .play(t[0].clone(), Some(Queue::new(t.clone())))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let waiting = player.snapshot().await.unwrap();
    assert!(waiting.current_track.is_none());
    assert!(!waiting.is_playing);

    wait_state(&mut rx, current_is("a")).await;
}

#[tokio::test(start_paused = true)]
async fn skipping_within_window_reuses_cache() {
    let store = store_with(&["a", "b", "c"]);
    let player = start(Arc::clone(&store), crossfade(0.0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = player.subscribe(move |s| {
        let _ = tx.send(s.clone());
    });

    let t = tracks();
    player
        .play(t[0].clone(), Some(Queue::new(t.clone())))
        .await
        .unwrap();
    wait_state(&mut rx, current_is("a")).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(store.load_count(), 3);

    player.play_next().await.unwrap();
    wait_state(&mut rx, current_is("b")).await;
    player.play_previous().await.unwrap();
    wait_state(&mut rx, current_is("a")).await;
    assert_eq!(store.load_count(), 3);
}
