use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{PlayerState, Queue, Track, TrackId};
use crate::error::PersistError;
use crate::settings::PlaybackSettings;

pub const SNAPSHOT_VERSION: u32 = 1;
const STATE_FILE: &str = "player_state.json";

/// 可序列化的播放器状态（只存队列与当前曲目，不存缓存与会话）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLite {
    pub current_track_id: Option<TrackId>,
    pub queue: Vec<Track>,
    pub position_secs: f64,
    pub was_playing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistSnapshot {
    pub version: u32,
    pub player: PlayerLite,
    pub settings: PlaybackSettings,
    pub saved_at_epoch_ms: i64,
}

impl PersistSnapshot {
    pub fn capture(state: &PlayerState, settings: &PlaybackSettings) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            player: PlayerLite {
                current_track_id: state.current_track.as_ref().map(|t| t.id.clone()),
                queue: state.queue.tracks().to_vec(),
                position_secs: state.position_secs,
                was_playing: state.is_playing,
            },
            settings: settings.clone(),
            saved_at_epoch_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn queue(&self) -> Queue {
        Queue::new(self.player.queue.clone())
    }

    pub fn current_track(&self) -> Option<&Track> {
        let id = self.player.current_track_id.as_ref()?;
        self.player.queue.iter().find(|t| &t.id == id)
    }
}

pub fn load_snapshot(data_dir: &Path) -> Result<PersistSnapshot, PersistError> {
    let bytes = fs::read(state_path(data_dir))?;
    let mut snapshot: PersistSnapshot = serde_json::from_slice(&bytes)?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(PersistError::IncompatibleVersion {
            expected: SNAPSHOT_VERSION,
            found: snapshot.version,
        });
    }

    snapshot.settings = snapshot.settings.sanitized();
    Ok(snapshot)
}

pub fn save_snapshot(data_dir: &Path, snapshot: &PersistSnapshot) -> Result<(), PersistError> {
    fs::create_dir_all(data_dir)?;

    let path = state_path(data_dir);
    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(snapshot)?;
    fs::write(&tmp_path, bytes)?;

    // 原子性写入
    if let Err(e) = fs::rename(&tmp_path, &path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(PersistError::Io(e));
    }
    Ok(())
}

pub async fn save_snapshot_async(
    data_dir: &Path,
    snapshot: PersistSnapshot,
) -> Result<(), PersistError> {
    let dir = data_dir.to_path_buf();
    tokio::task::spawn_blocking(move || save_snapshot(&dir, &snapshot))
        .await
        .map_err(|e| PersistError::Io(std::io::Error::other(e)))?
}

fn state_path(data_dir: &Path) -> PathBuf {
    data_dir.join(STATE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RepeatMode;

    fn state() -> PlayerState {
        let queue = Queue::new(vec![Track::new("a", "A", 3.0), Track::new("b", "B", 4.0)]);
        PlayerState {
            current_track: queue.get(1).cloned(),
            queue,
            is_playing: true,
            position_secs: 1.5,
            duration_secs: 4.0,
            shuffle: false,
            repeat: RepeatMode::All,
        }
    }

    #[test]
    fn test_capture_keeps_queue_and_current() {
        let snap = PersistSnapshot::capture(&state(), &PlaybackSettings::default());
        assert_eq!(snap.version, SNAPSHOT_VERSION);
        assert_eq!(snap.player.queue.len(), 2);
        assert_eq!(snap.current_track().map(|t| t.id.as_str()), Some("b"));
        assert_eq!(snap.queue().len(), 2);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut snap = PersistSnapshot::capture(&state(), &PlaybackSettings::default());
        snap.version = 99;
        save_snapshot(dir.path(), &snap).unwrap();
        let err = load_snapshot(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            PersistError::IncompatibleVersion {
                expected: SNAPSHOT_VERSION,
                found: 99
            }
        ));
    }

    #[test]
    fn test_missing_file_is_io() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_snapshot(dir.path()), Err(PersistError::Io(_))));
    }
}
