use tokio::sync::oneshot;

use crate::channel::AudioHandle;
use crate::domain::{PlayerState, Queue, RepeatMode, Track, TrackId};
use crate::error::{PlaybackError, StoreError};
use crate::settings::{PlaybackSettings, SettingsPatch};

#[derive(Debug)]
pub enum PlayerCommand {
    Play {
        track: Track,
        queue: Option<Queue>,
    },
    TogglePlayPause,
    Next,
    Previous,
    Seek {
        secs: f64,
        reply: oneshot::Sender<Result<(), PlaybackError>>,
    },
    SetVolume(f32),
    SetShuffle(bool),
    SetRepeat(RepeatMode),
    UpdateSettings(SettingsPatch),
    Stop,
    Restore {
        queue: Queue,
        current: Option<Track>,
    },
    Snapshot(oneshot::Sender<PlayerState>),
    Settings(oneshot::Sender<PlaybackSettings>),
    /// 写出最后一份快照后退出
    Shutdown(oneshot::Sender<()>),
}

/// 后台拉取任务交回的结果
#[derive(Debug)]
pub(super) struct FetchDone {
    pub token: u64,
    pub track_id: TrackId,
    pub result: Result<AudioHandle, StoreError>,
}
