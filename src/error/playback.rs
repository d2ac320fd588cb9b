//! 播放调度相关错误

use super::{ChannelError, StoreError};
use crate::domain::TrackId;

/// 播放调度错误类型
///
/// 单曲失败（`SourceUnavailable` / `DecodeOrLoadTimeout` / `Channel`）只会作为事件上报，
/// 不会从调度循环里抛出；`NoCurrentTrack` 属于调用方违约。
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// 该曲目没有可播放的字节
    #[error("曲目不可用({track_id}): {source}")]
    SourceUnavailable {
        track_id: TrackId,
        #[source]
        source: StoreError,
    },

    /// 交叉淡入准备超时
    #[error("加载超时({track_id}): {timeout_ms}ms")]
    DecodeOrLoadTimeout { track_id: TrackId, timeout_ms: u64 },

    /// 通道拒绝了音频
    #[error("通道错误({track_id}): {source}")]
    Channel {
        track_id: TrackId,
        #[source]
        source: ChannelError,
    },

    /// 没有当前曲目时调用了需要当前曲目的操作
    #[error("没有正在播放的曲目")]
    NoCurrentTrack,

    /// 播放器已关闭
    #[error("播放器已关闭")]
    Closed,
}

impl PlaybackError {
    pub fn track_id(&self) -> Option<&TrackId> {
        match self {
            PlaybackError::SourceUnavailable { track_id, .. }
            | PlaybackError::DecodeOrLoadTimeout { track_id, .. }
            | PlaybackError::Channel { track_id, .. } => Some(track_id),
            PlaybackError::NoCurrentTrack | PlaybackError::Closed => None,
        }
    }
}
