//! 应用层错误（命令行入口使用）

use super::{PersistError, PlaybackError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("存储错误: {0}")]
    Store(#[from] StoreError),

    #[error("播放错误: {0}")]
    Playback(#[from] PlaybackError),

    #[error("持久化错误: {0}")]
    Persist(#[from] PersistError),

    /// 播放列表清单解析失败
    #[error("解析播放列表失败({path}): {source}")]
    Manifest {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}")]
    Other(String),
}
