//! 音频来源（存储 / 本地文件 / 网络）相关错误

use std::path::PathBuf;

use crate::domain::TrackId;

/// 读取或写入音频字节时的错误
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 存储中没有该曲目，且曲目本身没有其他来源
    #[error("没有可用的音频: {track_id}")]
    NotFound { track_id: TrackId },

    /// 读取本地文件失败
    #[error("读取音频文件失败({path}): {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP 请求失败
    #[error("下载音频失败({url}): {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP 状态码错误
    #[error("下载音频失败({url}): HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// 存储目录 IO 错误
    #[error("存储操作失败: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// 判断是否值得重试
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Http { .. } => true,
            StoreError::HttpStatus { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            _ => false,
        }
    }
}
