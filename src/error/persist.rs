//! 播放器状态持久化相关错误

/// 快照持久化错误类型
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误
    #[error("JSON 序列化失败: {0}")]
    Serde(#[from] serde_json::Error),

    /// 版本不兼容
    #[error("版本不兼容: 预期 {expected}, 找到 {found}")]
    IncompatibleVersion { expected: u32, found: u32 },
}

impl PersistError {
    /// 判断是否是可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, PersistError::Io(_))
    }
}
