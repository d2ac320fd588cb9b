//! 音频通道相关错误

/// 通道装载/控制错误
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// 解码音频失败
    #[error("解码音频失败({title}): {source}")]
    Decode {
        title: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// 音频输出流创建失败
    #[error("创建音频输出流失败: {0}")]
    Output(String),

    /// Seek 失败
    #[error("Seek 失败: {0}")]
    Seek(String),

    /// 通道尚未装载任何音频
    #[error("通道未装载音频")]
    NotLoaded,

    /// 装载被拒绝（模拟通道的故障注入也走这里）
    #[error("装载音频失败: {0}")]
    Load(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::Seek("out of range".to_owned());
        assert_eq!(err.to_string(), "Seek 失败: out of range");
        assert_eq!(ChannelError::NotLoaded.to_string(), "通道未装载音频");
    }

    #[test]
    fn test_decode_error_keeps_source() {
        use std::error::Error;
        let err = ChannelError::Decode {
            title: "Song".to_owned(),
            source: Box::new(std::io::Error::other("bad header")),
        };
        assert!(err.to_string().contains("Song"));
        assert!(err.source().is_some());
    }
}
