use std::env;
use std::time::Duration;

/// 调度引擎参数；默认值可以通过 `SEGUE_*` 环境变量覆盖
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 当前曲目之前保留的缓存数量
    pub prev_songs: usize,
    /// 当前曲目之后保留的缓存数量
    pub next_songs: usize,
    /// 缓存条目未被访问多久后过期
    pub cache_expiry: Duration,
    /// 交叉淡入准备阶段等待音频的上限
    pub prepare_timeout: Duration,
    /// 通道轮询间隔（位置更新频率）
    pub tick_interval: Duration,
    /// 非无缝模式下曲目之间的固定停顿
    pub gap_pause: Duration,
    /// 最近播放历史的容量
    pub history_limit: usize,
    /// 预加载阈值下限（秒）
    pub preload_floor_secs: f64,
    /// 预加载相对交叉淡入的提前量（秒）
    pub preload_lead_secs: f64,
    /// 淡入淡出的最短时长（秒）
    pub min_fade_secs: f64,
    /// HTTP 超时（秒）
    pub http_timeout_secs: u64,
    /// HTTP 连接超时（秒）
    pub http_connect_timeout_secs: u64,
    /// 下载重试次数
    pub download_retries: u32,
    /// 重试退避初始时间（毫秒）
    pub download_retry_backoff_ms: u64,
    /// 重试退避最大时间（毫秒）
    pub download_retry_backoff_max_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prev_songs: env_or("SEGUE_CACHE_PREV_SONGS", 2),
            next_songs: env_or("SEGUE_CACHE_NEXT_SONGS", 3),
            cache_expiry: Duration::from_secs(env_or("SEGUE_CACHE_EXPIRY_SECS", 300)),
            prepare_timeout: Duration::from_millis(env_or("SEGUE_PREPARE_TIMEOUT_MS", 10_000)),
            tick_interval: Duration::from_millis(env_or::<u64>("SEGUE_TICK_MS", 50).max(5)),
            gap_pause: Duration::from_millis(env_or("SEGUE_GAP_PAUSE_MS", 500)),
            history_limit: env_or("SEGUE_HISTORY_LIMIT", 20),
            preload_floor_secs: 5.0,
            preload_lead_secs: 2.0,
            min_fade_secs: 0.5,
            http_timeout_secs: env_or("SEGUE_HTTP_TIMEOUT_SECS", 30),
            http_connect_timeout_secs: env_or("SEGUE_HTTP_CONNECT_TIMEOUT_SECS", 10),
            download_retries: env_or("SEGUE_DOWNLOAD_RETRIES", 2),
            download_retry_backoff_ms: env_or("SEGUE_DOWNLOAD_RETRY_BACKOFF_MS", 250),
            download_retry_backoff_max_ms: env_or("SEGUE_DOWNLOAD_RETRY_BACKOFF_MAX_MS", 2_000),
        }
    }
}

impl EngineConfig {
    /// 剩余时间低于该值时开始预加载下一首
    pub fn preload_threshold_secs(&self, crossfade_secs: f64) -> f64 {
        (crossfade_secs + self.preload_lead_secs).max(self.preload_floor_secs)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preload_threshold() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.preload_threshold_secs(2.0), 5.0);
        assert_eq!(cfg.preload_threshold_secs(8.0), 10.0);
        assert_eq!(cfg.preload_threshold_secs(0.0), 5.0);
    }
}
