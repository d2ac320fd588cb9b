use futures_util::StreamExt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::StoreError;
use crate::settings::EngineConfig;

/// 网络拉取的重试参数
#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    pub retries: u32,
    pub backoff_ms: u64,
    pub backoff_max_ms: u64,
}

impl From<&EngineConfig> for FetchConfig {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            retries: cfg.download_retries,
            backoff_ms: cfg.download_retry_backoff_ms,
            backoff_max_ms: cfg.download_retry_backoff_max_ms,
        }
    }
}

/// 下载整段音频到内存；可重试的失败按指数退避重试
pub async fn fetch_bytes(
    http: &reqwest::Client,
    url: &str,
    cfg: FetchConfig,
) -> Result<Vec<u8>, StoreError> {
    let mut attempt = 0u32;
    loop {
        match fetch_once(http, url).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) if attempt < cfg.retries && e.is_retryable() => {
                tracing::debug!(url, attempt, err = %e, "下载失败，准备重试");
                sleep_backoff(attempt, cfg.backoff_ms, cfg.backoff_max_ms).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_once(http: &reqwest::Client, url: &str) -> Result<Vec<u8>, StoreError> {
    let resp = http.get(url).send().await.map_err(|source| StoreError::Http {
        url: url.to_owned(),
        source,
    })?;

    let status = resp.status();
    if !status.is_success() {
        return Err(StoreError::HttpStatus {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    let mut out = Vec::with_capacity(resp.content_length().unwrap_or(0) as usize);
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| StoreError::Http {
            url: url.to_owned(),
            source,
        })?;
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}

async fn sleep_backoff(attempt: u32, base_ms: u64, max_ms: u64) {
    let exp = base_ms.saturating_mul(2u64.saturating_pow(attempt.min(6)));
    let mut ms = exp.min(max_ms);

    // 0..=250ms 的抖动，取时钟余数即可
    let jitter = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
        % 251;
    ms = ms.saturating_add(jitter).min(max_ms);

    tokio::time::sleep(Duration::from_millis(ms)).await;
}
