use std::sync::Arc;
use std::time::Duration;

use super::TrackStore;
use super::download::{FetchConfig, fetch_bytes};
use crate::channel::AudioHandle;
use crate::domain::{SourceRef, Track};
use crate::error::StoreError;
use crate::settings::EngineConfig;

/// 把曲目解析为可播放的字节：优先读存储，其次本地文件 / 网络
#[derive(Clone)]
pub struct SourceLoader {
    store: Arc<dyn TrackStore>,
    http: reqwest::Client,
    fetch: FetchConfig,
}

impl SourceLoader {
    pub fn new(store: Arc<dyn TrackStore>, cfg: &EngineConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .connect_timeout(Duration::from_secs(cfg.http_connect_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!(err = %e, "初始化 HTTP 客户端失败");
                reqwest::Client::new()
            });
        Self {
            store,
            http,
            fetch: FetchConfig::from(cfg),
        }
    }

    pub async fn load(&self, track: &Track) -> Result<AudioHandle, StoreError> {
        match self.store.load_audio(&track.id).await {
            Ok(Some(bytes)) => {
                tracing::debug!(track_id = %track.id, bytes = bytes.len(), "命中存储");
                return Ok(AudioHandle::new(track.id.clone(), bytes));
            }
            Ok(None) => {}
            Err(e) => {
                // 存储坏了不应该挡住文件 / 网络来源
                tracing::warn!(track_id = %track.id, err = %e, "读取存储失败，尝试原始来源");
            }
        }

        let bytes = match &track.source {
            SourceRef::Stored => {
                return Err(StoreError::NotFound {
                    track_id: track.id.clone(),
                });
            }
            SourceRef::File { path } => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| StoreError::ReadFile {
                        path: path.clone(),
                        source,
                    })?
            }
            SourceRef::Url { url } => {
                tracing::info!(track_id = %track.id, url = %url, "下载音频");
                let bytes = fetch_bytes(&self.http, url, self.fetch).await?;
                if let Err(e) = self.store.save_audio(&track.id, &bytes).await {
                    tracing::warn!(track_id = %track.id, err = %e, "写回存储失败");
                }
                bytes
            }
        };

        Ok(AudioHandle::new(track.id.clone(), bytes))
    }
}
