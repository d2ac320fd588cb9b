//! 曲目存储接口（外部协作方）以及把曲目解析成可播放字节的加载器

mod download;
mod fs;
mod loader;
mod memory;

use async_trait::async_trait;

use crate::domain::TrackId;
use crate::error::StoreError;

pub use download::{FetchConfig, fetch_bytes};
pub use fs::FsTrackStore;
pub use loader::SourceLoader;
pub use memory::MemoryTrackStore;

/// 不透明的异步 blob 存储
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// `Ok(None)` 表示存储里没有该曲目的音频
    async fn load_audio(&self, id: &TrackId) -> Result<Option<Vec<u8>>, StoreError>;

    async fn save_audio(&self, id: &TrackId, bytes: &[u8]) -> Result<(), StoreError>;

    /// 删除不存在的条目不算错误
    async fn remove_audio(&self, id: &TrackId) -> Result<(), StoreError>;
}
