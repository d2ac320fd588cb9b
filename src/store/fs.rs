use async_trait::async_trait;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::TrackStore;
use crate::domain::TrackId;
use crate::error::StoreError;

/// 基于目录的曲目存储：每首曲目一个 `<id>.bin`
#[derive(Debug, Clone)]
pub struct FsTrackStore {
    dir: PathBuf,
}

impl FsTrackStore {
    pub fn new(data_dir: &Path) -> Result<Self, StoreError> {
        let dir = data_dir.join("audio_store");
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// 同步检查是否已存有该曲目
    pub fn contains(&self, id: &TrackId) -> bool {
        self.blob_path(id).is_file()
    }

    fn blob_path(&self, id: &TrackId) -> PathBuf {
        self.dir.join(format!("{}.bin", file_stem(id)))
    }
}

#[async_trait]
impl TrackStore for FsTrackStore {
    async fn load_audio(&self, id: &TrackId) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.blob_path(id)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn save_audio(&self, id: &TrackId, bytes: &[u8]) -> Result<(), StoreError> {
        let dir = self.dir.clone();
        let path = self.blob_path(id);
        let bytes = bytes.to_vec();
        // 先写临时文件再原子替换，读者永远看不到半截文件
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;
        Ok(())
    }

    async fn remove_audio(&self, id: &TrackId) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.blob_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// 把任意 id 编码成安全的文件名
fn file_stem(id: &TrackId) -> String {
    let mut out = String::with_capacity(id.as_str().len());
    for b in id.as_str().bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{b:02x}");
        }
    }
    out
}
