use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::TrackStore;
use crate::domain::TrackId;
use crate::error::StoreError;

/// In-memory store for tests and the demo backend. Supports per-track latency
/// and failure injection.
#[derive(Debug, Default)]
pub struct MemoryTrackStore {
    blobs: Mutex<HashMap<TrackId, Vec<u8>>>,
    delays: Mutex<HashMap<TrackId, Duration>>,
    failing: Mutex<HashSet<TrackId>>,
    loads: AtomicUsize,
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_audio(self, id: impl Into<TrackId>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(id, bytes);
        self
    }

    pub fn insert(&self, id: impl Into<TrackId>, bytes: impl Into<Vec<u8>>) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.insert(id.into(), bytes.into());
        }
    }

    pub fn set_delay(&self, id: impl Into<TrackId>, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.insert(id.into(), delay);
        }
    }

    pub fn set_failing(&self, id: impl Into<TrackId>) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(id.into());
        }
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.blobs.lock().is_ok_and(|b| b.contains_key(id))
    }

    /// Number of `load_audio` calls served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TrackStore for MemoryTrackStore {
    async fn load_audio(&self, id: &TrackId) -> Result<Option<Vec<u8>>, StoreError> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let delay = self.delays.lock().ok().and_then(|d| d.get(id).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().is_ok_and(|f| f.contains(id)) {
            return Err(StoreError::Io(std::io::Error::other(format!(
                "injected failure for {id}"
            ))));
        }
        Ok(self.blobs.lock().ok().and_then(|b| b.get(id).cloned()))
    }

    async fn save_audio(&self, id: &TrackId, bytes: &[u8]) -> Result<(), StoreError> {
        self.insert(id.clone(), bytes.to_vec());
        Ok(())
    }

    async fn remove_audio(&self, id: &TrackId) -> Result<(), StoreError> {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.remove(id);
        }
        Ok(())
    }
}
