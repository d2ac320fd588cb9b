//! 当前播放位置附近的音频缓存
//!
//! 保留窗口：当前曲目前 `prev_songs` 首、后 `next_songs` 首，随机模式下再加上
//! 预测的下一首；正在请求播放或准备淡入的曲目被钉住，不受窗口影响。
//! 拉取本身不在这里做：缓存只发出带令牌的 [`FetchRequest`]，由播放 actor
//! 执行后通过 [`SongCacheManager::complete_fetch`] 交回结果。

use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

use crate::channel::AudioHandle;
use crate::domain::{Queue, Track, TrackId};
use crate::error::StoreError;
use crate::settings::EngineConfig;

struct CacheEntry {
    handle: AudioHandle,
    loaded_at: Instant,
}

/// 一次需要执行的拉取；`token` 用来把结果对回请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub token: u64,
    pub track: Track,
}

#[derive(Debug)]
pub enum CacheLookup {
    Ready(AudioHandle),
    /// 已有同曲目的拉取在路上
    Pending(u64),
    Fetch(FetchRequest),
}

#[derive(Debug)]
pub enum FetchOutcome {
    Cached(AudioHandle),
    /// 拉取期间曲目已离开保留集合，结果不入缓存
    Discarded(AudioHandle),
    Failed(StoreError),
    /// 令牌已经过期（缓存被清空过）
    Stale,
}

pub struct SongCacheManager {
    entries: HashMap<TrackId, CacheEntry>,
    in_flight: HashMap<TrackId, u64>,
    keep: HashSet<TrackId>,
    pinned: HashSet<TrackId>,
    prev_songs: usize,
    next_songs: usize,
    expiry: Duration,
    next_token: u64,
}

impl SongCacheManager {
    pub fn new(cfg: &EngineConfig) -> Self {
        Self {
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            keep: HashSet::new(),
            pinned: HashSet::new(),
            prev_songs: cfg.prev_songs,
            next_songs: cfg.next_songs,
            expiry: cfg.cache_expiry,
            next_token: 1,
        }
    }

    fn alloc_token(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1).max(1);
        token
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn cached_ids(&self) -> HashSet<TrackId> {
        self.entries.keys().cloned().collect()
    }

    pub fn is_in_flight(&self, id: &TrackId) -> bool {
        self.in_flight.contains_key(id)
    }

    pub fn pin(&mut self, id: &TrackId) {
        self.pinned.insert(id.clone());
    }

    pub fn unpin(&mut self, id: &TrackId) {
        self.pinned.remove(id);
    }

    fn retained(&self, id: &TrackId) -> bool {
        self.keep.contains(id) || self.pinned.contains(id)
    }

    /// 取出已缓存的句柄并刷新访问时间
    pub fn get(&mut self, id: &TrackId, now: Instant) -> Option<AudioHandle> {
        let entry = self.entries.get_mut(id)?;
        entry.loaded_at = now;
        Some(entry.handle.clone())
    }

    /// 幂等：已缓存直接返回，已在拉取中返回同一令牌，否则发出新的拉取
    pub fn ensure_cached(&mut self, track: &Track, now: Instant) -> CacheLookup {
        self.sweep_expired(now);

        if let Some(handle) = self.get(&track.id, now) {
            return CacheLookup::Ready(handle);
        }
        if let Some(token) = self.in_flight.get(&track.id) {
            return CacheLookup::Pending(*token);
        }

        let token = self.alloc_token();
        self.in_flight.insert(track.id.clone(), token);
        tracing::debug!(track_id = %track.id, token, "发起缓存拉取");
        CacheLookup::Fetch(FetchRequest {
            token,
            track: track.clone(),
        })
    }

    pub fn complete_fetch(
        &mut self,
        token: u64,
        id: &TrackId,
        result: Result<AudioHandle, StoreError>,
        now: Instant,
    ) -> FetchOutcome {
        if self.in_flight.get(id) != Some(&token) {
            tracing::debug!(track_id = %id, token, "忽略过期的拉取结果");
            return FetchOutcome::Stale;
        }
        self.in_flight.remove(id);

        match result {
            Ok(handle) if self.retained(id) => {
                tracing::debug!(track_id = %id, token, bytes = handle.len(), "缓存就绪");
                self.entries.insert(
                    id.clone(),
                    CacheEntry {
                        handle: handle.clone(),
                        loaded_at: now,
                    },
                );
                FetchOutcome::Cached(handle)
            }
            Ok(handle) => {
                tracing::debug!(track_id = %id, token, "曲目已离开窗口，丢弃拉取结果");
                FetchOutcome::Discarded(handle)
            }
            Err(e) => {
                tracing::warn!(track_id = %id, token, err = %e, "缓存拉取失败");
                FetchOutcome::Failed(e)
            }
        }
    }

    /// 按当前位置重算保留集合：淘汰窗口外条目，返回缺失条目的拉取请求
    pub fn reconcile_window(
        &mut self,
        current: &TrackId,
        queue: &Queue,
        shuffle_hint: Option<&Track>,
        now: Instant,
    ) -> Vec<FetchRequest> {
        self.sweep_expired(now);

        let mut wanted: Vec<&Track> = Vec::new();
        if let Some(i) = queue.index_of(current) {
            let start = i.saturating_sub(self.prev_songs);
            let end = (i + self.next_songs).min(queue.len().saturating_sub(1));
            wanted.extend(queue.tracks()[start..=end].iter());
        }
        if let Some(hint) = shuffle_hint
            && !wanted.iter().any(|t| t.id == hint.id)
        {
            wanted.push(hint);
        }

        self.keep = wanted.iter().map(|t| t.id.clone()).collect();

        let evict: Vec<TrackId> = self
            .entries
            .keys()
            .filter(|id| !self.retained(id))
            .cloned()
            .collect();
        for id in evict {
            self.entries.remove(&id);
            tracing::debug!(track_id = %id, "窗口外，淘汰缓存");
        }

        let mut requests = Vec::new();
        for track in wanted {
            if self.entries.contains_key(&track.id) || self.in_flight.contains_key(&track.id) {
                continue;
            }
            let token = self.alloc_token();
            self.in_flight.insert(track.id.clone(), token);
            requests.push(FetchRequest {
                token,
                track: track.clone(),
            });
        }
        if !requests.is_empty() {
            tracing::debug!(
                current = %current,
                fetch = requests.len(),
                cached = self.entries.len(),
                "缓存窗口调整"
            );
        }
        requests
    }

    /// 淘汰超过 `expiry` 未被访问的条目（被钉住的除外）
    pub fn sweep_expired(&mut self, now: Instant) {
        let expiry = self.expiry;
        let pinned = &self.pinned;
        self.entries.retain(|id, entry| {
            let alive = pinned.contains(id) || now.duration_since(entry.loaded_at) <= expiry;
            if !alive {
                tracing::debug!(track_id = %id, "缓存过期");
            }
            alive
        });
    }

    /// 丢弃全部条目与在途令牌，在途结果回来后会被当作过期
    pub fn clear(&mut self) {
        self.entries.clear();
        self.in_flight.clear();
        self.keep.clear();
        self.pinned.clear();
    }
}
