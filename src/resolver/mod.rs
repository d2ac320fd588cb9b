//! 下一首 / 上一首的选择
//!
//! [`NextTrackResolver`] 是纯决策：输入队列、当前曲目、设置和历史，输出曲目。
//! 下一首的结果会被记住，直到调用方显式 [`NextTrackResolver::invalidate`]；
//! 交叉淡入和手动切歌读的是同一份记忆，所以两条路径永远选中同一首。

mod history;
mod shuffle;

pub use history::{DEFAULT_HISTORY_LIMIT, PlayHistory};
pub use shuffle::{BASE_WEIGHT, RECENT_EXCLUSION, REPEAT_PENALTY, WEIGHT_FLOOR, smart_weight};

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::domain::{Queue, QueueId, RepeatMode, Track, TrackId};
use crate::settings::PlaybackSettings;

#[derive(Debug, Clone, PartialEq)]
struct MemoKey {
    current: Option<TrackId>,
    queue: QueueId,
    shuffle: bool,
    smart_shuffle: bool,
    repeat: RepeatMode,
}

#[derive(Debug, Clone)]
struct Memo {
    key: MemoKey,
    pick: Option<Track>,
}

pub struct NextTrackResolver {
    memo: Option<Memo>,
    rng: StdRng,
}

impl Default for NextTrackResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NextTrackResolver {
    pub fn new() -> Self {
        Self {
            memo: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// 固定种子，随机结果可复现
    pub fn with_seed(seed: u64) -> Self {
        Self {
            memo: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn invalidate(&mut self) {
        if self.memo.take().is_some() {
            tracing::trace!("下一首预测已失效");
        }
    }

    /// 已记住的下一首（不触发计算）
    pub fn peek(&self) -> Option<&Track> {
        self.memo.as_ref().and_then(|m| m.pick.as_ref())
    }

    pub fn is_memoized(&self) -> bool {
        self.memo.is_some()
    }

    pub fn resolve_next(
        &mut self,
        current: Option<&TrackId>,
        queue: &Queue,
        settings: &PlaybackSettings,
        history: &PlayHistory,
    ) -> Option<Track> {
        let key = MemoKey {
            current: current.cloned(),
            queue: queue.id(),
            shuffle: settings.shuffle,
            smart_shuffle: settings.smart_shuffle,
            repeat: settings.repeat,
        };
        if let Some(memo) = &self.memo {
            if memo.key == key {
                return memo.pick.clone();
            }
            tracing::debug!("预测条件已变化但未显式失效，重新计算");
        }

        let pick = self.resolve_after(current, queue, settings, history);
        tracing::debug!(
            current = ?current.map(TrackId::as_str),
            next = ?pick.as_ref().map(|t| t.id.as_str()),
            shuffle = settings.shuffle,
            smart = settings.smart_shuffle,
            "计算下一首"
        );
        self.memo = Some(Memo {
            key,
            pick: pick.clone(),
        });
        pick
    }

    /// 不读写记忆，直接计算 `from` 之后的一首（失败跳过时使用）
    pub fn resolve_after(
        &mut self,
        from: Option<&TrackId>,
        queue: &Queue,
        settings: &PlaybackSettings,
        history: &PlayHistory,
    ) -> Option<Track> {
        if queue.is_empty() {
            return None;
        }
        if settings.shuffle {
            return if settings.smart_shuffle {
                shuffle::pick_smart(&mut self.rng, queue, from, history)
            } else {
                shuffle::pick_uniform(&mut self.rng, queue, from)
            };
        }
        sequential_next(from, queue, settings.repeat)
    }

    /// 上一首；随机模式回到历史里下一条仍在队列中的曲目。
    ///
    /// `walked` 是已经往回走过的历史条数，连续按上一首时逐条后退。
    /// 返回曲目以及走到它之后的新 `walked`（顺序模式下为 0）。
    pub fn resolve_previous(
        &self,
        current: Option<&TrackId>,
        queue: &Queue,
        settings: &PlaybackSettings,
        history: &PlayHistory,
        walked: usize,
    ) -> Option<(Track, usize)> {
        if settings.shuffle {
            let back = history
                .iter()
                .enumerate()
                .skip(walked)
                .filter(|(_, id)| Some(*id) != current)
                .find_map(|(i, id)| queue.find(id).map(|t| (t.clone(), i + 1)));
            if back.is_some() {
                return back;
            }
        }
        sequential_previous(current, queue, settings.repeat).map(|t| (t, 0))
    }
}

/// 当前曲目不在队列里时视为“还没开始”，下一首是第一首
fn sequential_next(current: Option<&TrackId>, queue: &Queue, repeat: RepeatMode) -> Option<Track> {
    let next = match current.and_then(|id| queue.index_of(id)) {
        None => 0,
        Some(i) if i + 1 < queue.len() => i + 1,
        Some(_) if repeat == RepeatMode::All => 0,
        Some(_) => return None,
    };
    let track = queue.get(next)?;
    if Some(&track.id) == current {
        return None;
    }
    Some(track.clone())
}

fn sequential_previous(
    current: Option<&TrackId>,
    queue: &Queue,
    repeat: RepeatMode,
) -> Option<Track> {
    let i = current.and_then(|id| queue.index_of(id))?;
    let prev = match i {
        0 if repeat == RepeatMode::All => queue.len() - 1,
        0 => return None,
        i => i - 1,
    };
    let track = queue.get(prev)?;
    if Some(&track.id) == current {
        return None;
    }
    Some(track.clone())
}
