//! 随机选曲
//!
//! 智能随机按播放历史降权：历史里出现得越多权重越低，但不低于 [`WEIGHT_FLOOR`]。

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;

use super::history::PlayHistory;
use crate::domain::{Queue, Track, TrackId};

pub const BASE_WEIGHT: u32 = 10;
pub const REPEAT_PENALTY: u32 = 3;
pub const WEIGHT_FLOOR: u32 = 1;
/// 所有曲目都在历史里时，仅排除最近这么多首
pub const RECENT_EXCLUSION: usize = 3;

/// 均匀随机，排除当前曲目
pub fn pick_uniform<R: Rng + ?Sized>(
    rng: &mut R,
    queue: &Queue,
    current: Option<&TrackId>,
) -> Option<Track> {
    let candidates: Vec<&Track> = queue
        .tracks()
        .iter()
        .filter(|t| Some(&t.id) != current)
        .collect();
    candidates.choose(rng).map(|t| (*t).clone())
}

pub fn smart_weight(occurrences: usize) -> u32 {
    let penalty = REPEAT_PENALTY.saturating_mul(occurrences.min(u32::MAX as usize) as u32);
    BASE_WEIGHT.saturating_sub(penalty).max(WEIGHT_FLOOR)
}

/// 分三档取候选：不在历史里的；不在最近几首里的；除当前外全部
pub fn smart_candidates<'a>(
    queue: &'a Queue,
    current: Option<&TrackId>,
    history: &PlayHistory,
) -> Vec<&'a Track> {
    let others = || queue.tracks().iter().filter(move |t| Some(&t.id) != current);

    let fresh: Vec<&Track> = others().filter(|t| !history.contains(&t.id)).collect();
    if !fresh.is_empty() {
        return fresh;
    }

    let recent_n = RECENT_EXCLUSION.min(history.len());
    let recent: Vec<&TrackId> = history.recent(recent_n).collect();
    let not_recent: Vec<&Track> = others().filter(|t| !recent.contains(&&t.id)).collect();
    if !not_recent.is_empty() {
        return not_recent;
    }

    others().collect()
}

pub fn pick_smart<R: Rng + ?Sized>(
    rng: &mut R,
    queue: &Queue,
    current: Option<&TrackId>,
    history: &PlayHistory,
) -> Option<Track> {
    let candidates = smart_candidates(queue, current, history);
    if candidates.is_empty() {
        return None;
    }
    let weights: Vec<u32> = candidates
        .iter()
        .map(|t| smart_weight(history.occurrences(&t.id)))
        .collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => Some(candidates[dist.sample(rng)].clone()),
        Err(e) => {
            tracing::warn!(err = %e, "权重无效，退回均匀随机");
            candidates.choose(rng).map(|t| (*t).clone())
        }
    }
}
