use std::collections::VecDeque;

use crate::domain::TrackId;

pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// 最近播放记录，最新的在前；满了丢最旧的
#[derive(Debug, Clone)]
pub struct PlayHistory {
    ids: VecDeque<TrackId>,
    limit: usize,
}

impl Default for PlayHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl PlayHistory {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            ids: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, id: TrackId) {
        if self.ids.len() >= self.limit {
            self.ids.pop_back();
        }
        self.ids.push_front(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackId> {
        self.ids.iter()
    }

    /// 最近的 `n` 条
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &TrackId> {
        self.ids.iter().take(n)
    }

    pub fn occurrences(&self, id: &TrackId) -> usize {
        self.ids.iter().filter(|x| *x == id).count()
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.ids.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_most_recent_first() {
        let mut h = PlayHistory::new(3);
        for id in ["a", "b", "c", "d"] {
            h.push(TrackId::from(id));
        }
        let got: Vec<&str> = h.iter().map(TrackId::as_str).collect();
        assert_eq!(got, vec!["d", "c", "b"]);
        let recent: Vec<&str> = h.recent(2).map(TrackId::as_str).collect();
        assert_eq!(recent, vec!["d", "c"]);
    }

    #[test]
    fn test_occurrences() {
        let mut h = PlayHistory::default();
        h.push(TrackId::from("a"));
        h.push(TrackId::from("b"));
        h.push(TrackId::from("a"));
        assert_eq!(h.occurrences(&TrackId::from("a")), 2);
        assert_eq!(h.occurrences(&TrackId::from("z")), 0);
    }
}
