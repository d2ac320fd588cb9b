use crate::cache::FetchRequest;
use crate::domain::{PlayerState, TrackId};
use crate::error::PlaybackError;
use crate::persist::PersistSnapshot;

/// 单曲失败的通知；播放不会因此中断
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackNotice {
    pub track_id: TrackId,
    pub kind: NoticeKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    SourceUnavailable,
    LoadTimeout,
    Channel,
}

impl PlaybackNotice {
    pub fn from_error(error: &PlaybackError) -> Option<Self> {
        let kind = match error {
            PlaybackError::SourceUnavailable { .. } => NoticeKind::SourceUnavailable,
            PlaybackError::DecodeOrLoadTimeout { .. } => NoticeKind::LoadTimeout,
            PlaybackError::Channel { .. } => NoticeKind::Channel,
            PlaybackError::NoCurrentTrack | PlaybackError::Closed => return None,
        };
        Some(Self {
            track_id: error.track_id()?.clone(),
            kind,
            message: error.to_string(),
        })
    }
}

#[derive(Debug)]
pub enum Effect {
    Fetch(FetchRequest),
    Publish(Box<PlayerState>),
    Persist(Box<PersistSnapshot>),
    Notice(PlaybackNotice),
}

/// 控制器产出的副作用，由 actor 统一执行
#[derive(Debug, Default)]
pub struct Effects {
    actions: Vec<Effect>,
}

impl Effects {
    pub fn fetch(&mut self, req: FetchRequest) {
        self.actions.push(Effect::Fetch(req));
    }

    pub fn fetch_all(&mut self, reqs: impl IntoIterator<Item = FetchRequest>) {
        self.actions.extend(reqs.into_iter().map(Effect::Fetch));
    }

    pub fn publish(&mut self, state: PlayerState) {
        self.actions.push(Effect::Publish(Box::new(state)));
    }

    pub fn persist(&mut self, snapshot: PersistSnapshot) {
        self.actions.push(Effect::Persist(Box::new(snapshot)));
    }

    pub fn notice(&mut self, error: &PlaybackError) {
        if let Some(n) = PlaybackNotice::from_error(error) {
            self.actions.push(Effect::Notice(n));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Effect> {
        self.actions.iter()
    }

    pub fn drain(&mut self) -> std::vec::Drain<'_, Effect> {
        self.actions.drain(..)
    }

    pub fn published(&self) -> impl Iterator<Item = &PlayerState> {
        self.actions.iter().filter_map(|e| match e {
            Effect::Publish(s) => Some(s.as_ref()),
            _ => None,
        })
    }

    pub fn notices(&self) -> impl Iterator<Item = &PlaybackNotice> {
        self.actions.iter().filter_map(|e| match e {
            Effect::Notice(n) => Some(n),
            _ => None,
        })
    }

    pub fn fetches(&self) -> impl Iterator<Item = &FetchRequest> {
        self.actions.iter().filter_map(|e| match e {
            Effect::Fetch(r) => Some(r),
            _ => None,
        })
    }
}

impl IntoIterator for Effects {
    type Item = Effect;
    type IntoIter = std::vec::IntoIter<Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}
