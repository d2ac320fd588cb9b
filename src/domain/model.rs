use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::ids::{QueueId, SourceRef, TrackId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: String,
    pub duration_secs: f64,
    #[serde(default)]
    pub source: SourceRef,
}

impl Track {
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            duration_secs,
            source: SourceRef::Stored,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = source;
        self
    }

    pub fn display_title(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artist)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

/// The queue in play. Cloning is cheap and keeps the identity.
#[derive(Debug, Clone)]
pub struct Queue {
    id: QueueId,
    tracks: Arc<[Track]>,
}

impl Queue {
    /// Builds a queue; later duplicates of an id are dropped.
    pub fn new(tracks: Vec<Track>) -> Self {
        let mut seen = HashSet::with_capacity(tracks.len());
        let before = tracks.len();
        let tracks: Vec<Track> = tracks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();
        if tracks.len() != before {
            tracing::warn!(
                dropped = before - tracks.len(),
                "queue contained duplicate track ids"
            );
        }
        Self {
            id: QueueId::next(),
            tracks: tracks.into(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn index_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn find(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| &t.id == id)
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Published snapshot of what the listener hears.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub current_track: Option<Track>,
    pub queue: Queue,
    pub is_playing: bool,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            current_track: None,
            queue: Queue::empty(),
            is_playing: false,
            position_secs: 0.0,
            duration_secs: 0.0,
            shuffle: false,
            repeat: RepeatMode::Off,
        }
    }
}
