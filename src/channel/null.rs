use std::time::Duration;

use super::{AudioHandle, Channel, ChannelSignal};
use crate::domain::TrackId;
use crate::error::ChannelError;

/// 不出声的通道：位置按 `elapsed × rate` 推进，装载后的第一次 tick 报告就绪。
///
/// 空字节视为无法解码，用来模拟坏文件。
#[derive(Debug)]
pub struct NullChannel {
    track_id: Option<TrackId>,
    position: f64,
    duration: f64,
    volume: f32,
    rate: f64,
    playing: bool,
    ready_pending: bool,
    ended: bool,
}

impl Default for NullChannel {
    fn default() -> Self {
        Self {
            track_id: None,
            position: 0.0,
            duration: 0.0,
            volume: 1.0,
            rate: 1.0,
            playing: false,
            ready_pending: false,
            ended: false,
        }
    }
}

impl NullChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Channel for NullChannel {
    fn load(&mut self, handle: &AudioHandle, duration_hint: f64) -> Result<(), ChannelError> {
        self.unload();
        if handle.is_empty() {
            return Err(ChannelError::Decode {
                title: handle.track_id().to_string(),
                source: "empty audio payload".into(),
            });
        }
        self.track_id = Some(handle.track_id().clone());
        self.duration = duration_hint.max(0.0);
        self.ready_pending = true;
        Ok(())
    }

    fn unload(&mut self) {
        self.track_id = None;
        self.position = 0.0;
        self.duration = 0.0;
        self.playing = false;
        self.ready_pending = false;
        self.ended = false;
    }

    fn loaded_track(&self) -> Option<&TrackId> {
        self.track_id.as_ref()
    }

    fn play(&mut self) {
        if self.track_id.is_some() && !self.ended {
            self.playing = true;
        }
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn seek(&mut self, secs: f64) -> Result<(), ChannelError> {
        if self.track_id.is_none() {
            return Err(ChannelError::NotLoaded);
        }
        self.position = secs.clamp(0.0, self.duration);
        self.ended = false;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn tick(&mut self, elapsed: Duration) -> Vec<ChannelSignal> {
        let mut out = Vec::new();
        if self.track_id.is_none() {
            return out;
        }
        if self.ready_pending {
            self.ready_pending = false;
            out.push(ChannelSignal::Ready);
        }
        if self.playing {
            self.position = (self.position + elapsed.as_secs_f64() * self.rate).min(self.duration);
            if self.position >= self.duration {
                self.playing = false;
                self.ended = true;
                out.push(ChannelSignal::Ended);
            }
        }
        out
    }
}
