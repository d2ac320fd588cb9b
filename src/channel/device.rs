use rodio::mixer::Mixer;
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use super::{AudioHandle, Channel, ChannelSignal};
use crate::domain::TrackId;
use crate::error::ChannelError;

/// 默认输出设备；必须活得比所有从它创建的通道更久
pub struct RodioOutput {
    stream: OutputStream,
}

impl RodioOutput {
    pub fn open_default() -> Result<Self, ChannelError> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| ChannelError::Output(e.to_string()))?;
        Ok(Self { stream })
    }

    pub fn channel(&self) -> RodioChannel {
        RodioChannel::new(self.stream.mixer().clone())
    }
}

struct Loaded {
    track_id: TrackId,
    handle: AudioHandle,
    sink: Sink,
    duration: f64,
    ended: bool,
}

/// 一个 `Sink` 对应一个槽位；换歌时整个 Sink 重建
pub struct RodioChannel {
    mixer: Mixer,
    loaded: Option<Loaded>,
    volume: f32,
    rate: f64,
    ready_pending: bool,
}

impl RodioChannel {
    fn new(mixer: Mixer) -> Self {
        Self {
            mixer,
            loaded: None,
            volume: 1.0,
            rate: 1.0,
            ready_pending: false,
        }
    }
}

fn decode(handle: &AudioHandle) -> Result<Decoder<Cursor<Arc<[u8]>>>, ChannelError> {
    Decoder::new(Cursor::new(handle.shared())).map_err(|e| ChannelError::Decode {
        title: handle.track_id().to_string(),
        source: Box::new(e),
    })
}

impl Channel for RodioChannel {
    fn load(&mut self, handle: &AudioHandle, duration_hint: f64) -> Result<(), ChannelError> {
        self.unload();

        let decoder = decode(handle)?;
        let duration = decoder
            .total_duration()
            .map(|d| d.as_secs_f64())
            .filter(|d| *d > 0.0)
            .unwrap_or(duration_hint);

        let sink = Sink::connect_new(&self.mixer);
        sink.pause();
        sink.set_volume(self.volume);
        sink.set_speed(self.rate as f32);
        sink.append(decoder);

        tracing::debug!(track_id = %handle.track_id(), duration, "通道已装载");
        self.loaded = Some(Loaded {
            track_id: handle.track_id().clone(),
            handle: handle.clone(),
            sink,
            duration,
            ended: false,
        });
        self.ready_pending = true;
        Ok(())
    }

    fn unload(&mut self) {
        if let Some(cur) = self.loaded.take() {
            cur.sink.stop();
        }
        self.ready_pending = false;
    }

    fn loaded_track(&self) -> Option<&TrackId> {
        self.loaded.as_ref().map(|l| &l.track_id)
    }

    fn play(&mut self) {
        if let Some(cur) = &self.loaded
            && !cur.ended
        {
            cur.sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(cur) = &self.loaded {
            cur.sink.pause();
        }
    }

    fn seek(&mut self, secs: f64) -> Result<(), ChannelError> {
        let Some(cur) = &mut self.loaded else {
            return Err(ChannelError::NotLoaded);
        };
        let target = Duration::from_secs_f64(secs.clamp(0.0, cur.duration.max(0.0)));
        // 放完后 Sink 已空，重新解码一份再 seek
        if cur.sink.empty() {
            cur.sink.append(decode(&cur.handle)?);
        }
        cur.sink
            .try_seek(target)
            .map_err(|e| ChannelError::Seek(e.to_string()))?;
        cur.ended = false;
        Ok(())
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(cur) = &self.loaded {
            cur.sink.set_volume(volume);
        }
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
        if let Some(cur) = &self.loaded {
            cur.sink.set_speed(rate as f32);
        }
    }

    fn position(&self) -> f64 {
        self.loaded
            .as_ref()
            .map(|l| l.sink.get_pos().as_secs_f64().min(l.duration))
            .unwrap_or(0.0)
    }

    fn duration(&self) -> f64 {
        self.loaded.as_ref().map(|l| l.duration).unwrap_or(0.0)
    }

    fn is_playing(&self) -> bool {
        self.loaded
            .as_ref()
            .is_some_and(|l| !l.ended && !l.sink.is_paused())
    }

    fn tick(&mut self, _elapsed: Duration) -> Vec<ChannelSignal> {
        let mut out = Vec::new();
        let Some(cur) = &mut self.loaded else {
            return out;
        };
        if self.ready_pending {
            self.ready_pending = false;
            out.push(ChannelSignal::Ready);
        }
        if !cur.ended && cur.sink.empty() {
            cur.ended = true;
            tracing::debug!(track_id = %cur.track_id, "通道播放结束");
            out.push(ChannelSignal::Ended);
        }
        out
    }
}
