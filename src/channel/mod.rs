//! 音频通道抽象
//!
//! 调度核心只通过 [`Channel`] 操作音频：装载、播放/暂停、seek、音量和倍速，
//! 以及在每次 `tick` 时收集就绪 / 结束 / 出错信号。真实输出由 [`RodioChannel`]
//! 提供，[`NullChannel`] 用模拟时钟代替声卡（`--no-audio` 与测试）。

mod device;
mod null;
mod pair;

pub use self::device::{RodioChannel, RodioOutput};
pub use self::null::NullChannel;
pub use self::pair::{ChannelPair, Slot};

use std::sync::Arc;
use std::time::Duration;

use crate::domain::TrackId;
use crate::error::ChannelError;

/// 已载入内存的音频字节；克隆只增加引用计数
#[derive(Clone)]
pub struct AudioHandle {
    track_id: TrackId,
    bytes: Arc<[u8]>,
}

impl AudioHandle {
    pub fn new(track_id: TrackId, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            track_id,
            bytes: bytes.into(),
        }
    }

    pub fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for AudioHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioHandle")
            .field("track_id", &self.track_id)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// 装载完成，可以开始淡入
    Ready,
    /// 自然播放到结尾
    Ended,
    Error(String),
}

pub trait Channel {
    /// 装载音频并停在 0 位置（暂停状态）
    fn load(&mut self, handle: &AudioHandle, duration_hint: f64) -> Result<(), ChannelError>;
    /// 停止并释放当前音频
    fn unload(&mut self);
    fn loaded_track(&self) -> Option<&TrackId>;
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, secs: f64) -> Result<(), ChannelError>;
    fn set_volume(&mut self, volume: f32);
    fn volume(&self) -> f32;
    fn set_playback_rate(&mut self, rate: f64);
    fn position(&self) -> f64;
    fn duration(&self) -> f64;
    fn is_playing(&self) -> bool;
    /// 推进一次轮询，返回这段时间内产生的信号
    fn tick(&mut self, elapsed: Duration) -> Vec<ChannelSignal>;

    fn is_loaded(&self) -> bool {
        self.loaded_track().is_some()
    }

    /// 剩余可播放时长（按倍速换算成墙钟秒）
    fn remaining(&self, rate: f64) -> f64 {
        let rate = if rate > 0.0 { rate } else { 1.0 };
        ((self.duration() - self.position()) / rate).max(0.0)
    }
}
