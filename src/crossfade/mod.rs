//! 双通道交叉淡入
//!
//! 状态：`Idle → Preparing → Fading → Swapping → Idle`，准备和淡入阶段可以被取消。
//! 编排器独占两个通道：当前通道在放，空闲通道装载下一首并以 0 音量起播，
//! 就绪后沿曲线互换音量，走完后释放旧通道、翻转角色。

mod curve;

pub use curve::FadeCurve;

use std::time::Duration;
use tokio::time::Instant;

use crate::channel::{AudioHandle, Channel, ChannelPair, ChannelSignal, Slot};
use crate::domain::Track;
use crate::error::{ChannelError, PlaybackError, StoreError};
use crate::settings::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfadeState {
    Idle,
    Preparing,
    Fading,
    /// 只在一次 tick 内部短暂存在，外部观察不到
    Swapping,
}

/// 下一首音频的来源：已在缓存里，或者还在拉取
#[derive(Debug)]
pub enum PrepareSource {
    Ready(AudioHandle),
    Awaiting(u64),
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Loading { token: u64 },
    Loaded,
    Fading {
        started_at: Instant,
        duration: Duration,
    },
}

#[derive(Debug)]
pub struct CrossfadeSession {
    track: Track,
    from: Slot,
    to: Slot,
    started_at: Instant,
    crossfade_secs: f64,
    curve: FadeCurve,
    deadline: Instant,
    phase: Phase,
    paused_at: Option<Instant>,
    paused_total: Duration,
    last_ratio: f32,
}

impl CrossfadeSession {
    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn from_slot(&self) -> Slot {
        self.from
    }

    pub fn to_slot(&self) -> Slot {
        self.to
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn curve(&self) -> FadeCurve {
        self.curve
    }

    pub fn state(&self) -> CrossfadeState {
        match self.phase {
            Phase::Loading { .. } | Phase::Loaded => CrossfadeState::Preparing,
            Phase::Fading { .. } => CrossfadeState::Fading,
        }
    }

    /// 实际淡入时长；进入 Fading 之前为 `None`
    pub fn duration_secs(&self) -> Option<f64> {
        match self.phase {
            Phase::Fading { duration, .. } => Some(duration.as_secs_f64()),
            _ => None,
        }
    }

    pub fn awaiting_token(&self) -> Option<u64> {
        match self.phase {
            Phase::Loading { token } => Some(token),
            _ => None,
        }
    }

    pub fn progress(&self) -> f32 {
        self.last_ratio
    }

    fn ratio(&self, now: Instant) -> f32 {
        let Phase::Fading {
            started_at,
            duration,
        } = self.phase
        else {
            return 0.0;
        };
        let at = self.paused_at.unwrap_or(now);
        let elapsed = at
            .saturating_duration_since(started_at)
            .saturating_sub(self.paused_total);
        (elapsed.as_secs_f32() / duration.as_secs_f32().max(f32::EPSILON)).clamp(0.0, 1.0)
    }
}

#[derive(Debug)]
pub enum CrossfadeOutcome {
    /// 角色已翻转，`position_secs` 是新当前通道的实际位置
    Completed { track: Track, position_secs: f64 },
    /// 准备失败，会话已回到 Idle，调用方应直接切歌
    Failed { track: Track, error: PlaybackError },
}

#[derive(Debug, Default)]
pub struct TickReport {
    /// 当前通道发出的信号（淡入期间旧通道的结束信号已被消化）
    pub active: Vec<ChannelSignal>,
    pub outcome: Option<CrossfadeOutcome>,
}

pub struct CrossfadeOrchestrator<C> {
    pair: ChannelPair<C>,
    session: Option<CrossfadeSession>,
    volume: f32,
    rate: f64,
    paused: bool,
    min_fade_secs: f64,
    prepare_timeout: Duration,
}

impl<C: Channel> CrossfadeOrchestrator<C> {
    pub fn new(primary: C, secondary: C, cfg: &EngineConfig) -> Self {
        Self {
            pair: ChannelPair::new(primary, secondary),
            session: None,
            volume: 1.0,
            rate: 1.0,
            paused: false,
            min_fade_secs: cfg.min_fade_secs,
            prepare_timeout: cfg.prepare_timeout,
        }
    }

    pub fn state(&self) -> CrossfadeState {
        self.session
            .as_ref()
            .map(CrossfadeSession::state)
            .unwrap_or(CrossfadeState::Idle)
    }

    pub fn session(&self) -> Option<&CrossfadeSession> {
        self.session.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.session.is_none()
    }

    pub fn pair(&self) -> &ChannelPair<C> {
        &self.pair
    }

    pub fn active(&self) -> &C {
        self.pair.active()
    }

    pub fn active_mut(&mut self) -> &mut C {
        self.pair.active_mut()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// 直接把音频装进当前通道（非淡入的切歌）
    pub fn load_active(
        &mut self,
        handle: &AudioHandle,
        duration_hint: f64,
    ) -> Result<(), ChannelError> {
        let (volume, rate) = (self.volume, self.rate);
        let active = self.pair.active_mut();
        active.load(handle, duration_hint)?;
        active.set_volume(volume);
        active.set_playback_rate(rate);
        Ok(())
    }

    /// 开始一次交叉淡入；已有会话先取消。立即失败时返回 `Failed`
    pub fn begin(
        &mut self,
        track: Track,
        crossfade_secs: f64,
        curve: FadeCurve,
        source: PrepareSource,
        now: Instant,
    ) -> Option<CrossfadeOutcome> {
        self.cancel();

        let from = self.pair.active_slot();
        let to = self.pair.idle_slot();
        tracing::info!(
            track_id = %track.id,
            from = %from,
            to = %to,
            crossfade_secs,
            "交叉淡入：Idle -> Preparing"
        );
        self.session = Some(CrossfadeSession {
            track,
            from,
            to,
            started_at: now,
            crossfade_secs,
            curve,
            deadline: now + self.prepare_timeout,
            phase: Phase::Loaded,
            paused_at: self.paused.then_some(now),
            paused_total: Duration::ZERO,
            last_ratio: 0.0,
        });

        match source {
            PrepareSource::Ready(handle) => self.load_incoming(&handle),
            PrepareSource::Awaiting(token) => {
                if let Some(s) = &mut self.session {
                    s.phase = Phase::Loading { token };
                }
                None
            }
        }
    }

    /// 会话在等的拉取完成了
    pub fn on_fetched(
        &mut self,
        token: u64,
        result: Result<AudioHandle, StoreError>,
    ) -> Option<CrossfadeOutcome> {
        let session = self.session.as_ref()?;
        if session.awaiting_token() != Some(token) {
            return None;
        }
        match result {
            Ok(handle) => self.load_incoming(&handle),
            Err(source) => {
                let track_id = session.track.id.clone();
                self.fail(PlaybackError::SourceUnavailable { track_id, source })
            }
        }
    }

    fn load_incoming(&mut self, handle: &AudioHandle) -> Option<CrossfadeOutcome> {
        let (rate, paused) = (self.rate, self.paused);
        let session = self.session.as_mut()?;
        let idle = self.pair.idle_mut();
        if let Err(source) = idle.load(handle, session.track.duration_secs) {
            let track_id = session.track.id.clone();
            return self.fail(PlaybackError::Channel { track_id, source });
        }
        idle.set_volume(0.0);
        idle.set_playback_rate(rate);
        if !paused {
            idle.play();
        }
        session.phase = Phase::Loaded;
        tracing::debug!(track_id = %session.track.id, slot = %session.to, "下一首已装入空闲通道");
        None
    }

    fn fail(&mut self, error: PlaybackError) -> Option<CrossfadeOutcome> {
        let session = self.session.take()?;
        tracing::warn!(
            track_id = %session.track.id,
            err = %error,
            "交叉淡入准备失败，回到 Idle"
        );
        self.release_idle();
        let volume = self.volume;
        self.pair.active_mut().set_volume(volume);
        Some(CrossfadeOutcome::Failed {
            track: session.track,
            error,
        })
    }

    fn release_idle(&mut self) {
        let idle = self.pair.idle_mut();
        if idle.is_loaded() {
            idle.pause();
            idle.unload();
        }
    }

    /// 推进两个通道与淡入进度
    pub fn tick(&mut self, now: Instant, elapsed: Duration) -> TickReport {
        let (active, idle) = self.pair.both_mut();
        let mut active_signals = active.tick(elapsed);
        let idle_signals = idle.tick(elapsed);

        let Some(session) = self.session.as_mut() else {
            return TickReport {
                active: active_signals,
                outcome: None,
            };
        };

        let outgoing_ended = active_signals.contains(&ChannelSignal::Ended);
        // 很短的下一首可能在淡入期间就放完了
        let incoming_ended = idle_signals.contains(&ChannelSignal::Ended);
        let mut outcome = None;

        match session.phase {
            Phase::Loading { .. } => {
                if now >= session.deadline {
                    let error = timeout_error(session, self.prepare_timeout);
                    outcome = self.fail(error);
                }
            }
            Phase::Loaded => {
                if let Some(msg) = channel_error(&idle_signals) {
                    let track_id = session.track.id.clone();
                    outcome = self.fail(PlaybackError::Channel {
                        track_id,
                        source: ChannelError::Load(msg),
                    });
                } else if idle_signals.contains(&ChannelSignal::Ready) {
                    let remaining = self.pair.active().remaining(self.rate);
                    let effective = session
                        .crossfade_secs
                        .min(remaining.max(self.min_fade_secs));
                    session.phase = Phase::Fading {
                        started_at: now,
                        duration: Duration::from_secs_f64(effective.max(0.001)),
                    };
                    session.paused_total = Duration::ZERO;
                    if session.paused_at.is_some() {
                        session.paused_at = Some(now);
                    }
                    tracing::info!(
                        track_id = %session.track.id,
                        effective_secs = effective,
                        remaining,
                        "交叉淡入：Preparing -> Fading"
                    );
                    if outgoing_ended || incoming_ended {
                        outcome = self.swap_in();
                    } else {
                        self.apply_ramp(now);
                    }
                } else if outgoing_ended {
                    // 旧曲目已经放完，下一首虽未报告就绪但已经装好，直接接上
                    outcome = self.swap_in();
                } else if now >= session.deadline {
                    let error = timeout_error(session, self.prepare_timeout);
                    outcome = self.fail(error);
                }
            }
            Phase::Fading { .. } => {
                if let Some(msg) = channel_error(&idle_signals) {
                    let track_id = session.track.id.clone();
                    outcome = self.fail(PlaybackError::Channel {
                        track_id,
                        source: ChannelError::Load(msg),
                    });
                } else if outgoing_ended || incoming_ended || self.apply_ramp(now) {
                    outcome = self.swap_in();
                }
            }
        }

        if matches!(outcome, Some(CrossfadeOutcome::Completed { .. })) {
            // 换道之后 active 指向新曲目，旧通道的信号作废
            active_signals = if incoming_ended {
                vec![ChannelSignal::Ended]
            } else {
                Vec::new()
            };
        }
        TickReport {
            active: active_signals,
            outcome,
        }
    }

    /// 按当前进度设置两路音量，返回是否已走完
    fn apply_ramp(&mut self, now: Instant) -> bool {
        let volume = self.volume;
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let t = session.ratio(now);
        session.last_ratio = t;
        let curve = session.curve;
        let (active, idle) = self.pair.both_mut();
        active.set_volume(volume * curve.gain_out(t));
        idle.set_volume(volume * curve.gain_in(t));
        t >= 1.0
    }

    fn swap_in(&mut self) -> Option<CrossfadeOutcome> {
        let volume = self.volume;
        let paused = self.paused;
        let session = self.session.take()?;
        tracing::debug!(
            track_id = %session.track.id,
            state = ?CrossfadeState::Swapping,
            "交叉淡入：释放旧通道"
        );

        let (outgoing, incoming) = self.pair.both_mut();
        outgoing.pause();
        outgoing.unload();
        incoming.set_volume(volume);
        if !paused {
            incoming.play();
        }
        self.pair.swap();

        let position_secs = self.pair.active().position();
        tracing::info!(
            track_id = %session.track.id,
            slot = %self.pair.active_slot(),
            position_secs,
            "交叉淡入完成：Swapping -> Idle"
        );
        Some(CrossfadeOutcome::Completed {
            track: session.track,
            position_secs,
        })
    }

    /// 放弃会话：释放准备中的通道，旧通道恢复音量。返回被放弃的目标曲目
    pub fn cancel(&mut self) -> Option<Track> {
        let session = self.session.take()?;
        tracing::info!(
            track_id = %session.track.id,
            state = ?session.state(),
            "取消交叉淡入"
        );
        self.release_idle();
        let volume = self.volume;
        self.pair.active_mut().set_volume(volume);
        Some(session.track)
    }

    /// 暂停当前通道；淡入中则两路都停，进度冻结
    pub fn pause(&mut self, now: Instant) {
        self.paused = true;
        self.pair.active_mut().pause();
        if let Some(session) = &mut self.session {
            if session.paused_at.is_none() {
                session.paused_at = Some(now);
            }
            self.pair.idle_mut().pause();
        }
    }

    pub fn resume(&mut self, now: Instant) {
        self.paused = false;
        self.pair.active_mut().play();
        if let Some(session) = &mut self.session {
            if let Some(at) = session.paused_at.take() {
                session.paused_total = session
                    .paused_total
                    .saturating_add(now.saturating_duration_since(at));
            }
            let idle = self.pair.idle_mut();
            if idle.is_loaded() {
                idle.play();
            }
        }
    }

    /// 只改暂停标记，不碰通道（停止后重新装载时使用）
    pub fn set_paused_flag(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_volume(&mut self, volume: f32, now: Instant) {
        self.volume = volume;
        match self.state() {
            CrossfadeState::Fading => {
                self.apply_ramp(now);
            }
            _ => self.pair.active_mut().set_volume(volume),
        }
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
        let (active, idle) = self.pair.both_mut();
        active.set_playback_rate(rate);
        idle.set_playback_rate(rate);
    }
}

fn timeout_error(session: &CrossfadeSession, timeout: Duration) -> PlaybackError {
    PlaybackError::DecodeOrLoadTimeout {
        track_id: session.track.id.clone(),
        timeout_ms: timeout.as_millis() as u64,
    }
}

fn channel_error(signals: &[ChannelSignal]) -> Option<String> {
    signals.iter().find_map(|s| match s {
        ChannelSignal::Error(msg) => Some(msg.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::NullChannel;
    use crate::domain::TrackId;

    const TICK: Duration = Duration::from_millis(50);

    fn handle(id: &str) -> AudioHandle {
        AudioHandle::new(TrackId::from(id), vec![1u8; 8])
    }

    /// 当前通道装好 `dur` 秒的 a 并播放到 `pos`
    fn playing(dur: f64, pos: f64) -> CrossfadeOrchestrator<NullChannel> {
        let cfg = EngineConfig::default();
        let mut orch = CrossfadeOrchestrator::new(NullChannel::new(), NullChannel::new(), &cfg);
        orch.load_active(&handle("a"), dur).unwrap();
        orch.active_mut().play();
        orch.active_mut().seek(pos).unwrap();
        orch
    }

    fn step(orch: &mut CrossfadeOrchestrator<NullChannel>, now: &mut Instant) -> TickReport {
        *now += TICK;
        orch.tick(*now, TICK)
    }

    #[test]
    fn test_effective_duration_clamped_to_remaining() {
        let mut orch = playing(10.0, 8.0);
        let mut now = Instant::now();
        let b = Track::new("b", "B", 5.0);
        assert!(
            orch.begin(b, 5.0, FadeCurve::Linear, PrepareSource::Ready(handle("b")), now)
                .is_none()
        );
        assert_eq!(orch.state(), CrossfadeState::Preparing);

        step(&mut orch, &mut now);
        assert_eq!(orch.state(), CrossfadeState::Fading);
        let d = orch.session().and_then(CrossfadeSession::duration_secs).unwrap();
        assert!((d - 1.95).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn test_effective_duration_two_of_five() {
        let mut orch = playing(10.0, 8.0);
        // 2 秒剩余，淡入 5 秒：准备阶段没有时间流逝，Ready 与装载同一刻
        let now = Instant::now();
        let b = Track::new("b", "B", 5.0);
        orch.begin(b, 5.0, FadeCurve::Linear, PrepareSource::Ready(handle("b")), now);
        let report = orch.tick(now, Duration::ZERO);
        assert!(report.outcome.is_none());
        let d = orch.session().and_then(CrossfadeSession::duration_secs).unwrap();
        assert!((d - 2.0).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn test_min_fade_floor() {
        let mut orch = playing(10.0, 9.9);
        let now = Instant::now();
        orch.begin(
            Track::new("b", "B", 5.0),
            3.0,
            FadeCurve::Linear,
            PrepareSource::Ready(handle("b")),
            now,
        );
        orch.tick(now, Duration::ZERO);
        let d = orch.session().and_then(CrossfadeSession::duration_secs).unwrap();
        assert!((d - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ramp_and_swap() {
        let mut orch = playing(10.0, 7.0);
        let mut now = Instant::now();
        orch.begin(
            Track::new("b", "B", 5.0),
            2.0,
            FadeCurve::Linear,
            PrepareSource::Ready(handle("b")),
            now,
        );
        step(&mut orch, &mut now);
        assert_eq!(orch.pair().active_slot(), Slot::Primary);

        for _ in 0..20 {
            step(&mut orch, &mut now);
        }
        let out = orch.volume() * 0.5;
        assert!((orch.pair().get(Slot::Primary).volume() - out).abs() < 0.05);
        assert!((orch.pair().get(Slot::Secondary).volume() - out).abs() < 0.05);

        let mut done = None;
        for _ in 0..40 {
            if let Some(o) = step(&mut orch, &mut now).outcome {
                done = Some(o);
                break;
            }
        }
        let Some(CrossfadeOutcome::Completed { track, position_secs }) = done else {
            panic!("crossfade did not complete");
        };
        assert_eq!(track.id.as_str(), "b");
        assert!((position_secs - 2.0).abs() < 0.15, "position {position_secs}");
        assert_eq!(orch.pair().active_slot(), Slot::Secondary);
        assert_eq!(orch.state(), CrossfadeState::Idle);
        assert!(!orch.pair().get(Slot::Primary).is_loaded());
        assert_eq!(orch.active().volume(), orch.volume());
    }

    #[test]
    fn test_cancel_while_fading_restores_outgoing() {
        let mut orch = playing(10.0, 7.0);
        let mut now = Instant::now();
        orch.begin(
            Track::new("b", "B", 5.0),
            2.0,
            FadeCurve::EqualPower,
            PrepareSource::Ready(handle("b")),
            now,
        );
        for _ in 0..10 {
            step(&mut orch, &mut now);
        }
        assert_eq!(orch.state(), CrossfadeState::Fading);

        let cancelled = orch.cancel().unwrap();
        assert_eq!(cancelled.id.as_str(), "b");
        assert_eq!(orch.state(), CrossfadeState::Idle);
        assert_eq!(orch.pair().active_slot(), Slot::Primary);
        assert!(!orch.pair().idle().is_loaded());
        assert_eq!(orch.active().volume(), 1.0);
        assert!(orch.active().is_playing());
    }

    #[test]
    fn test_prepare_timeout_fails() {
        let mut orch = playing(30.0, 10.0);
        let mut now = Instant::now();
        orch.begin(
            Track::new("b", "B", 5.0),
            3.0,
            FadeCurve::Linear,
            PrepareSource::Awaiting(7),
            now,
        );
        assert_eq!(orch.session().and_then(CrossfadeSession::awaiting_token), Some(7));

        let mut failed = None;
        for _ in 0..300 {
            if let Some(o) = step(&mut orch, &mut now).outcome {
                failed = Some(o);
                break;
            }
        }
        let Some(CrossfadeOutcome::Failed { error, .. }) = failed else {
            panic!("expected timeout");
        };
        assert!(matches!(error, PlaybackError::DecodeOrLoadTimeout { .. }));
        assert_eq!(orch.state(), CrossfadeState::Idle);
    }

    #[test]
    fn test_fetch_failure_fails_session() {
        let mut orch = playing(30.0, 10.0);
        let now = Instant::now();
        orch.begin(
            Track::new("b", "B", 5.0),
            3.0,
            FadeCurve::Linear,
            PrepareSource::Awaiting(3),
            now,
        );
        assert!(orch.on_fetched(99, Ok(handle("b"))).is_none());
        let out = orch.on_fetched(
            3,
            Err(StoreError::NotFound {
                track_id: TrackId::from("b"),
            }),
        );
        assert!(matches!(
            out,
            Some(CrossfadeOutcome::Failed {
                error: PlaybackError::SourceUnavailable { .. },
                ..
            })
        ));
        assert!(orch.is_idle());
    }

    #[test]
    fn test_undecodable_incoming_fails_immediately() {
        let mut orch = playing(30.0, 10.0);
        let out = orch.begin(
            Track::new("b", "B", 5.0),
            3.0,
            FadeCurve::Linear,
            PrepareSource::Ready(AudioHandle::new(TrackId::from("b"), Vec::<u8>::new())),
            Instant::now(),
        );
        assert!(matches!(
            out,
            Some(CrossfadeOutcome::Failed {
                error: PlaybackError::Channel { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_pause_freezes_ramp() {
        let mut orch = playing(10.0, 6.0);
        let mut now = Instant::now();
        orch.begin(
            Track::new("b", "B", 5.0),
            2.0,
            FadeCurve::Linear,
            PrepareSource::Ready(handle("b")),
            now,
        );
        for _ in 0..11 {
            step(&mut orch, &mut now);
        }
        let before = orch.session().map(CrossfadeSession::progress).unwrap();
        orch.pause(now);
        for _ in 0..40 {
            let r = step(&mut orch, &mut now);
            assert!(r.outcome.is_none());
        }
        let frozen = orch.session().map(CrossfadeSession::progress).unwrap();
        assert!((frozen - before).abs() < 1e-6);
        assert!(!orch.pair().get(Slot::Secondary).is_playing());

        orch.resume(now);
        step(&mut orch, &mut now);
        let after = orch.session().map(CrossfadeSession::progress).unwrap();
        assert!(after > frozen);
        assert!(after < frozen + 0.05);
    }

    #[test]
    fn test_outgoing_end_forces_swap() {
        let mut orch = playing(1.0, 0.9);
        let mut now = Instant::now();
        orch.begin(
            Track::new("b", "B", 5.0),
            3.0,
            FadeCurve::Linear,
            PrepareSource::Ready(handle("b")),
            now,
        );
        step(&mut orch, &mut now);
        let r = step(&mut orch, &mut now);
        let r = if r.outcome.is_some() { r } else { step(&mut orch, &mut now) };
        assert!(matches!(r.outcome, Some(CrossfadeOutcome::Completed { .. })));
        assert!(!r.active.contains(&ChannelSignal::Ended));
        assert_eq!(orch.pair().active_slot(), Slot::Secondary);
    }

    #[test]
    fn test_incoming_end_during_fade_is_reported_after_swap() {
        let mut orch = playing(10.0, 7.0);
        let mut now = Instant::now();
        orch.begin(
            Track::new("b", "B", 0.3),
            2.0,
            FadeCurve::Linear,
            PrepareSource::Ready(handle("b")),
            now,
        );
        let mut done = None;
        for _ in 0..20 {
            let r = step(&mut orch, &mut now);
            if r.outcome.is_some() {
                done = Some(r);
                break;
            }
        }
        let r = done.expect("swap after incoming ended");
        assert!(matches!(r.outcome, Some(CrossfadeOutcome::Completed { .. })));
        assert_eq!(r.active, vec![ChannelSignal::Ended]);
        assert_eq!(orch.active().loaded_track().map(TrackId::as_str), Some("b"));
        assert!(!orch.active().is_playing());
    }
}
