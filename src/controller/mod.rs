//! 播放控制器
//!
//! 同步状态机：所有输入（命令、通道轮询、拉取结果）都带着 `now` 进来，
//! 所有输出都写进 [`Effects`] 由 actor 执行。这样时间相关的行为可以在
//! 不启动计时器的情况下逐 tick 测试。

mod effects;

pub use effects::{Effect, Effects, NoticeKind, PlaybackNotice};

use std::time::Duration;
use tokio::time::Instant;

use crate::cache::{CacheLookup, FetchOutcome, SongCacheManager};
use crate::channel::{AudioHandle, Channel, ChannelSignal};
use crate::crossfade::{CrossfadeOrchestrator, CrossfadeOutcome, CrossfadeState, PrepareSource};
use crate::domain::{PlayerState, Queue, RepeatMode, Track, TrackId};
use crate::error::{ChannelError, PlaybackError, StoreError};
use crate::persist::PersistSnapshot;
use crate::resolver::{NextTrackResolver, PlayHistory};
use crate::settings::store::clamp_volume;
use crate::settings::{EngineConfig, PlaybackSettings, SettingsPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stopped,
    Playing,
    Paused,
}

/// 切歌失败时的处理方式：手动点播保留当前曲目，自动推进则继续往后跳
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayCause {
    Manual,
    Advance,
    /// 上一首；`walked` 为进入后在历史里已回退的条数
    Back { walked: usize },
}

#[derive(Debug)]
struct PendingPlay {
    token: u64,
    track: Track,
    cause: PlayCause,
    attempts: usize,
}

/// 每首歌的触发器只触发一次，seek 回去才重新布防
#[derive(Debug, Default)]
struct TriggerLatches {
    track_id: Option<TrackId>,
    preloaded: bool,
    crossfade: bool,
}

impl TriggerLatches {
    fn for_track(id: &TrackId) -> Self {
        Self {
            track_id: Some(id.clone()),
            preloaded: false,
            crossfade: false,
        }
    }
}

pub struct PlaybackController<C> {
    cfg: EngineConfig,
    settings: PlaybackSettings,
    orchestrator: CrossfadeOrchestrator<C>,
    cache: SongCacheManager,
    resolver: NextTrackResolver,
    history: PlayHistory,
    queue: Queue,
    current: Option<Track>,
    transport: Transport,
    pending: Option<PendingPlay>,
    gap_until: Option<Instant>,
    latches: TriggerLatches,
    /// 连续“上一首”在历史里回退到的位置，其余切歌清零
    walked_back: usize,
    persist_deferred: bool,
}

impl<C: Channel> PlaybackController<C> {
    pub fn new(
        primary: C,
        secondary: C,
        cfg: EngineConfig,
        settings: PlaybackSettings,
        resolver: NextTrackResolver,
    ) -> Self {
        let settings = settings.sanitized();
        let mut orchestrator = CrossfadeOrchestrator::new(primary, secondary, &cfg);
        orchestrator.set_volume(settings.volume, Instant::now());
        orchestrator.set_playback_rate(settings.tempo);
        Self {
            cache: SongCacheManager::new(&cfg),
            history: PlayHistory::new(cfg.history_limit),
            cfg,
            settings,
            orchestrator,
            resolver,
            queue: Queue::empty(),
            current: None,
            transport: Transport::Stopped,
            pending: None,
            gap_until: None,
            latches: TriggerLatches::default(),
            walked_back: 0,
            persist_deferred: false,
        }
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn cache(&self) -> &SongCacheManager {
        &self.cache
    }

    pub fn orchestrator(&self) -> &CrossfadeOrchestrator<C> {
        &self.orchestrator
    }

    pub fn crossfade_state(&self) -> CrossfadeState {
        self.orchestrator.state()
    }

    pub fn history(&self) -> &PlayHistory {
        &self.history
    }

    /// 正在等待音频的点播目标
    pub fn pending_track(&self) -> Option<&Track> {
        self.pending.as_ref().map(|p| &p.track)
    }

    pub fn state(&self) -> PlayerState {
        let active = self.orchestrator.active();
        let loaded = self
            .current
            .as_ref()
            .is_some_and(|t| active.loaded_track() == Some(&t.id));
        let (position_secs, duration_secs) = match &self.current {
            Some(_) if loaded && active.duration() > 0.0 => (active.position(), active.duration()),
            Some(t) if loaded => (active.position(), t.duration_secs),
            Some(t) => (0.0, t.duration_secs),
            None => (0.0, 0.0),
        };
        PlayerState {
            current_track: self.current.clone(),
            queue: self.queue.clone(),
            is_playing: self.transport == Transport::Playing,
            position_secs,
            duration_secs,
            shuffle: self.settings.shuffle,
            repeat: self.settings.repeat,
        }
    }

    /// 恢复上次的队列与曲目，不开始播放
    pub fn restore(&mut self, queue: Queue, current: Option<Track>, fx: &mut Effects) {
        self.abort_transition();
        self.queue = queue;
        self.current = current;
        self.transport = Transport::Stopped;
        self.resolver.invalidate();
        tracing::info!(
            queue_len = self.queue.len(),
            current = ?self.current.as_ref().map(|t| t.id.as_str()),
            "恢复播放队列"
        );
        fx.publish(self.state());
    }

    /// 不管淡入状态，立即产出一份快照（退出前使用）
    pub fn persist_now(&self, fx: &mut Effects) {
        fx.persist(PersistSnapshot::capture(&self.state(), &self.settings));
    }

    // ---- 命令 ----

    pub fn play(&mut self, track: Track, queue: Option<Queue>, now: Instant, fx: &mut Effects) {
        if let Some(q) = queue {
            self.replace_queue(q);
        }
        self.abort_transition();
        tracing::info!(track_id = %track.id, title = %track.title, "点播");
        self.request_play(track, PlayCause::Manual, 0, now, fx);
    }

    pub fn toggle_play_pause(&mut self, now: Instant, fx: &mut Effects) {
        if self.current.is_none() {
            return;
        }
        match self.transport {
            Transport::Playing => {
                self.orchestrator.pause(now);
                self.transport = Transport::Paused;
                tracing::info!("暂停");
                self.changed(fx);
            }
            Transport::Paused => {
                self.orchestrator.resume(now);
                self.transport = Transport::Playing;
                if self.gap_until.is_some() {
                    // 曲间停顿被暂停打断，恢复后重新等一整段
                    self.gap_until = Some(now + self.cfg.gap_pause);
                }
                tracing::info!("继续播放");
                self.changed(fx);
            }
            Transport::Stopped => {
                self.abort_transition();
                self.restart_current(now, fx);
            }
        }
    }

    pub fn play_next(&mut self, now: Instant, fx: &mut Effects) {
        if self.current.is_none() && self.queue.is_empty() {
            return;
        }
        if self.settings.repeat == RepeatMode::One && self.current.is_some() {
            self.abort_transition();
            self.restart_current(now, fx);
            return;
        }

        let next = self.resolve_next();
        self.abort_transition();
        match next {
            Some(track) => {
                tracing::info!(track_id = %track.id, "下一首");
                self.request_play(track, PlayCause::Advance, 0, now, fx);
            }
            None if self.loops_single_track() => self.restart_current(now, fx),
            None => self.halt(fx),
        }
    }

    pub fn play_previous(&mut self, now: Instant, fx: &mut Effects) {
        let Some(current) = self.current.clone() else {
            return;
        };
        self.abort_transition();
        if self.settings.repeat == RepeatMode::One {
            self.restart_current(now, fx);
            return;
        }
        let prev = self.resolver.resolve_previous(
            Some(&current.id),
            &self.queue,
            &self.settings,
            &self.history,
            self.walked_back,
        );
        match prev {
            Some((track, walked)) => {
                tracing::info!(track_id = %track.id, walked, "上一首");
                self.request_play(track, PlayCause::Back { walked }, 0, now, fx);
            }
            None => self.restart_current(now, fx),
        }
    }

    pub fn seek_to(&mut self, secs: f64, fx: &mut Effects) -> Result<(), PlaybackError> {
        let Some(current) = self.current.clone() else {
            return Err(PlaybackError::NoCurrentTrack);
        };
        if let Some(t) = self.orchestrator.cancel() {
            self.cache.unpin(&t.id);
        }
        if self
            .pending
            .as_ref()
            .is_some_and(|p| p.cause == PlayCause::Advance)
            && let Some(p) = self.pending.take()
        {
            self.cache.unpin(&p.track.id);
        }
        self.gap_until = None;

        let active = self.orchestrator.active_mut();
        if active.loaded_track() != Some(&current.id) {
            return Err(PlaybackError::Channel {
                track_id: current.id,
                source: ChannelError::NotLoaded,
            });
        }
        let target = if secs.is_finite() {
            secs.clamp(0.0, active.duration())
        } else {
            0.0
        };
        active
            .seek(target)
            .map_err(|source| PlaybackError::Channel {
                track_id: current.id.clone(),
                source,
            })?;
        if self.transport == Transport::Playing {
            active.play();
        }
        tracing::debug!(track_id = %current.id, target, "seek");

        let remaining = self.remaining_secs();
        let cf = self.settings.crossfade_secs;
        if remaining > self.cfg.preload_threshold_secs(cf) {
            self.latches.preloaded = false;
        }
        if remaining > cf {
            self.latches.crossfade = false;
        }
        self.changed(fx);
        Ok(())
    }

    pub fn set_volume(&mut self, volume: f32, now: Instant, fx: &mut Effects) {
        let volume = clamp_volume(volume);
        if volume == self.settings.volume {
            return;
        }
        self.settings.volume = volume;
        self.orchestrator.set_volume(volume, now);
        self.persist(fx);
    }

    pub fn set_shuffle(&mut self, shuffle: bool, now: Instant, fx: &mut Effects) {
        if self.settings.shuffle == shuffle {
            return;
        }
        self.settings.shuffle = shuffle;
        self.on_mode_changed(now, fx);
    }

    pub fn set_repeat(&mut self, repeat: RepeatMode, now: Instant, fx: &mut Effects) {
        if self.settings.repeat == repeat {
            return;
        }
        self.settings.repeat = repeat;
        self.on_mode_changed(now, fx);
    }

    pub fn update_settings(&mut self, patch: &SettingsPatch, now: Instant, fx: &mut Effects) {
        let change = self.settings.apply(patch);
        if !change.any {
            return;
        }
        tracing::info!(?change, "设置已更新");
        if change.volume {
            self.orchestrator.set_volume(self.settings.volume, now);
        }
        if change.tempo {
            self.orchestrator.set_playback_rate(self.settings.tempo);
        }
        if change.next_track_mode {
            self.on_mode_changed(now, fx);
        } else {
            self.persist(fx);
        }
    }

    pub fn stop(&mut self, fx: &mut Effects) {
        self.abort_transition();
        let active = self.orchestrator.active_mut();
        active.pause();
        if active.is_loaded()
            && let Err(e) = active.seek(0.0)
        {
            tracing::warn!(err = %e, "停止时回到开头失败");
        }
        self.orchestrator.set_paused_flag(false);
        self.transport = Transport::Stopped;
        tracing::info!("停止");
        self.changed(fx);
    }

    // ---- 异步事件 ----

    pub fn on_fetch_done(
        &mut self,
        token: u64,
        track_id: &TrackId,
        result: Result<AudioHandle, StoreError>,
        now: Instant,
        fx: &mut Effects,
    ) {
        let outcome = self.cache.complete_fetch(token, track_id, result, now);

        if self.pending.as_ref().is_some_and(|p| p.token == token) {
            let Some(p) = self.pending.take() else {
                return;
            };
            match outcome {
                FetchOutcome::Cached(h) | FetchOutcome::Discarded(h) => {
                    self.start_track(p.track, h, p.cause, p.attempts, now, fx)
                }
                FetchOutcome::Failed(source) => {
                    let error = PlaybackError::SourceUnavailable {
                        track_id: p.track.id.clone(),
                        source,
                    };
                    self.on_play_failed(p.track, error, p.cause, p.attempts, now, fx);
                }
                FetchOutcome::Stale => self.request_play(p.track, p.cause, p.attempts, now, fx),
            }
            return;
        }

        let awaiting = self.orchestrator.session().and_then(|s| s.awaiting_token());
        if awaiting == Some(token) {
            let result = match outcome {
                FetchOutcome::Cached(h) | FetchOutcome::Discarded(h) => Ok(h),
                FetchOutcome::Failed(e) => Err(e),
                FetchOutcome::Stale => return,
            };
            if let Some(o) = self.orchestrator.on_fetched(token, result) {
                self.on_crossfade_outcome(o, now, fx);
            }
        }
    }

    /// 一次通道轮询：推进时钟、处理信号、评估时间触发器
    pub fn tick(&mut self, now: Instant, elapsed: Duration, fx: &mut Effects) {
        if let Some(at) = self.gap_until
            && now >= at
            && self.transport == Transport::Playing
        {
            self.gap_until = None;
            self.advance(now, fx);
        }

        let report = self.orchestrator.tick(now, elapsed);
        if let Some(o) = report.outcome {
            self.on_crossfade_outcome(o, now, fx);
        }
        // 换道完成时这里只剩新曲目的信号
        for signal in report.active {
            match signal {
                ChannelSignal::Ended => self.on_active_ended(now, fx),
                ChannelSignal::Error(msg) => self.on_active_error(msg, now, fx),
                ChannelSignal::Ready => {}
            }
        }

        if self.persist_deferred && self.orchestrator.is_idle() {
            self.persist_deferred = false;
            self.persist(fx);
        }
        self.evaluate_triggers(now, fx);
    }

    // ---- 内部 ----

    fn replace_queue(&mut self, queue: Queue) {
        if queue.id() != self.queue.id() {
            tracing::debug!(len = queue.len(), "替换播放队列");
            self.queue = queue;
            self.resolver.invalidate();
        }
    }

    /// 取消淡入会话、待定点播和间隔等待
    fn abort_transition(&mut self) {
        if let Some(t) = self.orchestrator.cancel() {
            self.cache.unpin(&t.id);
        }
        if let Some(p) = self.pending.take() {
            tracing::debug!(track_id = %p.track.id, token = p.token, "放弃待定点播");
            self.cache.unpin(&p.track.id);
        }
        self.gap_until = None;
    }

    fn resolve_next(&mut self) -> Option<Track> {
        let current = self.current.as_ref().map(|t| t.id.clone());
        self.resolver
            .resolve_next(current.as_ref(), &self.queue, &self.settings, &self.history)
    }

    fn loops_single_track(&self) -> bool {
        self.settings.repeat == RepeatMode::All
            && self.queue.len() == 1
            && self
                .current
                .as_ref()
                .is_some_and(|t| self.queue.contains(&t.id))
    }

    fn request_play(
        &mut self,
        track: Track,
        cause: PlayCause,
        attempts: usize,
        now: Instant,
        fx: &mut Effects,
    ) {
        self.cache.pin(&track.id);
        match self.cache.ensure_cached(&track, now) {
            CacheLookup::Ready(handle) => self.start_track(track, handle, cause, attempts, now, fx),
            CacheLookup::Pending(token) => {
                tracing::debug!(track_id = %track.id, token, "等待在途拉取");
                self.pending = Some(PendingPlay {
                    token,
                    track,
                    cause,
                    attempts,
                });
            }
            CacheLookup::Fetch(req) => {
                let token = req.token;
                fx.fetch(req);
                self.pending = Some(PendingPlay {
                    token,
                    track,
                    cause,
                    attempts,
                });
            }
        }
    }

    fn start_track(
        &mut self,
        track: Track,
        handle: AudioHandle,
        cause: PlayCause,
        attempts: usize,
        now: Instant,
        fx: &mut Effects,
    ) {
        self.cache.unpin(&track.id);
        if let Err(source) = self.orchestrator.load_active(&handle, track.duration_secs) {
            let error = PlaybackError::Channel {
                track_id: track.id.clone(),
                source,
            };
            self.on_play_failed(track, error, cause, attempts, now, fx);
            return;
        }
        self.orchestrator.set_paused_flag(false);
        self.orchestrator.active_mut().play();
        tracing::info!(
            track_id = %track.id,
            title = %track.title,
            slot = %self.orchestrator.pair().active_slot(),
            "开始播放"
        );
        let walked = match cause {
            PlayCause::Back { walked } => Some(walked),
            PlayCause::Manual | PlayCause::Advance => None,
        };
        self.enter_track(track, walked, now, fx);
    }

    /// 新曲目成为当前曲目（直接切换与淡入完成共用）。
    /// 回退进入的曲目已经在历史里，不再记一次
    fn enter_track(&mut self, track: Track, walked: Option<usize>, now: Instant, fx: &mut Effects) {
        self.latches = TriggerLatches::for_track(&track.id);
        match walked {
            Some(w) => self.walked_back = w,
            None => {
                if self.settings.shuffle {
                    // 从回退到的曲目继续往前，先把它补记进历史
                    if self.walked_back > 0
                        && let Some(cur) = &self.current
                    {
                        self.history.push(cur.id.clone());
                    }
                    self.history.push(track.id.clone());
                }
                self.walked_back = 0;
            }
        }
        self.current = Some(track);
        self.transport = Transport::Playing;
        self.gap_until = None;
        self.resolver.invalidate();
        self.reconcile(now, fx);
        self.changed(fx);
        self.evaluate_triggers(now, fx);
    }

    fn reconcile(&mut self, now: Instant, fx: &mut Effects) {
        let Some(current) = self.current.as_ref().map(|t| t.id.clone()) else {
            return;
        };
        let hint = if self.settings.shuffle {
            self.resolve_next()
        } else {
            None
        };
        let reqs = self
            .cache
            .reconcile_window(&current, &self.queue, hint.as_ref(), now);
        fx.fetch_all(reqs);
    }

    fn on_play_failed(
        &mut self,
        track: Track,
        error: PlaybackError,
        cause: PlayCause,
        attempts: usize,
        now: Instant,
        fx: &mut Effects,
    ) {
        self.cache.unpin(&track.id);
        tracing::warn!(track_id = %track.id, err = %error, ?cause, attempts, "曲目无法播放");
        fx.notice(&error);
        match cause {
            PlayCause::Manual | PlayCause::Back { .. } => {
                if self.current.is_none() {
                    self.transport = Transport::Stopped;
                }
            }
            PlayCause::Advance => self.skip_past(&track.id, attempts + 1, now, fx),
        }
    }

    /// 跳过失败的曲目继续往后；整队都试过一遍仍失败就停下
    fn skip_past(&mut self, failed: &TrackId, attempts: usize, now: Instant, fx: &mut Effects) {
        if attempts >= self.queue.len().max(1) {
            tracing::warn!(attempts, "连续失败次数达到队列长度，停止播放");
            self.halt(fx);
            return;
        }
        let next = self
            .resolver
            .resolve_after(Some(failed), &self.queue, &self.settings, &self.history);
        match next {
            Some(track) => {
                tracing::info!(skipped = %failed, next = %track.id, "跳过不可用曲目");
                self.request_play(track, PlayCause::Advance, attempts, now, fx);
            }
            None => self.halt(fx),
        }
    }

    fn on_crossfade_outcome(&mut self, outcome: CrossfadeOutcome, now: Instant, fx: &mut Effects) {
        match outcome {
            CrossfadeOutcome::Completed {
                track,
                position_secs,
            } => {
                self.cache.unpin(&track.id);
                tracing::debug!(track_id = %track.id, position_secs, "淡入完成，切换当前曲目");
                self.enter_track(track, None, now, fx);
            }
            CrossfadeOutcome::Failed { track, error } => {
                self.cache.unpin(&track.id);
                fx.notice(&error);
                if matches!(error, PlaybackError::DecodeOrLoadTimeout { .. }) {
                    // 直接切换，音频到了就硬切
                    self.request_play(track, PlayCause::Advance, 0, now, fx);
                } else {
                    self.skip_past(&track.id, 1, now, fx);
                }
            }
        }
    }

    fn on_active_ended(&mut self, now: Instant, fx: &mut Effects) {
        if self.transport != Transport::Playing || self.current.is_none() {
            return;
        }
        if self.pending.is_some() {
            return;
        }
        if let Some(t) = self.orchestrator.cancel() {
            self.cache.unpin(&t.id);
        }
        tracing::debug!(
            track_id = ?self.current.as_ref().map(|t| t.id.as_str()),
            "当前曲目自然结束"
        );

        if self.settings.repeat == RepeatMode::One {
            self.restart_current(now, fx);
        } else if !self.settings.auto_play_next {
            self.halt(fx);
        } else if self.settings.gapless_enabled {
            self.advance(now, fx);
        } else {
            self.gap_until = Some(now + self.cfg.gap_pause);
        }
    }

    fn on_active_error(&mut self, msg: String, now: Instant, fx: &mut Effects) {
        if let Some(cur) = &self.current {
            let error = PlaybackError::Channel {
                track_id: cur.id.clone(),
                source: ChannelError::Load(msg),
            };
            tracing::warn!(err = %error, "当前通道出错");
            fx.notice(&error);
        }
        self.on_active_ended(now, fx);
    }

    fn advance(&mut self, now: Instant, fx: &mut Effects) {
        match self.resolve_next() {
            Some(track) => self.request_play(track, PlayCause::Advance, 0, now, fx),
            None if self.loops_single_track() => self.restart_current(now, fx),
            None => {
                tracing::info!("队列已播完");
                self.halt(fx);
            }
        }
    }

    fn restart_current(&mut self, now: Instant, fx: &mut Effects) {
        let Some(track) = self.current.clone() else {
            return;
        };
        let active = self.orchestrator.active_mut();
        if active.loaded_track() == Some(&track.id) && active.seek(0.0).is_ok() {
            active.play();
            self.orchestrator.set_paused_flag(false);
            self.latches = TriggerLatches::for_track(&track.id);
            self.transport = Transport::Playing;
            tracing::info!(track_id = %track.id, "从头播放");
            self.changed(fx);
            self.evaluate_triggers(now, fx);
        } else {
            self.request_play(track, PlayCause::Manual, 0, now, fx);
        }
    }

    fn halt(&mut self, fx: &mut Effects) {
        self.orchestrator.active_mut().pause();
        self.transport = Transport::Stopped;
        self.changed(fx);
    }

    fn remaining_secs(&self) -> f64 {
        self.orchestrator.active().remaining(self.settings.tempo)
    }

    fn evaluate_triggers(&mut self, now: Instant, fx: &mut Effects) {
        if self.transport != Transport::Playing || self.pending.is_some() {
            return;
        }
        let Some(current) = &self.current else {
            return;
        };
        if self.orchestrator.active().loaded_track() != Some(&current.id)
            || self.latches.track_id.as_ref() != Some(&current.id)
        {
            return;
        }

        let remaining = self.remaining_secs();
        let cf = self.settings.crossfade_secs;

        if !self.latches.preloaded && remaining <= self.cfg.preload_threshold_secs(cf) {
            self.latches.preloaded = true;
            self.preload_next(now, fx);
        }

        if !self.latches.crossfade
            && self.orchestrator.is_idle()
            && cf > 0.0
            && self.settings.auto_play_next
            && self.settings.repeat != RepeatMode::One
            && remaining <= cf
        {
            self.latches.crossfade = true;
            self.start_crossfade(now, fx);
        }
    }

    fn preload_next(&mut self, now: Instant, fx: &mut Effects) {
        let Some(next) = self.resolve_next() else {
            return;
        };
        if let CacheLookup::Fetch(req) = self.cache.ensure_cached(&next, now) {
            tracing::debug!(track_id = %next.id, token = req.token, "预加载下一首");
            fx.fetch(req);
        }
    }

    fn start_crossfade(&mut self, now: Instant, fx: &mut Effects) {
        let Some(next) = self.resolve_next() else {
            return;
        };
        self.cache.pin(&next.id);
        let source = match self.cache.ensure_cached(&next, now) {
            CacheLookup::Ready(handle) => PrepareSource::Ready(handle),
            CacheLookup::Pending(token) => PrepareSource::Awaiting(token),
            CacheLookup::Fetch(req) => {
                let token = req.token;
                fx.fetch(req);
                PrepareSource::Awaiting(token)
            }
        };
        let (cf, curve) = (self.settings.crossfade_secs, self.settings.fade_curve);
        if let Some(o) = self.orchestrator.begin(next, cf, curve, source, now) {
            self.on_crossfade_outcome(o, now, fx);
        }
    }

    fn on_mode_changed(&mut self, now: Instant, fx: &mut Effects) {
        self.resolver.invalidate();
        self.reconcile(now, fx);
        self.changed(fx);
    }

    /// 对外可见的离散变化：发布状态并持久化
    fn changed(&mut self, fx: &mut Effects) {
        fx.publish(self.state());
        self.persist(fx);
    }

    fn persist(&mut self, fx: &mut Effects) {
        if self.orchestrator.is_idle() {
            fx.persist(PersistSnapshot::capture(&self.state(), &self.settings));
        } else {
            self.persist_deferred = true;
        }
    }
}
