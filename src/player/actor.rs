use std::time::Duration;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use super::messages::{FetchDone, PlayerCommand};
use super::subscribers::Subscribers;
use crate::cache::FetchRequest;
use crate::channel::Channel;
use crate::controller::{Effect, Effects, PlaybackController, PlaybackNotice};
use crate::domain::PlayerState;
use crate::persist::PersistFn;
use crate::store::SourceLoader;

/// 播放 actor：独占控制器，串行处理命令、拉取结果和轮询
pub(super) struct PlayerActor<C> {
    ctl: PlaybackController<C>,
    loader: SourceLoader,
    rx_cmd: mpsc::Receiver<PlayerCommand>,
    tx_fetch: mpsc::UnboundedSender<FetchDone>,
    rx_fetch: mpsc::UnboundedReceiver<FetchDone>,
    states: Subscribers<PlayerState>,
    notices: Subscribers<PlaybackNotice>,
    persist: Option<PersistFn>,
    tick_interval: Duration,
}

impl<C: Channel> PlayerActor<C> {
    pub(super) fn new(
        ctl: PlaybackController<C>,
        loader: SourceLoader,
        rx_cmd: mpsc::Receiver<PlayerCommand>,
        states: Subscribers<PlayerState>,
        notices: Subscribers<PlaybackNotice>,
        persist: Option<PersistFn>,
        tick_interval: Duration,
    ) -> Self {
        let (tx_fetch, rx_fetch) = mpsc::unbounded_channel();
        Self {
            ctl,
            loader,
            rx_cmd,
            tx_fetch,
            rx_fetch,
            states,
            notices,
            persist,
            tick_interval,
        }
    }

    pub(super) async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();
        tracing::info!(tick_ms = self.tick_interval.as_millis() as u64, "播放 actor 已启动");

        loop {
            select! {
                biased;
                maybe_cmd = self.rx_cmd.recv() => {
                    let Some(cmd) = maybe_cmd else {
                        tracing::info!("所有播放句柄已释放，actor 退出");
                        break;
                    };
                    if let PlayerCommand::Shutdown(ack) = cmd {
                        let mut fx = Effects::default();
                        self.ctl.persist_now(&mut fx);
                        self.apply(fx);
                        let _ = ack.send(());
                        tracing::info!("播放 actor 关闭");
                        break;
                    }
                    self.handle_command(cmd);
                }
                Some(done) = self.rx_fetch.recv() => {
                    let mut fx = Effects::default();
                    self.ctl.on_fetch_done(
                        done.token,
                        &done.track_id,
                        done.result,
                        Instant::now(),
                        &mut fx,
                    );
                    self.apply(fx);
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let elapsed = now.saturating_duration_since(last_tick);
                    last_tick = now;
                    let mut fx = Effects::default();
                    self.ctl.tick(now, elapsed, &mut fx);
                    self.apply(fx);
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: PlayerCommand) {
        let now = Instant::now();
        let mut fx = Effects::default();
        match cmd {
            PlayerCommand::Play { track, queue } => self.ctl.play(track, queue, now, &mut fx),
            PlayerCommand::TogglePlayPause => self.ctl.toggle_play_pause(now, &mut fx),
            PlayerCommand::Next => self.ctl.play_next(now, &mut fx),
            PlayerCommand::Previous => self.ctl.play_previous(now, &mut fx),
            PlayerCommand::Seek { secs, reply } => {
                let result = self.ctl.seek_to(secs, &mut fx);
                if let Err(e) = &result {
                    tracing::debug!(secs, err = %e, "seek 被拒绝");
                }
                let _ = reply.send(result);
            }
            PlayerCommand::SetVolume(v) => self.ctl.set_volume(v, now, &mut fx),
            PlayerCommand::SetShuffle(on) => self.ctl.set_shuffle(on, now, &mut fx),
            PlayerCommand::SetRepeat(mode) => self.ctl.set_repeat(mode, now, &mut fx),
            PlayerCommand::UpdateSettings(patch) => self.ctl.update_settings(&patch, now, &mut fx),
            PlayerCommand::Stop => self.ctl.stop(&mut fx),
            PlayerCommand::Restore { queue, current } => self.ctl.restore(queue, current, &mut fx),
            PlayerCommand::Snapshot(reply) => {
                let _ = reply.send(self.ctl.state());
            }
            PlayerCommand::Settings(reply) => {
                let _ = reply.send(self.ctl.settings().clone());
            }
            PlayerCommand::Shutdown(ack) => {
                let _ = ack.send(());
            }
        }
        self.apply(fx);
    }

    fn apply(&mut self, fx: Effects) {
        for effect in fx {
            match effect {
                Effect::Fetch(req) => self.spawn_fetch(req),
                Effect::Publish(state) => self.states.publish(&state),
                Effect::Persist(snapshot) => {
                    if let Some(persist) = &self.persist {
                        persist(*snapshot);
                    }
                }
                Effect::Notice(notice) => {
                    tracing::warn!(
                        track_id = %notice.track_id,
                        kind = ?notice.kind,
                        message = %notice.message,
                        "播放通知"
                    );
                    self.notices.publish(&notice);
                }
            }
        }
    }

    fn spawn_fetch(&self, req: FetchRequest) {
        let loader = self.loader.clone();
        let tx = self.tx_fetch.clone();
        tracing::debug!(track_id = %req.track.id, token = req.token, "后台拉取");
        tokio::spawn(async move {
            let result = loader.load(&req.track).await;
            let _ = tx.send(FetchDone {
                token: req.token,
                track_id: req.track.id,
                result,
            });
        });
    }
}
