//! 对外的播放器：后台 actor + 可克隆的命令句柄
//!
//! 真实音频在独立线程的 current-thread runtime 上跑（rodio 输出流不能跨线程），
//! 无音频模式直接挂在调用方的 runtime 上。

mod actor;
mod messages;
mod subscribers;

pub use messages::PlayerCommand;
pub use subscribers::{Subscribers, Subscription};

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use actor::PlayerActor;
use crate::channel::{Channel, NullChannel, RodioOutput};
use crate::controller::{PlaybackController, PlaybackNotice};
use crate::domain::{PlayerState, Queue, RepeatMode, Track};
use crate::error::PlaybackError;
use crate::persist::PersistFn;
use crate::resolver::NextTrackResolver;
use crate::settings::{EngineConfig, PlaybackSettings, SettingsPatch};
use crate::store::{SourceLoader, TrackStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// 系统默认输出设备
    #[default]
    Rodio,
    /// 不出声，按模拟时钟推进
    Null,
}

pub struct PlayerOptions {
    pub config: EngineConfig,
    pub settings: PlaybackSettings,
    pub backend: Backend,
    pub persist: Option<PersistFn>,
    /// 固定随机种子，测试用
    pub seed: Option<u64>,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            settings: PlaybackSettings::default(),
            backend: Backend::default(),
            persist: None,
            seed: None,
        }
    }
}

#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::Sender<PlayerCommand>,
    states: Subscribers<PlayerState>,
    notices: Subscribers<PlaybackNotice>,
}

/// 启动播放器。`Backend::Null` 需要在 tokio runtime 内调用
pub fn spawn_player(store: Arc<dyn TrackStore>, opts: PlayerOptions) -> PlayerHandle {
    let (tx, rx_cmd) = mpsc::channel::<PlayerCommand>(64);
    let states = Subscribers::new();
    let notices = Subscribers::new();
    let handle = PlayerHandle {
        tx,
        states: states.clone(),
        notices: notices.clone(),
    };
    let parts = ActorParts {
        store,
        opts,
        rx_cmd,
        states,
        notices,
    };

    match parts.opts.backend {
        Backend::Null => {
            tokio::spawn(parts.run_with(NullChannel::new(), NullChannel::new()));
        }
        Backend::Rodio => spawn_rodio(parts),
    }
    handle
}

struct ActorParts {
    store: Arc<dyn TrackStore>,
    opts: PlayerOptions,
    rx_cmd: mpsc::Receiver<PlayerCommand>,
    states: Subscribers<PlayerState>,
    notices: Subscribers<PlaybackNotice>,
}

impl ActorParts {
    async fn run_with<C: Channel>(self, primary: C, secondary: C) {
        let PlayerOptions {
            config,
            settings,
            persist,
            seed,
            ..
        } = self.opts;
        let resolver = match seed {
            Some(seed) => NextTrackResolver::with_seed(seed),
            None => NextTrackResolver::new(),
        };
        let loader = SourceLoader::new(self.store, &config);
        let tick_interval = config.tick_interval;
        let ctl = PlaybackController::new(primary, secondary, config, settings, resolver);
        PlayerActor::new(
            ctl,
            loader,
            self.rx_cmd,
            self.states,
            self.notices,
            persist,
            tick_interval,
        )
        .run()
        .await;
    }
}

fn spawn_rodio(parts: ActorParts) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(err = %e, "创建播放线程 runtime 失败");
                return;
            }
        };
        let local = tokio::task::LocalSet::new();
        local.block_on(&rt, async move {
            match RodioOutput::open_default() {
                Ok(output) => {
                    tracing::info!("音频输出已打开");
                    let (primary, secondary) = (output.channel(), output.channel());
                    parts.run_with(primary, secondary).await;
                    drop(output);
                }
                Err(e) => {
                    tracing::error!(err = %e, "初始化音频输出失败，改用静音通道");
                    parts.run_with(NullChannel::new(), NullChannel::new()).await;
                }
            }
        });
    });
}

impl PlayerHandle {
    async fn send(&self, cmd: PlayerCommand) -> Result<(), PlaybackError> {
        self.tx.send(cmd).await.map_err(|_| PlaybackError::Closed)
    }

    async fn ask<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> PlayerCommand,
    ) -> Result<T, PlaybackError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| PlaybackError::Closed)
    }

    /// 播放指定曲目；给出队列时替换当前队列
    pub async fn play(&self, track: Track, queue: Option<Queue>) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Play { track, queue }).await
    }

    pub async fn toggle_play_pause(&self) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::TogglePlayPause).await
    }

    pub async fn play_next(&self) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Next).await
    }

    pub async fn play_previous(&self) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Previous).await
    }

    /// 越界位置会被钳制；没有当前曲目时返回 [`PlaybackError::NoCurrentTrack`]
    pub async fn seek_to(&self, secs: f64) -> Result<(), PlaybackError> {
        self.ask(|reply| PlayerCommand::Seek { secs, reply }).await?
    }

    pub async fn set_volume(&self, volume: f32) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::SetVolume(volume)).await
    }

    pub async fn set_shuffle(&self, shuffle: bool) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::SetShuffle(shuffle)).await
    }

    pub async fn set_repeat(&self, repeat: RepeatMode) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::SetRepeat(repeat)).await
    }

    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::UpdateSettings(patch)).await
    }

    pub async fn stop(&self) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Stop).await
    }

    /// 恢复上次的队列与曲目（停止状态）
    pub async fn restore(&self, queue: Queue, current: Option<Track>) -> Result<(), PlaybackError> {
        self.send(PlayerCommand::Restore { queue, current }).await
    }

    /// 当前状态，位置取自通道
    pub async fn snapshot(&self) -> Result<PlayerState, PlaybackError> {
        self.ask(PlayerCommand::Snapshot).await
    }

    pub async fn settings(&self) -> Result<PlaybackSettings, PlaybackError> {
        self.ask(PlayerCommand::Settings).await
    }

    pub async fn shutdown(&self) -> Result<(), PlaybackError> {
        self.ask(PlayerCommand::Shutdown).await
    }

    /// 离散状态变化（切歌、暂停、seek、模式切换）时回调
    pub fn subscribe(
        &self,
        listener: impl Fn(&PlayerState) + Send + Sync + 'static,
    ) -> Subscription {
        self.states.subscribe(listener)
    }

    /// 单曲失败通知
    pub fn subscribe_notices(
        &self,
        listener: impl Fn(&PlaybackNotice) + Send + Sync + 'static,
    ) -> Subscription {
        self.notices.subscribe(listener)
    }
}
