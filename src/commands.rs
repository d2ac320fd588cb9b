//! 命令行子命令的实现

use directories::ProjectDirs;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cli::{Cli, Command, PlayArgs};
use crate::controller::PlaybackNotice;
use crate::domain::{PlayerState, Queue, Track, TrackId};
use crate::error::{AppError, PersistError};
use crate::library::load_manifest;
use crate::logging::{self, LogConfig};
use crate::persist::{PersistSnapshot, load_snapshot, spawn_debounced_writer};
use crate::player::{Backend, PlayerOptions, spawn_player};
use crate::resolver::{NextTrackResolver, PlayHistory};
use crate::settings::{EngineConfig, PlaybackSettings, SettingsPatch, load_settings, save_settings};
use crate::store::FsTrackStore;

const PERSIST_DEBOUNCE: Duration = Duration::from_millis(400);

pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("dev", "segue", "segue")
        .map(|p| p.data_local_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("segue"))
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    fs::create_dir_all(&data_dir)?;

    let _log_guard = logging::init(
        &data_dir,
        LogConfig {
            dir: cli.log_dir.clone(),
            filter: cli.log_filter.clone(),
            stderr: false,
        },
    );
    tracing::info!(data_dir = %data_dir.display(), no_audio = cli.no_audio, "segue 启动");

    match cli.command {
        Command::Play(args) => play(&data_dir, cli.no_audio, args).await,
        Command::Inspect { manifest, upcoming } => inspect(&data_dir, &manifest, upcoming),
    }
}

fn patch_from_args(args: &PlayArgs) -> SettingsPatch {
    SettingsPatch {
        volume: args.volume,
        crossfade_secs: args.crossfade,
        tempo: args.tempo,
        shuffle: args.shuffle,
        smart_shuffle: args.smart_shuffle,
        repeat: args.repeat.map(Into::into),
        ..SettingsPatch::default()
    }
}

/// 上次退出时的快照；不存在或不兼容都当作没有
fn last_snapshot(data_dir: &Path) -> Option<PersistSnapshot> {
    match load_snapshot(data_dir) {
        Ok(s) => Some(s),
        Err(PersistError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(err = %e, "读取播放快照失败，忽略");
            None
        }
    }
}

/// 起播曲目：显式指定 > 上次停下的曲目 > 第一首
fn pick_start(
    queue: &Queue,
    start: Option<&str>,
    snapshot: Option<&PersistSnapshot>,
) -> Result<Track, AppError> {
    if let Some(id) = start {
        return queue
            .find(&TrackId::from(id))
            .cloned()
            .ok_or_else(|| AppError::Other(format!("播放列表里没有 id 为 `{id}` 的曲目")));
    }
    let last = snapshot
        .and_then(|s| s.player.current_track_id.as_ref())
        .and_then(|id| queue.find(id));
    last.or_else(|| queue.get(0))
        .cloned()
        .ok_or_else(|| AppError::Other("播放列表为空".to_owned()))
}

fn fmt_secs(secs: f64) -> String {
    let s = secs.max(0.0) as u64;
    format!("{:02}:{:02}", s / 60, s % 60)
}

enum Event {
    State(Box<PlayerState>),
    Notice(PlaybackNotice),
}

async fn play(data_dir: &Path, no_audio: bool, args: PlayArgs) -> Result<(), AppError> {
    let queue = load_manifest(&args.manifest)?;
    let snapshot = last_snapshot(data_dir);
    let start = pick_start(&queue, args.start.as_deref(), snapshot.as_ref())?;
    let resume_at = snapshot
        .as_ref()
        .filter(|_| args.resume)
        .filter(|s| s.player.current_track_id.as_ref() == Some(&start.id))
        .map(|s| s.player.position_secs)
        .filter(|p| *p > 0.0);

    let mut settings = load_settings(data_dir);
    let change = settings.apply(&patch_from_args(&args));
    if change.any {
        tracing::info!(?settings, "命令行覆盖设置");
    }

    let store = Arc::new(FsTrackStore::new(data_dir)?);
    let writer = spawn_debounced_writer(data_dir.to_path_buf(), PERSIST_DEBOUNCE);
    let player = spawn_player(
        store,
        PlayerOptions {
            config: EngineConfig::default(),
            settings,
            backend: if no_audio {
                Backend::Null
            } else {
                Backend::Rodio
            },
            persist: Some(writer.sink()),
            seed: None,
        },
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
    let tx_notice = tx.clone();
    let _state_sub = player.subscribe(move |s| {
        let _ = tx.send(Event::State(Box::new(s.clone())));
    });
    let _notice_sub = player.subscribe_notices(move |n| {
        let _ = tx_notice.send(Event::Notice(n.clone()));
    });

    println!("共 {} 首，从「{}」开始", queue.len(), start.display_title());
    player.play(start.clone(), Some(queue)).await?;

    let mut started = false;
    let mut now_playing: Option<TrackId> = None;
    let mut progress = tokio::time::interval(Duration::from_secs(1));
    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                tracing::info!("收到 Ctrl-C");
                break Ok(());
            }
            Some(evt) = rx.recv() => match evt {
                Event::State(s) => {
                    let cur = s.current_track.as_ref();
                    if s.is_playing && cur.map(|t| &t.id) != now_playing.as_ref() {
                        now_playing = cur.map(|t| t.id.clone());
                        if let Some(t) = cur {
                            println!("\n▶ {} [{}]", t.display_title(), fmt_secs(t.duration_secs));
                        }
                        if !started {
                            started = true;
                            if let Some(at) = resume_at
                                && let Err(e) = player.seek_to(at).await
                            {
                                tracing::warn!(err = %e, at, "恢复播放位置失败");
                            }
                        }
                    }
                    if started && !s.is_playing {
                        println!("\n播放结束");
                        break Ok(());
                    }
                }
                Event::Notice(n) => {
                    println!("\n⚠ {}", n.message);
                    if !started && n.track_id == start.id {
                        break Err(AppError::Other(format!(
                            "无法播放「{}」",
                            start.display_title()
                        )));
                    }
                }
            },
            _ = progress.tick() => {
                if started && let Ok(s) = player.snapshot().await {
                    print!("\r  {} / {}", fmt_secs(s.position_secs), fmt_secs(s.duration_secs));
                    let _ = std::io::stdout().flush();
                }
            }
        }
    };

    match player.settings().await {
        Ok(s) => {
            if let Err(e) = save_settings(data_dir, &s) {
                tracing::warn!(err = %e, "保存设置失败");
            }
        }
        Err(e) => tracing::warn!(err = %e, "读取设置失败"),
    }
    if let Err(e) = player.shutdown().await {
        tracing::warn!(err = %e, "播放器关闭失败");
    }
    writer.shutdown().await;
    tracing::info!("segue 退出");
    outcome
}

fn inspect(data_dir: &Path, manifest: &Path, upcoming: usize) -> Result<(), AppError> {
    let queue = load_manifest(manifest)?;
    let settings: PlaybackSettings = load_settings(data_dir);
    let store = FsTrackStore::new(data_dir)?;

    println!("{} 首曲目（{}）", queue.len(), manifest.display());
    for (i, t) in queue.tracks().iter().enumerate() {
        let stored = if store.contains(&t.id) { "已存" } else { "-" };
        println!(
            "{:>3}. {:<12} {:<40} {:>6}  {:<4} {}",
            i + 1,
            t.id,
            t.display_title(),
            fmt_secs(t.duration_secs),
            stored,
            t.source
        );
    }

    let Some(first) = queue.get(0) else {
        return Ok(());
    };
    println!(
        "\n预测播放顺序（shuffle={}, smart={}, repeat={:?}）:",
        settings.shuffle, settings.smart_shuffle, settings.repeat
    );
    let mut resolver = NextTrackResolver::new();
    let mut history = PlayHistory::default();
    let mut current = first.clone();
    println!("  1. {}", current.display_title());
    for n in 2..=upcoming.max(1) {
        history.push(current.id.clone());
        let Some(next) = resolver.resolve_next(Some(&current.id), &queue, &settings, &history)
        else {
            println!("  （队列结束）");
            break;
        };
        println!("{n:>3}. {}", next.display_title());
        current = next;
    }
    Ok(())
}
