use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::store::{PersistSnapshot, save_snapshot_async};

/// 播放核心注入的持久化回调；不能阻塞
pub type PersistFn = Box<dyn Fn(PersistSnapshot) + Send + 'static>;

/// 后台写盘任务：一段时间内的多次提交只写最后一份
pub struct DebouncedWriter {
    tx: mpsc::UnboundedSender<PersistSnapshot>,
    task: JoinHandle<()>,
}

impl DebouncedWriter {
    pub fn submit(&self, snapshot: PersistSnapshot) {
        if self.tx.send(snapshot).is_err() {
            tracing::warn!("持久化任务已退出，丢弃快照");
        }
    }

    pub fn sink(&self) -> PersistFn {
        let tx = self.tx.clone();
        Box::new(move |snapshot| {
            let _ = tx.send(snapshot);
        })
    }

    /// 关闭发送端并等待最后一次写盘。其它 `sink` 克隆也需要先被丢弃
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            tracing::warn!(err = %e, "持久化任务异常退出");
        }
    }
}

pub fn spawn_debounced_writer(data_dir: PathBuf, delay: Duration) -> DebouncedWriter {
    let (tx, mut rx) = mpsc::unbounded_channel::<PersistSnapshot>();
    let task = tokio::spawn(async move {
        while let Some(mut latest) = rx.recv().await {
            let deadline = tokio::time::sleep(delay);
            tokio::pin!(deadline);
            let mut closed = false;
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    next = rx.recv() => match next {
                        Some(s) => latest = s,
                        None => {
                            closed = true;
                            break;
                        }
                    },
                }
            }

            match save_snapshot_async(&data_dir, latest).await {
                Ok(()) => tracing::debug!(dir = %data_dir.display(), "播放状态已保存"),
                Err(e) => tracing::warn!(err = %e, "保存播放状态失败"),
            }
            if closed {
                break;
            }
        }
    });
    DebouncedWriter { tx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PlayerState, Queue, Track};
    use crate::persist::load_snapshot;
    use crate::settings::PlaybackSettings;

    fn snap(pos: f64) -> PersistSnapshot {
        let queue = Queue::new(vec![Track::new("a", "A", 30.0)]);
        let state = PlayerState {
            current_track: queue.get(0).cloned(),
            queue,
            position_secs: pos,
            ..PlayerState::default()
        };
        PersistSnapshot::capture(&state, &PlaybackSettings::default())
    }

    #[tokio::test]
    async fn test_burst_writes_latest() {
        let dir = tempfile::tempdir().unwrap();
        let writer = spawn_debounced_writer(dir.path().to_path_buf(), Duration::from_millis(30));
        for i in 0..10 {
            writer.submit(snap(i as f64));
        }
        writer.shutdown().await;

        let loaded = load_snapshot(dir.path()).unwrap();
        assert_eq!(loaded.player.position_secs, 9.0);
    }
}
