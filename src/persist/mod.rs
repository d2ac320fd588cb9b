//! 播放器快照持久化

mod debounce;
mod store;

pub use debounce::{DebouncedWriter, PersistFn, spawn_debounced_writer};
pub use store::{
    PersistSnapshot, PlayerLite, SNAPSHOT_VERSION, load_snapshot, save_snapshot,
    save_snapshot_async,
};
