//! 统一错误处理模块
//!
//! 每个领域一个错误类型，均由 thiserror 派生 Display/Error。

mod app;
mod channel;
mod persist;
mod playback;
mod store;

pub use app::AppError;
pub use channel::ChannelError;
pub use persist::PersistError;
pub use playback::PlaybackError;
pub use store::StoreError;
