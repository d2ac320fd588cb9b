mod engine;
pub mod store;

pub use engine::EngineConfig;
pub use store::{PlaybackSettings, SettingsChange, SettingsPatch, load_settings, save_settings};
