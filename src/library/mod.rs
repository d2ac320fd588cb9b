//! 播放列表清单

mod manifest;

pub use manifest::{ParseError, load_manifest, parse_manifest};
