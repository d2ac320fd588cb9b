//! segue：播放调度与交叉淡入缓存引擎
//!
//! 队列里的曲目按顺序、随机或加权随机接续播放；当前曲目附近的音频预先缓存，
//! 曲目之间用双通道交叉淡入衔接。

pub mod cache;
pub mod channel;
pub mod cli;
pub mod commands;
pub mod controller;
pub mod crossfade;
pub mod domain;
pub mod error;
pub mod library;
pub mod logging;
pub mod persist;
pub mod player;
pub mod resolver;
pub mod settings;
pub mod store;
