use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::domain::RepeatMode;

#[derive(Debug, Parser)]
#[command(name = "segue", version, about = "带交叉淡入和预加载的命令行播放器")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// 覆盖数据目录（默认走系统 data_local_dir）
    #[arg(long, global = true, env = "SEGUE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// 覆盖日志目录（默认 `{data_dir}/logs`）
    #[arg(long, global = true, env = "SEGUE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// 覆盖日志过滤（等价于设置 RUST_LOG）
    #[arg(long, global = true, env = "RUST_LOG")]
    pub log_filter: Option<String>,

    /// 不打开声卡，用静音通道按实时时钟播放
    #[arg(long, global = true, env = "SEGUE_NO_AUDIO")]
    pub no_audio: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 播放 TOML 播放列表，放完或 Ctrl-C 退出
    Play(PlayArgs),

    /// 打印播放列表、来源与预测的播放顺序
    Inspect {
        manifest: PathBuf,

        /// 预测多少首
        #[arg(long, default_value_t = 10)]
        upcoming: usize,
    },
}

#[derive(Debug, Args)]
pub struct PlayArgs {
    pub manifest: PathBuf,

    /// 从指定 id 开始（默认第一首，或上次停下的曲目）
    #[arg(long)]
    pub start: Option<String>,

    /// 接着上次的位置播放
    #[arg(long)]
    pub resume: bool,

    #[arg(long)]
    pub shuffle: Option<bool>,

    #[arg(long)]
    pub smart_shuffle: Option<bool>,

    #[arg(long, value_enum)]
    pub repeat: Option<RepeatArg>,

    /// 交叉淡入秒数，0 关闭
    #[arg(long)]
    pub crossfade: Option<f64>,

    #[arg(long)]
    pub volume: Option<f32>,

    #[arg(long)]
    pub tempo: Option<f64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RepeatArg {
    Off,
    One,
    All,
}

impl From<RepeatArg> for RepeatMode {
    fn from(value: RepeatArg) -> Self {
        match value {
            RepeatArg::Off => RepeatMode::Off,
            RepeatArg::One => RepeatMode::One,
            RepeatArg::All => RepeatMode::All,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_play_with_overrides() {
        let cli = Cli::try_parse_from([
            "segue",
            "--no-audio",
            "play",
            "list.toml",
            "--repeat",
            "all",
            "--crossfade",
            "2.5",
            "--shuffle",
            "true",
        ])
        .unwrap();
        assert!(cli.no_audio);
        let Command::Play(args) = cli.command else {
            panic!("expected play");
        };
        assert_eq!(args.manifest, PathBuf::from("list.toml"));
        assert_eq!(args.crossfade, Some(2.5));
        assert_eq!(args.shuffle, Some(true));
        assert_eq!(RepeatMode::from(args.repeat.unwrap()), RepeatMode::All);
    }

    #[test]
    fn test_inspect_default_upcoming() {
        let cli = Cli::try_parse_from(["segue", "inspect", "list.toml"]).unwrap();
        assert!(matches!(cli.command, Command::Inspect { upcoming: 10, .. }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["segue"]).is_err());
    }
}
