use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{Queue, SourceRef, Track, TrackId};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default, rename = "track")]
    tracks: Vec<ManifestTrack>,
}

#[derive(Debug, Deserialize)]
struct ManifestTrack {
    id: String,
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    album: String,
    duration_secs: f64,
    file: Option<PathBuf>,
    url: Option<String>,
}

/// 读取 TOML 播放列表；相对路径的 `file` 以清单所在目录为基准
pub fn load_manifest(path: &Path) -> Result<Queue, AppError> {
    let text = fs::read_to_string(path)?;
    let base = path.parent().unwrap_or(Path::new("."));
    parse_manifest(&text, base).map_err(|e| match e {
        ParseError::Toml(source) => AppError::Manifest {
            path: path.display().to_string(),
            source,
        },
        ParseError::Invalid(msg) => AppError::Other(format!("{}: {msg}", path.display())),
    })
}

#[derive(Debug)]
pub enum ParseError {
    Toml(toml::de::Error),
    Invalid(String),
}

pub fn parse_manifest(text: &str, base: &Path) -> Result<Queue, ParseError> {
    let file: ManifestFile = toml::from_str(text).map_err(ParseError::Toml)?;
    let mut tracks = Vec::with_capacity(file.tracks.len());
    for t in file.tracks {
        if t.id.trim().is_empty() {
            return Err(ParseError::Invalid(format!("曲目 `{}` 缺少 id", t.title)));
        }
        if !t.duration_secs.is_finite() || t.duration_secs < 0.0 {
            return Err(ParseError::Invalid(format!("曲目 `{}` 时长无效", t.id)));
        }
        let source = match (t.file, t.url) {
            (Some(_), Some(_)) => {
                return Err(ParseError::Invalid(format!(
                    "曲目 `{}` 不能同时指定 file 和 url",
                    t.id
                )));
            }
            (Some(p), None) if p.is_relative() => SourceRef::File { path: base.join(p) },
            (Some(path), None) => SourceRef::File { path },
            (None, Some(url)) => SourceRef::Url { url },
            (None, None) => SourceRef::Stored,
        };
        tracks.push(Track {
            id: TrackId::from(t.id),
            title: t.title,
            artist: t.artist,
            album: t.album,
            duration_secs: t.duration_secs,
            source,
        });
    }
    tracing::debug!(tracks = tracks.len(), "播放列表已解析");
    Ok(Queue::new(tracks))
}
