use crate::crossfade::FadeCurve;
use crate::domain::RepeatMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_CROSSFADE_SECS: f64 = 10.0;
pub const MIN_TEMPO: f64 = 0.25;
pub const MAX_TEMPO: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub volume: f32,
    pub crossfade_secs: f64,
    pub gapless_enabled: bool,
    pub tempo: f64,
    pub auto_play_next: bool,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub smart_shuffle: bool,
    pub fade_curve: FadeCurve,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            crossfade_secs: 3.0,
            gapless_enabled: true,
            tempo: 1.0,
            auto_play_next: true,
            shuffle: false,
            repeat: RepeatMode::Off,
            smart_shuffle: false,
            fade_curve: FadeCurve::Linear,
        }
    }
}

impl PlaybackSettings {
    /// 越界值静默钳制，非有限值回落到默认
    pub fn sanitized(mut self) -> Self {
        self.volume = clamp_volume(self.volume);
        self.crossfade_secs = clamp_crossfade(self.crossfade_secs);
        self.tempo = clamp_tempo(self.tempo);
        self
    }

    /// 应用部分更新，返回哪些方面发生了变化
    pub fn apply(&mut self, patch: &SettingsPatch) -> SettingsChange {
        let before = self.clone();

        if let Some(v) = patch.volume {
            self.volume = clamp_volume(v);
        }
        if let Some(v) = patch.crossfade_secs {
            self.crossfade_secs = clamp_crossfade(v);
        }
        if let Some(v) = patch.gapless_enabled {
            self.gapless_enabled = v;
        }
        if let Some(v) = patch.tempo {
            self.tempo = clamp_tempo(v);
        }
        if let Some(v) = patch.auto_play_next {
            self.auto_play_next = v;
        }
        if let Some(v) = patch.shuffle {
            self.shuffle = v;
        }
        if let Some(v) = patch.repeat {
            self.repeat = v;
        }
        if let Some(v) = patch.smart_shuffle {
            self.smart_shuffle = v;
        }
        if let Some(v) = patch.fade_curve {
            self.fade_curve = v;
        }

        SettingsChange {
            any: before != *self,
            next_track_mode: before.shuffle != self.shuffle
                || before.repeat != self.repeat
                || before.smart_shuffle != self.smart_shuffle,
            volume: before.volume != self.volume,
            tempo: before.tempo != self.tempo,
        }
    }
}

/// 部分设置更新；`None` 表示保持原值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub volume: Option<f32>,
    pub crossfade_secs: Option<f64>,
    pub gapless_enabled: Option<bool>,
    pub tempo: Option<f64>,
    pub auto_play_next: Option<bool>,
    pub shuffle: Option<bool>,
    pub repeat: Option<RepeatMode>,
    pub smart_shuffle: Option<bool>,
    pub fade_curve: Option<FadeCurve>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsChange {
    pub any: bool,
    /// shuffle / repeat / smart_shuffle 之一变化，下一首预测必须失效
    pub next_track_mode: bool,
    pub volume: bool,
    pub tempo: bool,
}

pub fn clamp_volume(v: f32) -> f32 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 1.0 }
}

pub fn clamp_crossfade(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, MAX_CROSSFADE_SECS)
    } else {
        0.0
    }
}

pub fn clamp_tempo(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(MIN_TEMPO, MAX_TEMPO)
    } else {
        1.0
    }
}

pub fn load_settings(data_dir: &Path) -> PlaybackSettings {
    let p = settings_path(data_dir);
    let Ok(bytes) = fs::read(&p) else {
        return PlaybackSettings::default();
    };
    match serde_json::from_slice::<PlaybackSettings>(&bytes) {
        Ok(s) => s.sanitized(),
        Err(e) => {
            tracing::warn!(path = %p.display(), err = %e, "设置文件损坏，使用默认设置");
            PlaybackSettings::default()
        }
    }
}

pub fn save_settings(data_dir: &Path, s: &PlaybackSettings) -> std::io::Result<()> {
    fs::create_dir_all(data_dir)?;
    let p = settings_path(data_dir);
    let tmp = p.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(s).unwrap_or_else(|_| b"{}".to_vec());
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, &p) {
        let _ = fs::remove_file(&p);
        fs::rename(&tmp, &p).map_err(|_| e)?;
    }
    Ok(())
}

fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_clamps_out_of_range() {
        let s = PlaybackSettings {
            volume: 3.0,
            crossfade_secs: 42.0,
            tempo: 0.01,
            ..PlaybackSettings::default()
        }
        .sanitized();
        assert_eq!(s.volume, 1.0);
        assert_eq!(s.crossfade_secs, MAX_CROSSFADE_SECS);
        assert_eq!(s.tempo, MIN_TEMPO);
    }

    #[test]
    fn test_non_finite_values_fall_back() {
        assert_eq!(clamp_volume(f32::NAN), 1.0);
        assert_eq!(clamp_tempo(f64::INFINITY), 1.0);
        assert_eq!(clamp_crossfade(f64::NAN), 0.0);
    }

    #[test]
    fn test_apply_reports_mode_change() {
        let mut s = PlaybackSettings::default();
        let change = s.apply(&SettingsPatch {
            shuffle: Some(true),
            ..SettingsPatch::default()
        });
        assert!(change.any);
        assert!(change.next_track_mode);
        assert!(!change.volume);

        let change = s.apply(&SettingsPatch {
            volume: Some(0.5),
            tempo: Some(9.0),
            ..SettingsPatch::default()
        });
        assert!(change.volume);
        assert!(change.tempo);
        assert!(!change.next_track_mode);
        assert_eq!(s.tempo, MAX_TEMPO);
    }

    #[test]
    fn test_apply_same_values_is_no_change() {
        let mut s = PlaybackSettings::default();
        let change = s.apply(&SettingsPatch {
            repeat: Some(RepeatMode::Off),
            ..SettingsPatch::default()
        });
        assert_eq!(change, SettingsChange::default());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let s: PlaybackSettings = serde_json::from_str(r#"{"volume":0.3}"#).unwrap();
        assert!((s.volume - 0.3).abs() < f32::EPSILON);
        assert_eq!(s.crossfade_secs, PlaybackSettings::default().crossfade_secs);
    }
}
