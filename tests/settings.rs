use segue::crossfade::FadeCurve;
use segue::domain::RepeatMode;
use segue::settings::{PlaybackSettings, SettingsPatch, load_settings, save_settings};
use std::fs;

#[test]
fn settings_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path();

    let s = PlaybackSettings {
        volume: 0.42,
        crossfade_secs: 4.5,
        gapless_enabled: false,
        tempo: 1.25,
        auto_play_next: true,
        shuffle: true,
        repeat: RepeatMode::All,
        smart_shuffle: true,
        fade_curve: FadeCurve::EqualPower,
    };
    save_settings(data_dir, &s).expect("save_settings");

    let loaded = load_settings(data_dir);
    assert_eq!(loaded, s);
    assert!(!data_dir.join("settings.json.tmp").exists());
}

#[test]
fn settings_corrupt_file_falls_back_to_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path();
    fs::write(data_dir.join("settings.json"), b"{not-json").expect("write");

    let loaded = load_settings(data_dir);
    assert_eq!(loaded, PlaybackSettings::default());
}

#[test]
fn settings_missing_fields_use_defaults_and_clamp() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path();
    fs::write(
        data_dir.join("settings.json"),
        br#"{"volume": 7.0, "repeat": "One", "fade_curve": "s_curve"}"#,
    )
    .expect("write");

    let loaded = load_settings(data_dir);
    assert_eq!(loaded.volume, 1.0);
    assert_eq!(loaded.repeat, RepeatMode::One);
    assert_eq!(loaded.fade_curve, FadeCurve::SCurve);
    assert_eq!(loaded.crossfade_secs, PlaybackSettings::default().crossfade_secs);
}

#[test]
fn patch_reports_mode_changes() {
    let mut s = PlaybackSettings::default();

    let change = s.apply(&SettingsPatch {
        volume: Some(0.3),
        ..SettingsPatch::default()
    });
    assert!(change.any && change.volume);
    assert!(!change.next_track_mode);

    let change = s.apply(&SettingsPatch {
        smart_shuffle: Some(true),
        ..SettingsPatch::default()
    });
    assert!(change.next_track_mode);

    let change = s.apply(&SettingsPatch {
        smart_shuffle: Some(true),
        ..SettingsPatch::default()
    });
    assert!(!change.any);
}
