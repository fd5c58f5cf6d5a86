// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use webcam_filters::Config;
use webcam_filters::constants::BitratePreset;
use webcam_filters::pipelines::photo::EncodingFormat;
use webcam_filters::pipelines::video::RecordingFormat;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.source, "0");
    assert_eq!(config.output_dir, None);
    assert_eq!(config.recording_format, RecordingFormat::Mp4);
    assert_eq!(config.photo_format, EncodingFormat::Jpeg);
    assert_eq!(config.jpeg_quality, 92);
    assert_eq!(config.frame_rate.default_fps, 30.0);
    assert_eq!(config.max_consecutive_read_failures, 50);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        source: "test:320x240".to_string(),
        output_dir: Some(dir.path().to_path_buf()),
        recording_format: RecordingFormat::Y4m,
        bitrate_preset: BitratePreset::High,
        photo_format: EncodingFormat::Png,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "source": "/tmp/clip.mp4", "jpeg_quality": 70 }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.source, "/tmp/clip.mp4");
    assert_eq!(config.jpeg_quality, 70);
    assert_eq!(config.recording_format, RecordingFormat::Mp4);
}

#[test]
fn test_garbage_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(matches!(
        Config::load_from(&path),
        Err(webcam_filters::errors::ConfigError::Parse(_))
    ));
}

#[test]
fn test_log_file_is_kept_apart_from_config() {
    if let (Some(log), Some(config)) = (Config::log_path(), Config::default_path()) {
        assert!(log.ends_with("webcam-filters/webcam-filters.log"));
        assert_ne!(log.parent(), config.parent());
    }
}
