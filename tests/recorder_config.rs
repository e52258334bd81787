use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use presence_recorder::config::{RecorderConfig, SinkKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "RECORDER_CONFIG",
        "RECORDER_OUTPUT_DIR",
        "RECORDER_SOURCE",
        "RECORDER_SOURCE_FPS",
        "RECORDER_MODEL_PATH",
        "RECORDER_PERSON_CLASS",
        "RECORDER_MIN_CONFIDENCE",
        "RECORDER_BUFFER_SECS",
        "RECORDER_SINK",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "output_dir": "/var/lib/presence/clips",
        "source": {
            "url": "/dev/video2",
            "fps": 25,
            "width": 1280,
            "height": 720
        },
        "detection": {
            "model_path": "models/ssd_mobilenet.onnx",
            "min_confidence": 0.6
        },
        "window": {
            "buffer_secs": 4.0,
            "sample_divisor": 1
        },
        "sink": {
            "kind": "y4m"
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("RECORDER_CONFIG", file.path());
    std::env::set_var("RECORDER_SOURCE", "stub://lobby");
    std::env::set_var("RECORDER_BUFFER_SECS", "2.5");

    let cfg = RecorderConfig::load().expect("load config");

    assert_eq!(cfg.output_dir, PathBuf::from("/var/lib/presence/clips"));
    assert_eq!(cfg.source.url, "stub://lobby");
    assert_eq!(cfg.source.fps, 25);
    assert_eq!((cfg.source.width, cfg.source.height), (1280, 720));
    assert_eq!(
        cfg.detection.model_path,
        Some(PathBuf::from("models/ssd_mobilenet.onnx"))
    );
    assert_eq!(cfg.detection.person_class, 15);
    assert_eq!(cfg.detection.min_confidence, 0.6);
    assert_eq!(cfg.window.buffer_secs, 2.5);
    assert_eq!(cfg.window.sample_divisor, 1);
    assert_eq!(cfg.sink, SinkKind::Y4m);
    assert_eq!(cfg.window_capacity(25.0), 63);

    clear_env();
}

#[test]
fn defaults_apply_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = RecorderConfig::load().expect("load defaults");
    assert_eq!(cfg.output_dir, PathBuf::from("detected_videos"));
    assert_eq!(cfg.source.url, "/dev/video0");
    assert_eq!(cfg.source.fps, 30);
    assert!(cfg.detection.model_path.is_none());
    assert_eq!(cfg.window.sample_divisor, 2);
    assert_eq!(cfg.effective_fps(30.0), 15.0);

    clear_env();
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RECORDER_MIN_CONFIDENCE", "high");
    assert!(RecorderConfig::load().is_err());
    clear_env();

    std::env::set_var("RECORDER_BUFFER_SECS", "0");
    assert!(RecorderConfig::load().is_err());
    clear_env();

    std::env::set_var("RECORDER_SINK", "gif");
    assert!(RecorderConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_unreadable_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("missing.json");
    assert!(RecorderConfig::load_from(Some(&missing)).is_err());

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    assert!(RecorderConfig::load_from(Some(file.path())).is_err());

    clear_env();
}
