use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::{PersonFilter, DEFAULT_MIN_CONFIDENCE, PERSON_CLASS_ID};
use crate::window::window_capacity;

const DEFAULT_OUTPUT_DIR: &str = "detected_videos";
const DEFAULT_SOURCE_URL: &str = "/dev/video0";
const DEFAULT_SOURCE_FPS: u32 = 30;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_BUFFER_SECS: f64 = 5.0;
const DEFAULT_SAMPLE_DIVISOR: u32 = 2;

#[derive(Debug, Deserialize, Default)]
struct RecorderConfigFile {
    output_dir: Option<PathBuf>,
    source: Option<SourceConfigFile>,
    detection: Option<DetectionConfigFile>,
    window: Option<WindowConfigFile>,
    sink: Option<SinkConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    model_path: Option<PathBuf>,
    person_class: Option<u32>,
    min_confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct WindowConfigFile {
    buffer_secs: Option<f64>,
    sample_divisor: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SinkConfigFile {
    kind: Option<SinkKind>,
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub output_dir: PathBuf,
    pub source: SourceSettings,
    pub detection: DetectionSettings,
    pub window: WindowSettings,
    pub sink: SinkKind,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// `stub://...`, a local video file, a V4L2 device node, or a camera index.
    pub url: String,
    /// Frame rate assumed when the source cannot report its own.
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    /// ONNX model; without one the stub detector is used.
    pub model_path: Option<PathBuf>,
    pub person_class: u32,
    pub min_confidence: f32,
}

#[derive(Debug, Clone)]
pub struct WindowSettings {
    pub buffer_secs: f64,
    /// Only every `sample_divisor`-th source frame is evaluated and recorded.
    pub sample_divisor: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    Y4m,
    Ffmpeg,
}

impl SinkKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "y4m" => Ok(Self::Y4m),
            "ffmpeg" | "mp4" => Ok(Self::Ffmpeg),
            other => Err(anyhow!("unknown sink kind '{}' (expected y4m or ffmpeg)", other)),
        }
    }
}

impl Default for SinkKind {
    fn default() -> Self {
        if cfg!(feature = "sink-ffmpeg") {
            Self::Ffmpeg
        } else {
            Self::Y4m
        }
    }
}

impl RecorderConfig {
    /// Load from the file named by `RECORDER_CONFIG` (if any), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("RECORDER_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit config file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RecorderConfigFile) -> Self {
        let output_dir = file
            .output_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let source = file.source.unwrap_or_default();
        let detection = file.detection.unwrap_or_default();
        let window = file.window.unwrap_or_default();
        Self {
            output_dir,
            source: SourceSettings {
                url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
                fps: source.fps.unwrap_or(DEFAULT_SOURCE_FPS),
                width: source.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
                height: source.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            },
            detection: DetectionSettings {
                model_path: detection.model_path,
                person_class: detection.person_class.unwrap_or(PERSON_CLASS_ID),
                min_confidence: detection.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            },
            window: WindowSettings {
                buffer_secs: window.buffer_secs.unwrap_or(DEFAULT_BUFFER_SECS),
                sample_divisor: window.sample_divisor.unwrap_or(DEFAULT_SAMPLE_DIVISOR),
            },
            sink: file.sink.and_then(|sink| sink.kind).unwrap_or_default(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("RECORDER_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(url) = std::env::var("RECORDER_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(fps) = std::env::var("RECORDER_SOURCE_FPS") {
            self.source.fps = fps
                .trim()
                .parse()
                .map_err(|_| anyhow!("RECORDER_SOURCE_FPS must be a positive integer"))?;
        }
        if let Ok(path) = std::env::var("RECORDER_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detection.model_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(class) = std::env::var("RECORDER_PERSON_CLASS") {
            self.detection.person_class = class
                .trim()
                .parse()
                .map_err(|_| anyhow!("RECORDER_PERSON_CLASS must be an integer class id"))?;
        }
        if let Ok(confidence) = std::env::var("RECORDER_MIN_CONFIDENCE") {
            self.detection.min_confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("RECORDER_MIN_CONFIDENCE must be a number"))?;
        }
        if let Ok(secs) = std::env::var("RECORDER_BUFFER_SECS") {
            self.window.buffer_secs = secs
                .trim()
                .parse()
                .map_err(|_| anyhow!("RECORDER_BUFFER_SECS must be a number of seconds"))?;
        }
        if let Ok(kind) = std::env::var("RECORDER_SINK") {
            if !kind.trim().is_empty() {
                self.sink = SinkKind::parse(&kind)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("output_dir must not be empty"));
        }
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.source.fps == 0 {
            return Err(anyhow!("source fps must be >= 1"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be non-zero"));
        }
        if self.window.sample_divisor == 0 {
            return Err(anyhow!("sample_divisor must be >= 1"));
        }
        if !self.window.buffer_secs.is_finite() || self.window.buffer_secs <= 0.0 {
            return Err(anyhow!("buffer_secs must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(anyhow!("min_confidence must be within 0..=1"));
        }
        Ok(())
    }

    pub fn person_filter(&self) -> PersonFilter {
        PersonFilter::new(self.detection.person_class, self.detection.min_confidence)
    }

    /// Rate at which frames are evaluated and recorded for a source running at `native_fps`.
    pub fn effective_fps(&self, native_fps: f64) -> f64 {
        native_fps / self.window.sample_divisor as f64
    }

    /// Detection window length for a source running at `native_fps`.
    pub fn window_capacity(&self, native_fps: f64) -> usize {
        window_capacity(self.effective_fps(native_fps), self.window.buffer_secs)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self::from_file(RecorderConfigFile::default())
    }
}

fn read_config_file(path: &Path) -> Result<RecorderConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
