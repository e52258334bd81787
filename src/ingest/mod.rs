//! Frame ingestion sources.
//!
//! This module provides different sources for frames:
//! - Synthetic scenes (`stub://`, testing and demos)
//! - Local video files (feature: ingest-file-ffmpeg)
//! - USB/V4L2 cameras (feature: ingest-v4l2)
//!
//! All sources produce RGB24 `Frame` instances, one per `read` call, in capture
//! order. `Ok(None)` from `read` means the stream has ended; an `Err` is an
//! unrecoverable source failure. Reconnect policy, if any, belongs to the
//! source, not to the recorder.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

use crate::config::SourceSettings;
use crate::frame::Frame;

pub use file::{FileConfig, FileSource};
pub use synthetic::{SyntheticConfig, SyntheticSource};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Source};

/// A blocking source of frames.
pub trait FrameSource {
    /// Open the underlying device/file/stream.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame, or `None` once the stream is exhausted.
    fn read(&mut self) -> Result<Option<Frame>>;

    /// Frame rate the source reports for itself.
    fn native_fps(&self) -> f64;

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        (**self).read()
    }

    fn native_fps(&self) -> f64 {
        (**self).native_fps()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub location: String,
}

/// Where a configured source URL points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    Camera(String),
    File(String),
}

/// Classify a source URL.
///
/// A bare integer is a camera index and maps to `/dev/video<N>`.
pub fn classify_source(url: &str) -> SourceKind {
    let url = url.trim();
    if url.starts_with("stub://") {
        SourceKind::Synthetic
    } else if !url.is_empty() && url.chars().all(|c| c.is_ascii_digit()) {
        SourceKind::Camera(format!("/dev/video{}", url))
    } else if url.starts_with("/dev/video") {
        SourceKind::Camera(url.to_string())
    } else {
        SourceKind::File(url.to_string())
    }
}

/// Build (but do not connect) the source described by `settings`.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    match classify_source(&settings.url) {
        SourceKind::Synthetic => Ok(Box::new(SyntheticSource::new(SyntheticConfig::from_url(
            &settings.url,
            settings.fps,
            settings.width,
            settings.height,
        )?))),
        SourceKind::Camera(device) => open_camera(device, settings),
        SourceKind::File(path) => Ok(Box::new(FileSource::new(FileConfig {
            path,
            fallback_fps: settings.fps,
        })?)),
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_camera(device: String, settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::new(V4l2Config {
        device,
        target_fps: settings.fps,
        width: settings.width,
        height: settings.height,
    })?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_camera(device: String, _settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!("camera {} requires the ingest-v4l2 feature", device)
}
