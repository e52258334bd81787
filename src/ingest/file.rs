//! Local file frame source.
//!
//! This module provides `FileSource` for replaying local video files through the
//! recorder. Decoding is delegated to FFmpeg (feature: ingest-file-ffmpeg); the
//! stream ends when the file does.

use anyhow::{anyhow, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "clips/hallway.mp4").
    pub path: String,
    /// Frame rate assumed when the container does not report one.
    pub fallback_fps: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            fallback_fps: 30,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    #[cfg(feature = "ingest-file-ffmpeg")]
    inner: FfmpegFileSource,
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                inner: FfmpegFileSource::new(config)?,
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "file ingestion of {} requires the ingest-file-ffmpeg feature",
                config.path
            ))
        }
    }
}

#[cfg(feature = "ingest-file-ffmpeg")]
impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        self.inner.connect()
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        self.inner.next_frame()
    }

    fn native_fps(&self) -> f64 {
        self.inner.native_fps()
    }

    fn is_healthy(&self) -> bool {
        self.inner.is_healthy()
    }

    fn stats(&self) -> SourceStats {
        self.inner.stats()
    }
}

// Without a decoder `FileSource::new` always fails, so these are never reached.
#[cfg(not(feature = "ingest-file-ffmpeg"))]
impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        Err(anyhow!("file ingestion requires the ingest-file-ffmpeg feature"))
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        Err(anyhow!("file ingestion requires the ingest-file-ffmpeg feature"))
    }

    fn native_fps(&self) -> f64 {
        0.0
    }

    fn is_healthy(&self) -> bool {
        false
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: 0,
            location: String::new(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    !path.trim().is_empty() && !path.contains("://")
}
