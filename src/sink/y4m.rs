//! YUV4MPEG2 sink.
//!
//! Writes uncompressed 4:4:4 frames in the y4m container, readable by ffmpeg,
//! mpv and most encoders. No codec dependencies.

use anyhow::{anyhow, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{fps_fraction, SinkFactory, VideoSink};
use crate::frame::Frame;
use crate::pixel::rgb_to_yuv444;

#[derive(Clone, Debug, Default)]
pub struct Y4mSinkFactory;

impl Y4mSinkFactory {
    pub fn new() -> Self {
        Self
    }
}

impl SinkFactory for Y4mSinkFactory {
    fn extension(&self) -> &str {
        "y4m"
    }

    fn open(
        &mut self,
        path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn VideoSink>> {
        Ok(Box::new(Y4mSink::create(path, fps, width, height)?))
    }
}

pub struct Y4mSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl Y4mSink {
    /// Create a new clip. Never overwrites an existing file.
    pub fn create(path: &Path, fps: f64, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("y4m sink needs non-zero dimensions"));
        }
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .with_context(|| format!("create y4m clip {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        let (num, den) = fps_fraction(fps);
        writeln!(
            writer,
            "YUV4MPEG2 W{} H{} F{}:{} Ip A1:1 C444",
            width, height, num, den
        )
        .with_context(|| format!("write y4m header to {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            width,
            height,
            frames_written: 0,
        })
    }
}

impl VideoSink for Y4mSink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(anyhow!(
                "frame {}x{} does not match clip {}x{}",
                frame.width,
                frame.height,
                self.width,
                self.height
            ));
        }
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("y4m clip {} is closed", self.path.display()))?;
        let planes = rgb_to_yuv444(frame.pixels(), frame.width, frame.height)?;
        writer.write_all(b"FRAME\n")?;
        for plane in &planes {
            writer.write_all(plane)?;
        }
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .flush()
            .with_context(|| format!("flush y4m clip {}", self.path.display()))?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Drop for Y4mSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("y4m clip {} not flushed on drop: {}", self.path.display(), err);
        }
    }
}
