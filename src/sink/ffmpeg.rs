//! FFmpeg-backed MP4 sink.
//!
//! Encodes RGB frames with the MPEG-4 Part 2 ("mp4v") encoder into an `.mp4`
//! container, matching what common desktop players expect from a camera clip.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::util::format::pixel::Pixel;
use std::path::{Path, PathBuf};

use super::{bounded_fps_fraction, SinkFactory, VideoSink};
use crate::frame::Frame;

/// MPEG-4 Part 2 time base terms are 16-bit.
const MPEG4_MAX_TIME_BASE: u32 = 65535;

pub struct FfmpegSinkFactory;

impl FfmpegSinkFactory {
    pub fn new() -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        Ok(Self)
    }
}

impl SinkFactory for FfmpegSinkFactory {
    fn extension(&self) -> &str {
        "mp4"
    }

    fn open(
        &mut self,
        path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn VideoSink>> {
        Ok(Box::new(FfmpegSink::create(path, fps, width, height)?))
    }
}

struct Encoding {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
}

pub struct FfmpegSink {
    path: PathBuf,
    width: u32,
    height: u32,
    encoding: Option<Encoding>,
    frames_written: u64,
}

impl FfmpegSink {
    pub fn create(path: &Path, fps: f64, width: u32, height: u32) -> Result<Self> {
        if path.exists() {
            return Err(anyhow!("refusing to overwrite {}", path.display()));
        }
        let (num, den) = bounded_fps_fraction(fps, MPEG4_MAX_TIME_BASE);
        let frame_rate = ffmpeg::Rational(num as i32, den as i32);
        let time_base = ffmpeg::Rational(den as i32, num as i32);

        let mut output = ffmpeg::format::output(&path)
            .with_context(|| format!("create mp4 output {}", path.display()))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            .ok_or_else(|| anyhow!("ffmpeg build has no MPEG-4 encoder"))?;
        let mut stream = output.add_stream(codec).context("add mp4 video stream")?;

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create MPEG-4 encoder")?;
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(time_base);
        encoder.set_frame_rate(Some(frame_rate));
        if global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = encoder
            .open_as(codec)
            .with_context(|| format!("open MPEG-4 encoder for {}x{}", width, height))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(time_base);
        drop(stream);

        output
            .write_header()
            .with_context(|| format!("write mp4 header to {}", path.display()))?;
        let stream_time_base = output
            .stream(0)
            .map(|stream| stream.time_base())
            .ok_or_else(|| anyhow!("mp4 output lost its video stream"))?;

        let scaler = ffmpeg::software::scaling::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            encoding: Some(Encoding {
                output,
                encoder,
                scaler,
                encoder_time_base: time_base,
                stream_time_base,
            }),
            frames_written: 0,
        })
    }
}

impl Encoding {
    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write mp4 packet")?;
        }
        Ok(())
    }
}

impl VideoSink for FfmpegSink {
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
        let encoding = self
            .encoding
            .as_mut()
            .ok_or_else(|| anyhow!("mp4 clip {} is closed", self.path.display()))?;

        let mut rgb = ffmpeg::frame::Video::new(Pixel::RGB24, self.width, self.height);
        let row_bytes = self.width as usize * 3;
        let stride = rgb.stride(0);
        let dst = rgb.data_mut(0);
        for (row, src) in frame.pixels().chunks_exact(row_bytes).enumerate() {
            let start = row * stride;
            dst.get_mut(start..start + row_bytes)
                .context("ffmpeg frame row is out of bounds")?
                .copy_from_slice(src);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        encoding
            .scaler
            .run(&rgb, &mut yuv)
            .context("scale frame to YUV420P")?;
        yuv.set_pts(Some(self.frames_written as i64));
        encoding
            .encoder
            .send_frame(&yuv)
            .context("send frame to MPEG-4 encoder")?;
        encoding.drain_packets()?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut encoding) = self.encoding.take() else {
            return Ok(());
        };
        encoding.encoder.send_eof().context("flush MPEG-4 encoder")?;
        encoding.drain_packets()?;
        encoding
            .output
            .write_trailer()
            .with_context(|| format!("finalize mp4 {}", self.path.display()))?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.encoding.is_some()
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("mp4 clip {} not finalized on drop: {}", self.path.display(), err);
        }
    }
}
