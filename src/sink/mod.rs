//! Video sinks.
//!
//! A `SinkFactory` opens one `VideoSink` per recording session. Sinks are
//! owned exclusively by the recording controller while open.
//!
//! - `Y4mSinkFactory`: uncompressed YUV4MPEG2 (always available)
//! - `FfmpegSinkFactory`: MPEG-4 Part 2 in `.mp4` (feature: sink-ffmpeg)
//! - `MemorySinkFactory`: in-memory sink that records every operation

#[cfg(feature = "sink-ffmpeg")]
pub mod ffmpeg;
pub mod memory;
pub mod y4m;

use anyhow::Result;
use std::path::Path;

use crate::config::SinkKind;
use crate::frame::Frame;

#[cfg(feature = "sink-ffmpeg")]
pub use self::ffmpeg::FfmpegSinkFactory;
pub use memory::{MemorySinkFactory, SinkEvent};
pub use y4m::Y4mSinkFactory;

/// An open output clip.
pub trait VideoSink {
    /// Output location of this clip.
    fn path(&self) -> &Path;

    /// Append one frame. Frame dimensions must match the ones the sink was opened with.
    fn write(&mut self, frame: &Frame) -> Result<()>;

    /// Finish the clip and release the handle. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// False once the sink has been closed, by us or externally.
    fn is_open(&self) -> bool;

    fn frames_written(&self) -> u64;
}

/// Opens sinks for new recording sessions.
pub trait SinkFactory {
    /// Container file extension, without the dot.
    fn extension(&self) -> &str;

    fn open(&mut self, path: &Path, fps: f64, width: u32, height: u32)
        -> Result<Box<dyn VideoSink>>;
}

impl<F: SinkFactory + ?Sized> SinkFactory for Box<F> {
    fn extension(&self) -> &str {
        (**self).extension()
    }

    fn open(
        &mut self,
        path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn VideoSink>> {
        (**self).open(path, fps, width, height)
    }
}

/// Build the sink factory selected in configuration.
pub fn sink_factory(kind: SinkKind) -> Result<Box<dyn SinkFactory>> {
    match kind {
        SinkKind::Y4m => Ok(Box::new(Y4mSinkFactory::new())),
        #[cfg(feature = "sink-ffmpeg")]
        SinkKind::Ffmpeg => Ok(Box::new(FfmpegSinkFactory::new()?)),
        #[cfg(not(feature = "sink-ffmpeg"))]
        SinkKind::Ffmpeg => Err(anyhow::anyhow!(
            "ffmpeg sink requires the sink-ffmpeg feature"
        )),
    }
}

/// Express a frame rate as a reduced `num/den` fraction (millihertz precision).
pub fn fps_fraction(fps: f64) -> (u32, u32) {
    if !fps.is_finite() || fps <= 0.0 {
        return (1, 1);
    }
    let num = (fps * 1000.0).round().max(1.0) as u64;
    let den = 1000u64;
    let divisor = gcd(num, den);
    ((num / divisor) as u32, (den / divisor) as u32)
}

/// Like [`fps_fraction`], but with both terms at most `max`.
///
/// Falls back to the closest continued-fraction convergent that fits; rates
/// above `max` saturate to `max/1`.
pub fn bounded_fps_fraction(fps: f64, max: u32) -> (u32, u32) {
    let (num, den) = fps_fraction(fps);
    let max = u64::from(max.max(1));
    let (mut n, mut d) = (u64::from(num), u64::from(den));
    if n <= max && d <= max {
        return (num, den);
    }

    let (mut p0, mut q0, mut p1, mut q1) = (0u64, 1u64, 1u64, 0u64);
    while d != 0 {
        let a = n / d;
        let p2 = a * p1 + p0;
        let q2 = a * q1 + q0;
        if p2 > max || q2 > max {
            break;
        }
        (p0, q0, p1, q1) = (p1, q1, p2, q2);
        (n, d) = (d, n % d);
    }
    if q1 == 0 {
        return (max as u32, 1);
    }
    (p1 as u32, q1 as u32)
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
