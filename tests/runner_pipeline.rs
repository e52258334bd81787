use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use presence_recorder::detect::{ScriptStep, ScriptedBackend, StubBackend};
use presence_recorder::ingest::{SourceStats, SyntheticConfig, SyntheticSource};
use presence_recorder::sink::{MemorySinkFactory, Y4mSinkFactory};
use presence_recorder::{
    Frame, FrameSource, PersonFilter, RecordingController, Runner, RunnerOptions, StopReason,
    StopSignal,
};

const WIDTH: u32 = 32;
const HEIGHT: u32 = 24;

fn synthetic(url: &str) -> Result<SyntheticSource> {
    let mut source = SyntheticSource::new(SyntheticConfig::from_url(url, 10, WIDTH, HEIGHT)?);
    source.connect()?;
    Ok(source)
}

fn clips_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut clips: Vec<PathBuf> = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    clips.sort();
    Ok(clips)
}

/// Number of frames in a y4m clip, derived from its size.
fn y4m_frame_count(path: &Path) -> Result<usize> {
    let bytes = std::fs::read(path)?;
    let header_len = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| anyhow!("missing y4m header"))?
        + 1;
    let header = std::str::from_utf8(&bytes[..header_len])?;
    assert!(header.starts_with(&format!("YUV4MPEG2 W{} H{} F10:1", WIDTH, HEIGHT)));
    let frame_len = b"FRAME\n".len() + (WIDTH * HEIGHT * 3) as usize;
    let body = bytes.len() - header_len;
    assert_eq!(body % frame_len, 0);
    Ok(body / frame_len)
}

#[test]
fn synthetic_scene_produces_one_clip_per_presence_event() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let source = synthetic("stub://hall?frames=12&script=001100000011")?;
    let controller = RecordingController::new(Y4mSinkFactory::new(), dir.path(), 10.0, 2);
    let mut runner = Runner::new(
        source,
        StubBackend::new(),
        PersonFilter::default(),
        controller,
        RunnerOptions::default(),
    );

    let summary = runner.run()?;
    assert_eq!(summary.reason, StopReason::SourceExhausted);
    assert_eq!(summary.frames_read, 12);
    assert_eq!(summary.sessions_opened, 2);
    assert_eq!(summary.sessions_closed, 2);
    // Frames 3-5, then 11-12 closed at end of stream.
    assert_eq!(summary.frames_recorded, 5);
    assert_eq!(summary.sink_errors, 0);

    let clips = clips_in(dir.path())?;
    assert_eq!(clips.len(), 2);
    let mut counts = clips
        .iter()
        .map(|clip| y4m_frame_count(clip))
        .collect::<Result<Vec<_>>>()?;
    counts.sort();
    assert_eq!(counts, vec![2, 3]);
    for clip in &clips {
        assert_eq!(clip.extension().and_then(|e| e.to_str()), Some("y4m"));
    }
    Ok(())
}

#[test]
fn inference_failures_count_as_no_detection() -> Result<()> {
    let sinks = MemorySinkFactory::new();
    let handle = sinks.clone();
    let controller = RecordingController::new(sinks, "clips", 10.0, 1);
    let detector = ScriptedBackend::new([
        ScriptStep::Person(0.9),
        ScriptStep::Fail,
        ScriptStep::Fail,
        ScriptStep::Person(0.9),
    ]);
    let mut runner = Runner::new(
        synthetic("stub://porch?frames=4")?,
        detector,
        PersonFilter::default(),
        controller,
        RunnerOptions::default(),
    );

    let summary = runner.run()?;
    assert_eq!(summary.inference_failures, 2);
    assert_eq!(summary.sessions_opened, 2);
    assert_eq!(handle.written_sequences(), vec![1, 4]);
    Ok(())
}

#[test]
fn low_confidence_people_are_ignored() -> Result<()> {
    let sinks = MemorySinkFactory::new();
    let handle = sinks.clone();
    let controller = RecordingController::new(sinks, "clips", 10.0, 2);
    let detector = ScriptedBackend::new([
        ScriptStep::Person(0.3),
        ScriptStep::Person(0.5),
        ScriptStep::Empty,
    ]);
    let mut runner = Runner::new(
        synthetic("stub://yard?frames=3")?,
        detector,
        PersonFilter::default(),
        controller,
        RunnerOptions::default(),
    );

    let summary = runner.run()?;
    assert_eq!(summary.sessions_opened, 0);
    assert_eq!(handle.open_count(), 0);
    Ok(())
}

#[test]
fn frame_limit_closes_open_clip() -> Result<()> {
    let sinks = MemorySinkFactory::new();
    let handle = sinks.clone();
    let controller = RecordingController::new(sinks, "clips", 10.0, 3);
    let mut runner = Runner::new(
        synthetic("stub://gate?on=5&off=0")?,
        StubBackend::new(),
        PersonFilter::default(),
        controller,
        RunnerOptions {
            max_frames: Some(4),
            ..RunnerOptions::default()
        },
    );

    let summary = runner.run()?;
    assert_eq!(summary.reason, StopReason::FrameLimit);
    assert_eq!(summary.frames_read, 4);
    assert_eq!(handle.written_sequences(), vec![1, 2, 3, 4]);
    assert_eq!(handle.close_count(), 1);
    Ok(())
}

/// Wraps a source and requests a stop after a fixed number of frames.
struct StopAfter<S> {
    inner: S,
    remaining: u64,
    stop: StopSignal,
}

impl<S: FrameSource> FrameSource for StopAfter<S> {
    fn connect(&mut self) -> Result<()> {
        self.inner.connect()
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        let frame = self.inner.read()?;
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.stop.trigger();
        }
        Ok(frame)
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

#[test]
fn stop_request_finishes_current_tick_then_closes() -> Result<()> {
    let sinks = MemorySinkFactory::new();
    let handle = sinks.clone();
    let stop = StopSignal::new();
    let source = StopAfter {
        inner: synthetic("stub://door?on=1&off=0")?,
        remaining: 3,
        stop: stop.clone(),
    };
    let controller = RecordingController::new(sinks, "clips", 10.0, 2);
    let mut runner = Runner::new(
        source,
        StubBackend::new(),
        PersonFilter::default(),
        controller,
        RunnerOptions::default(),
    )
    .with_stop_signal(stop);

    let summary = runner.run()?;
    assert_eq!(summary.reason, StopReason::StopRequested);
    assert_eq!(summary.frames_read, 3);
    assert_eq!(handle.written_sequences(), vec![1, 2, 3]);
    assert_eq!(handle.close_count(), 1);
    Ok(())
}

/// Yields a few frames, then fails.
struct FailingSource {
    served: u64,
    fail_after: u64,
}

impl FrameSource for FailingSource {
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        if self.served >= self.fail_after {
            return Err(anyhow!("device unplugged"));
        }
        self.served += 1;
        Frame::solid(WIDTH, HEIGHT, [0, 255, 0], self.served).map(Some)
    }

    fn native_fps(&self) -> f64 {
        10.0
    }

    fn is_healthy(&self) -> bool {
        self.served < self.fail_after
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.served,
            location: "failing".to_string(),
        }
    }
}

#[test]
fn source_error_closes_clip_before_returning() {
    let sinks = MemorySinkFactory::new();
    let handle = sinks.clone();
    let controller = RecordingController::new(sinks, "clips", 10.0, 2);
    let mut runner = Runner::new(
        FailingSource {
            served: 0,
            fail_after: 2,
        },
        StubBackend::new(),
        PersonFilter::default(),
        controller,
        RunnerOptions::default(),
    );

    let err = runner.run().unwrap_err();
    assert!(format!("{:#}", err).contains("device unplugged"));
    assert_eq!(handle.written_sequences(), vec![1, 2]);
    assert_eq!(handle.close_count(), 1);
}

fn rgb_at(pixels: &[u8], x: u32, y: u32) -> [u8; 3] {
    let idx = ((y * WIDTH + x) * 3) as usize;
    [pixels[idx], pixels[idx + 1], pixels[idx + 2]]
}

#[test]
fn person_detections_are_outlined_in_recorded_frames() -> Result<()> {
    let sinks = MemorySinkFactory::new();
    let handle = sinks.clone();
    let controller = RecordingController::new(sinks, "clips", 10.0, 2);
    // Box (0.25, 0.1)-(0.75, 0.95) on a 32x24 frame: pixels (8, 2)-(24, 22).
    let detector = ScriptedBackend::new([ScriptStep::Person(0.9), ScriptStep::Person(0.3)]);
    let mut runner = Runner::new(
        synthetic("stub://hall?frames=2&script=00")?,
        detector,
        PersonFilter::default(),
        controller,
        RunnerOptions::default(),
    );
    runner.run()?;

    let first = handle.written_pixels(1).ok_or_else(|| anyhow!("frame 1 not recorded"))?;
    assert_eq!(rgb_at(&first, 8, 10), [0, 255, 0]);
    assert_eq!(rgb_at(&first, 9, 10), [0, 255, 0]);
    assert_eq!(rgb_at(&first, 24, 22), [0, 255, 0]);
    assert_eq!(rgb_at(&first, 16, 2), [0, 255, 0]);
    assert_ne!(rgb_at(&first, 16, 12), [0, 255, 0]);
    assert_ne!(rgb_at(&first, 7, 10), [0, 255, 0]);

    // Below-threshold detections are recorded (window still active) but not outlined.
    let second = handle.written_pixels(2).ok_or_else(|| anyhow!("frame 2 not recorded"))?;
    assert!(second.chunks_exact(3).all(|px| px != [0, 255, 0]));
    Ok(())
}

#[test]
fn annotation_can_be_disabled() -> Result<()> {
    let sinks = MemorySinkFactory::new();
    let handle = sinks.clone();
    let controller = RecordingController::new(sinks, "clips", 10.0, 1);
    let mut runner = Runner::new(
        synthetic("stub://hall?frames=1&script=0")?,
        ScriptedBackend::new([ScriptStep::Person(0.9)]),
        PersonFilter::default(),
        controller,
        RunnerOptions {
            annotate: false,
            ..RunnerOptions::default()
        },
    );
    runner.run()?;

    let pixels = handle.written_pixels(1).ok_or_else(|| anyhow!("frame 1 not recorded"))?;
    assert!(pixels.chunks_exact(3).all(|px| px != [0, 255, 0]));
    Ok(())
}
