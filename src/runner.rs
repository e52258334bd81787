//! Blocking run loop.
//!
//! One iteration per source frame:
//! 1. Check the stop signal and frame limit (tick boundaries only)
//! 2. Read a frame; `None` ends the run cleanly
//! 3. Skip frames outside the sampling stride
//! 4. Run the detector and reduce its output to "person present", outlining
//!    each matching detection on the frame
//! 5. Feed the controller
//!
//! Every exit path, including source errors, closes an open recording first.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::controller::{RecordingController, Transition};
use crate::detect::{DetectorBackend, PersonFilter};
use crate::ingest::FrameSource;
use crate::sink::SinkFactory;

/// Outline colour for person detections drawn onto recorded frames.
pub const ANNOTATION_RGB: [u8; 3] = [0, 255, 0];

/// Outline stroke width in pixels.
pub const ANNOTATION_THICKNESS: u32 = 2;

/// Cloneable stop request flag, checked between ticks.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct RunnerOptions {
    /// Evaluate one frame out of every `sample_divisor`.
    pub sample_divisor: u32,
    /// Stop after reading this many frames.
    pub max_frames: Option<u64>,
    pub health_log_interval: Duration,
    /// Outline person detections on frames before they are recorded.
    pub annotate: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            sample_divisor: 1,
            max_frames: None,
            health_log_interval: Duration::from_secs(5),
            annotate: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    SourceExhausted,
    StopRequested,
    FrameLimit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub frames_read: u64,
    pub ticks: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub frames_recorded: u64,
    pub inference_failures: u64,
    pub sink_errors: u64,
}

pub struct Runner<S, D, F>
where
    S: FrameSource,
    D: DetectorBackend,
    F: SinkFactory,
{
    source: S,
    detector: D,
    filter: PersonFilter,
    controller: RecordingController<F>,
    options: RunnerOptions,
    stop: StopSignal,
    frames_read: u64,
    inference_failures: u64,
    sink_errors: u64,
}

impl<S, D, F> Runner<S, D, F>
where
    S: FrameSource,
    D: DetectorBackend,
    F: SinkFactory,
{
    pub fn new(
        source: S,
        detector: D,
        filter: PersonFilter,
        controller: RecordingController<F>,
        options: RunnerOptions,
    ) -> Self {
        Self {
            source,
            detector,
            filter,
            controller,
            options,
            stop: StopSignal::new(),
            frames_read: 0,
            inference_failures: 0,
            sink_errors: 0,
        }
    }

    /// Handle that stops the loop at the next tick boundary.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn controller(&self) -> &RecordingController<F> {
        &self.controller
    }

    /// Run until the source ends, a stop is requested, or the frame limit is hit.
    ///
    /// Source errors end the run with an `Err` after the open recording (if any)
    /// has been closed.
    pub fn run(&mut self) -> Result<RunSummary> {
        let divisor = u64::from(self.options.sample_divisor.max(1));
        let mut last_health_log = Instant::now();

        log::info!(
            "recorder running: detector={} window={} ticks @ {:.2} fps, output={}",
            self.detector.name(),
            self.controller.window().capacity(),
            self.controller.fps(),
            self.controller.output_dir().display()
        );

        let reason = loop {
            if self.stop.is_triggered() {
                break StopReason::StopRequested;
            }
            if let Some(limit) = self.options.max_frames {
                if self.frames_read >= limit {
                    break StopReason::FrameLimit;
                }
            }

            let mut frame = match self.source.read() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::SourceExhausted,
                Err(err) => {
                    log::error!("frame source failed: {:#}", err);
                    self.shutdown_controller();
                    return Err(err.context("frame source failed"));
                }
            };
            self.frames_read += 1;

            if (self.frames_read - 1) % divisor != 0 {
                continue;
            }

            let detected = match self.detector.infer(&frame) {
                Ok(detections) => {
                    let mut detected = false;
                    for detection in self.filter.matching(&detections) {
                        detected = true;
                        if self.options.annotate {
                            let (x1, y1, x2, y2) =
                                detection.bbox.to_pixels(frame.width, frame.height);
                            frame.draw_rect(x1, y1, x2, y2, ANNOTATION_RGB, ANNOTATION_THICKNESS);
                        }
                    }
                    detected
                }
                Err(err) => {
                    self.inference_failures += 1;
                    log::warn!(
                        "inference failed on frame {} (treated as no detection): {:#}",
                        frame.sequence,
                        err
                    );
                    false
                }
            };

            match self.controller.tick(&frame, detected) {
                Ok(Transition::Stopped(summary)) => {
                    log::debug!(
                        "session {} closed after {} frames",
                        summary.info.id,
                        summary.frames
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    // Already reported by the controller.
                    self.sink_errors += 1;
                    log::debug!("tick on frame {} failed: {}", frame.sequence, err);
                }
            }

            if last_health_log.elapsed() >= self.options.health_log_interval {
                let stats = self.source.stats();
                log::info!(
                    "source health={} frames={} location={}",
                    self.source.is_healthy(),
                    stats.frames_captured,
                    stats.location
                );
                log::debug!(
                    "controller state={:?} window={}/{} stats={:?}",
                    self.controller.state(),
                    self.controller.window().len(),
                    self.controller.window().capacity(),
                    self.controller.stats()
                );
                last_health_log = Instant::now();
            }
        };

        self.shutdown_controller();
        let summary = self.summary(reason);
        log::info!("recorder stopped ({:?}): {:?}", reason, summary);
        Ok(summary)
    }

    fn shutdown_controller(&mut self) {
        if let Err(err) = self.controller.shutdown() {
            self.sink_errors += 1;
            log::debug!("shutdown failed: {}", err);
        }
    }

    fn summary(&self, reason: StopReason) -> RunSummary {
        let stats = self.controller.stats();
        RunSummary {
            reason,
            frames_read: self.frames_read,
            ticks: stats.ticks,
            sessions_opened: stats.sessions_opened,
            sessions_closed: stats.sessions_closed,
            frames_recorded: stats.frames_recorded,
            inference_failures: self.inference_failures,
            sink_errors: self.sink_errors,
        }
    }
}
