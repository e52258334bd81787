//! Recording controller.
//!
//! Turns a noisy per-frame "person present" signal into one start/stop stream
//! for a video sink:
//!
//! 1. Each tick pushes the frame's detection result into a `DetectionWindow`.
//! 2. `active = window.any()`.
//! 3. Rising edge (`active` while `Idle`): name and open a new clip sized to
//!    the frame, write the frame, enter `Recording`.
//! 4. `active` while `Recording`: append the frame.
//! 5. Falling edge (`!active` while `Recording`): close the clip, enter `Idle`.
//!
//! Sink failures never leave a half-open session behind; the controller returns
//! to `Idle` and reports the error. A failed write ends the clip like a falling
//! edge, so the next active tick opens a new one. A failed open waits for the
//! next rising edge (the window going all-false, then positive again) before
//! trying again.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::error::RecorderError;
use crate::frame::Frame;
use crate::naming::ClipNamer;
use crate::sink::{SinkFactory, VideoSink};
use crate::window::DetectionWindow;

/// Externally visible controller state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// What a tick did.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// No session open and the window is quiet.
    Idle,
    /// A session was opened and the tick's frame written as its first frame.
    Started(SessionInfo),
    /// The tick's frame was appended to the open session.
    Continued,
    /// The window went quiet and the session was closed.
    Stopped(SessionSummary),
    /// The window is active but a failed open is waiting for the next rising edge.
    Suppressed,
}

/// Identity of a session, fixed when it opens.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionInfo {
    pub id: String,
    pub path: PathBuf,
    pub started_at: DateTime<Local>,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// A closed session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub info: SessionInfo,
    pub frames: u64,
}

/// An open recording session. Owns the sink exclusively.
struct RecordingSession {
    info: SessionInfo,
    sink: Box<dyn VideoSink>,
}

enum Phase {
    Idle,
    Recording(RecordingSession),
}

/// Running totals for a controller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub ticks: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub frames_recorded: u64,
    pub open_failures: u64,
    pub write_failures: u64,
}

type Clock = Box<dyn FnMut() -> DateTime<Local>>;

pub struct RecordingController<F: SinkFactory> {
    window: DetectionWindow,
    phase: Phase,
    factory: F,
    namer: ClipNamer,
    fps: f64,
    clock: Clock,
    await_falling_edge: bool,
    stats: ControllerStats,
}

impl<F: SinkFactory> RecordingController<F> {
    /// `fps` is the rate clips are written at (the controller's tick rate);
    /// `window_capacity` the number of ticks of detection history kept.
    pub fn new(
        factory: F,
        output_dir: impl Into<PathBuf>,
        fps: f64,
        window_capacity: usize,
    ) -> Self {
        let namer = ClipNamer::new(output_dir, factory.extension());
        Self {
            window: DetectionWindow::new(window_capacity),
            phase: Phase::Idle,
            factory,
            namer,
            fps,
            clock: Box::new(Local::now),
            await_falling_edge: false,
            stats: ControllerStats::default(),
        }
    }

    /// Replace the wall clock used for clip names.
    pub fn with_clock(mut self, clock: impl FnMut() -> DateTime<Local> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> RecorderState {
        match self.phase {
            Phase::Idle => RecorderState::Idle,
            Phase::Recording(_) => RecorderState::Recording,
        }
    }

    /// The open session, if any.
    pub fn session(&self) -> Option<&SessionInfo> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Recording(session) => Some(&session.info),
        }
    }

    pub fn window(&self) -> &DetectionWindow {
        &self.window
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    pub fn output_dir(&self) -> &Path {
        self.namer.dir()
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Evaluate one frame.
    pub fn tick(&mut self, frame: &Frame, detected: bool) -> Result<Transition, RecorderError> {
        self.stats.ticks += 1;
        self.window.push(detected);
        let active = self.window.any();
        if !active {
            self.await_falling_edge = false;
        }

        match (active, self.state()) {
            (true, RecorderState::Idle) if self.await_falling_edge => Ok(Transition::Suppressed),
            (true, RecorderState::Idle) => self.start(frame),
            (true, RecorderState::Recording) => self.append(frame),
            (false, RecorderState::Recording) => Ok(match self.finish()? {
                Some(summary) => Transition::Stopped(summary),
                None => Transition::Idle,
            }),
            (false, RecorderState::Idle) => Ok(Transition::Idle),
        }
    }

    /// Close any open session. Safe to call repeatedly and while idle.
    pub fn shutdown(&mut self) -> Result<Option<SessionSummary>, RecorderError> {
        self.finish()
    }

    fn start(&mut self, frame: &Frame) -> Result<Transition, RecorderError> {
        let started_at = (self.clock)();
        let path = self.namer.next_path(&started_at);
        let id = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("person detected at {}", id);

        let sink = match self
            .factory
            .open(&path, self.fps, frame.width, frame.height)
        {
            Ok(sink) => sink,
            Err(source) => {
                self.stats.open_failures += 1;
                self.await_falling_edge = true;
                log::error!(
                    "failed to open recording {}: {:#}; staying idle until the next detection event",
                    path.display(),
                    source
                );
                return Err(RecorderError::SinkOpen { path, source });
            }
        };

        self.stats.sessions_opened += 1;
        let info = SessionInfo {
            id,
            path,
            started_at,
            fps: self.fps,
            width: frame.width,
            height: frame.height,
        };
        log::info!(
            "recording started: {} ({}x{} @ {:.2} fps)",
            info.path.display(),
            info.width,
            info.height,
            info.fps
        );
        self.phase = Phase::Recording(RecordingSession {
            info: info.clone(),
            sink,
        });

        self.append(frame)?;
        Ok(Transition::Started(info))
    }

    fn append(&mut self, frame: &Frame) -> Result<Transition, RecorderError> {
        let Phase::Recording(session) = &mut self.phase else {
            return Ok(Transition::Idle);
        };

        let failure = if !session.sink.is_open() {
            Some(RecorderError::SinkClosed {
                path: session.info.path.clone(),
            })
        } else {
            match session.sink.write(frame) {
                Ok(()) => None,
                Err(source) => Some(RecorderError::SinkWrite {
                    path: session.info.path.clone(),
                    source,
                }),
            }
        };

        match failure {
            None => {
                self.stats.frames_recorded += 1;
                Ok(Transition::Continued)
            }
            Some(err) => {
                self.stats.write_failures += 1;
                log::error!("{}; ending session", err);
                // A close failure here is logged by `finish`; the write error wins.
                let _ = self.finish();
                Err(err)
            }
        }
    }

    fn finish(&mut self) -> Result<Option<SessionSummary>, RecorderError> {
        let Phase::Recording(mut session) = std::mem::replace(&mut self.phase, Phase::Idle) else {
            return Ok(None);
        };
        self.stats.sessions_closed += 1;
        let summary = SessionSummary {
            frames: session.sink.frames_written(),
            info: session.info,
        };
        match session.sink.close() {
            Ok(()) => {
                log::info!(
                    "recording stopped: {} ({} frames)",
                    session.sink.path().display(),
                    summary.frames
                );
                Ok(Some(summary))
            }
            Err(source) => {
                log::error!(
                    "failed to finalize recording {}: {:#}",
                    summary.info.path.display(),
                    source
                );
                Err(RecorderError::SinkClose {
                    path: summary.info.path,
                    source,
                })
            }
        }
    }
}

impl<F: SinkFactory> Drop for RecordingController<F> {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}
