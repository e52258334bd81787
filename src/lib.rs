//! Presence Recorder
//!
//! Watches a video stream, runs a person detector on sampled frames, and writes
//! a video clip for as long as a person has been seen within the last few
//! seconds.
//!
//! # Architecture
//!
//! ```text
//! FrameSource -> DetectorBackend -> PersonFilter -> RecordingController -> VideoSink
//!                                                  (DetectionWindow)
//! ```
//!
//! The controller is a two-state machine (`Idle`, `Recording`) driven by
//! `DetectionWindow::any()`. A clip opens on the rising edge of that signal and
//! closes on the falling edge, so short gaps in detection never split a clip.
//!
//! # Module Structure
//!
//! - `frame`: RGB24 frames
//! - `window`: sliding detection window
//! - `detect`: detector backends and the person filter
//! - `ingest`: frame sources (synthetic, local files, V4L2 cameras)
//! - `sink`: clip writers (Y4M, ffmpeg, in-memory)
//! - `naming`: timestamped clip names
//! - `controller`: the recording state machine
//! - `runner`: the blocking source-to-sink loop
//! - `config`: file + environment configuration

pub mod config;
pub mod controller;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod naming;
pub mod pixel;
pub mod runner;
pub mod sink;
pub mod window;

pub use config::{RecorderConfig, SinkKind};
pub use controller::{
    ControllerStats, RecorderState, RecordingController, SessionInfo, SessionSummary, Transition,
};
pub use detect::{Detection, DetectorBackend, PersonFilter};
pub use error::RecorderError;
pub use frame::Frame;
pub use ingest::FrameSource;
pub use runner::{RunSummary, Runner, RunnerOptions, StopReason, StopSignal};
pub use sink::{SinkFactory, VideoSink};
pub use window::DetectionWindow;
