//! presenced - person-triggered video recorder
//!
//! This daemon:
//! 1. Reads frames from the configured source (camera, video file, or stub://)
//! 2. Runs person detection on every `sample_divisor`-th frame
//! 3. Records a clip while a person was seen within the last `buffer_secs`
//! 4. Closes the open clip and exits on Ctrl-C or end of stream

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use presence_recorder::{
    detect::StubBackend,
    ingest::open_source,
    naming::ensure_output_dir,
    sink::sink_factory,
    DetectorBackend, RecorderConfig, RecordingController, Runner, RunnerOptions, StopSignal,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Record video clips while a person is in view")]
struct Args {
    /// JSON config file.
    #[arg(long, env = "RECORDER_CONFIG")]
    config: Option<PathBuf>,

    /// Source override: camera index, /dev/videoN, video file, or stub://name.
    #[arg(long)]
    source: Option<String>,

    /// Directory clips are written to.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Stop after reading this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = RecorderConfig::load_from(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.source.url = source;
    }
    if let Some(dir) = args.output_dir {
        cfg.output_dir = dir;
    }
    ensure_output_dir(&cfg.output_dir)?;

    let mut source = open_source(&cfg.source)?;
    source
        .connect()
        .with_context(|| format!("failed to open source {}", cfg.source.url))?;
    let native_fps = match source.native_fps() {
        fps if fps.is_finite() && fps > 0.0 => fps,
        _ => {
            log::warn!(
                "source did not report a frame rate; assuming {} fps",
                cfg.source.fps
            );
            cfg.source.fps as f64
        }
    };

    let mut detector = build_detector(&cfg)?;
    detector.warm_up()?;

    let fps = cfg.effective_fps(native_fps);
    let window = cfg.window_capacity(native_fps);
    log::info!(
        "source {} @ {:.2} fps, evaluating every {} frame(s): {:.2} fps, window {} frames ({:.1}s)",
        cfg.source.url,
        native_fps,
        cfg.window.sample_divisor,
        fps,
        window,
        cfg.window.buffer_secs
    );

    let controller = RecordingController::new(sink_factory(cfg.sink)?, &cfg.output_dir, fps, window);
    let options = RunnerOptions {
        sample_divisor: cfg.window.sample_divisor,
        max_frames: args.max_frames,
        ..RunnerOptions::default()
    };

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received, finishing current clip...");
        handler_stop.trigger();
    })
    .context("error setting Ctrl-C handler")?;

    let mut runner = Runner::new(source, detector, cfg.person_filter(), controller, options)
        .with_stop_signal(stop);
    let summary = runner.run()?;
    log::info!(
        "presenced exiting: {} clip(s), {} frame(s) recorded",
        summary.sessions_closed,
        summary.frames_recorded
    );
    Ok(())
}

fn build_detector(cfg: &RecorderConfig) -> Result<Box<dyn DetectorBackend>> {
    match &cfg.detection.model_path {
        #[cfg(feature = "backend-tract")]
        Some(path) => {
            log::info!("loading detector model {}", path.display());
            Ok(Box::new(presence_recorder::detect::TractBackend::new(path)?))
        }
        #[cfg(not(feature = "backend-tract"))]
        Some(path) => anyhow::bail!(
            "model {} requires the backend-tract feature",
            path.display()
        ),
        None => {
            log::warn!("no detection model configured; using the marker-colour stub detector");
            Ok(Box::new(StubBackend::new()))
        }
    }
}
