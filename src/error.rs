//! Per-tick recording failures.
//!
//! End of stream is not an error (`FrameSource::read` returns `Ok(None)`), and
//! inference failures are absorbed by the run loop as "no detection". What is
//! left are sink failures, which the controller surfaces after restoring a
//! consistent `Idle` state.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// The sink for a new session could not be created. No session is open.
    #[error("failed to open recording {}", .path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Writing to the open sink failed. The session has been torn down.
    #[error("failed to write frame to recording {}", .path.display())]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The sink was closed outside the controller. The session has been torn down.
    #[error("recording {} was closed externally", .path.display())]
    SinkClosed { path: PathBuf },

    /// Finalizing the sink failed. The session is released regardless.
    #[error("failed to finalize recording {}", .path.display())]
    SinkClose {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl RecorderError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::SinkOpen { path, .. }
            | Self::SinkWrite { path, .. }
            | Self::SinkClosed { path }
            | Self::SinkClose { path, .. } => path,
        }
    }
}
