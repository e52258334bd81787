//! In-memory sink that records every sink operation.
//!
//! Nothing touches the filesystem. Failures can be injected for open, write and
//! external close so recording policy can be exercised without a codec.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{SinkFactory, VideoSink};
use crate::frame::Frame;

/// One observed sink operation.
#[derive(Clone, Debug, PartialEq)]
pub enum SinkEvent {
    Open {
        path: PathBuf,
        fps: f64,
        width: u32,
        height: u32,
    },
    OpenFailed {
        path: PathBuf,
    },
    Write {
        path: PathBuf,
        sequence: u64,
    },
    Close {
        path: PathBuf,
    },
}

#[derive(Default)]
struct MemoryLog {
    events: Vec<SinkEvent>,
    pixels: Vec<(u64, Vec<u8>)>,
    failing_opens: usize,
    write_budget: Option<u64>,
    generation: u64,
}

/// Factory for `MemorySink`s sharing one event log.
///
/// Clones share the log, so a test can keep a handle after moving the factory
/// into a controller.
#[derive(Clone, Default)]
pub struct MemorySinkFactory {
    log: Arc<Mutex<MemoryLog>>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `count` open attempts fail.
    pub fn fail_next_opens(&self, count: usize) {
        self.lock().failing_opens = count;
    }

    /// Allow `count` more successful writes across all sinks; later writes fail.
    pub fn fail_writes_after(&self, count: u64) {
        self.lock().write_budget = Some(count);
    }

    /// Lift any write budget set by `fail_writes_after`.
    pub fn allow_writes(&self) {
        self.lock().write_budget = None;
    }

    /// Close every currently open sink behind the owner's back.
    pub fn close_all_externally(&self) {
        self.lock().generation += 1;
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().events.clone()
    }

    pub fn open_count(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Open { .. }))
    }

    pub fn failed_open_count(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::OpenFailed { .. }))
    }

    pub fn write_count(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Write { .. }))
    }

    pub fn close_count(&self) -> usize {
        self.count(|e| matches!(e, SinkEvent::Close { .. }))
    }

    /// Sequence numbers of written frames, in write order.
    pub fn written_sequences(&self) -> Vec<u64> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Write { sequence, .. } => Some(*sequence),
                _ => None,
            })
            .collect()
    }

    /// RGB24 pixels of the written frame with `sequence`, as the sink received them.
    pub fn written_pixels(&self, sequence: u64) -> Option<Vec<u8>> {
        self.lock()
            .pixels
            .iter()
            .find(|(seq, _)| *seq == sequence)
            .map(|(_, pixels)| pixels.clone())
    }

    fn count(&self, predicate: impl Fn(&SinkEvent) -> bool) -> usize {
        self.lock().events.iter().filter(|e| predicate(e)).count()
    }
}

impl SinkFactory for MemorySinkFactory {
    fn extension(&self) -> &str {
        "mem"
    }

    fn open(
        &mut self,
        path: &Path,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn VideoSink>> {
        let mut log = self.lock();
        if log.failing_opens > 0 {
            log.failing_opens -= 1;
            log.events.push(SinkEvent::OpenFailed {
                path: path.to_path_buf(),
            });
            return Err(anyhow!("injected open failure for {}", path.display()));
        }
        log.events.push(SinkEvent::Open {
            path: path.to_path_buf(),
            fps,
            width,
            height,
        });
        let generation = log.generation;
        drop(log);
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            log: Arc::clone(&self.log),
            dimensions: (width, height),
            generation,
            closed: false,
            frames_written: 0,
        }))
    }
}

pub struct MemorySink {
    path: PathBuf,
    log: Arc<Mutex<MemoryLog>>,
    dimensions: (u32, u32),
    generation: u64,
    closed: bool,
    frames_written: u64,
}

impl MemorySink {
    fn lock(&self) -> MutexGuard<'_, MemoryLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl VideoSink for MemorySink {
    fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        if !self.is_open() {
            return Err(anyhow!("memory sink {} is closed", self.path.display()));
        }
        if frame.dimensions() != self.dimensions {
            return Err(anyhow!(
                "frame {}x{} does not match sink {}x{}",
                frame.width,
                frame.height,
                self.dimensions.0,
                self.dimensions.1
            ));
        }
        let path = self.path.clone();
        let mut log = self.lock();
        if let Some(budget) = log.write_budget.as_mut() {
            if *budget == 0 {
                return Err(anyhow!("injected write failure for {}", path.display()));
            }
            *budget -= 1;
        }
        log.events.push(SinkEvent::Write {
            path,
            sequence: frame.sequence,
        });
        log.pixels.push((frame.sequence, frame.pixels().to_vec()));
        drop(log);
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let path = self.path.clone();
        self.lock().events.push(SinkEvent::Close { path });
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed && self.lock().generation == self.generation
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}
