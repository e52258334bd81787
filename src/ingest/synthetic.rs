//! Synthetic frame source (`stub://`).
//!
//! Generates a moving gradient background and, while a "person" is scripted to
//! be present, paints a pure green block that `StubBackend` recognises. Useful
//! for demos and end-to-end tests without camera hardware.
//!
//! URL query parameters:
//! - `frames=N`: end the stream after N frames (default: endless)
//! - `script=0011100`: per-frame presence, `1`/`T` present; absent once exhausted
//! - `off=A&on=B`: repeating cycle of A absent frames followed by B present frames

use anyhow::{anyhow, Result};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

/// Presence schedule for synthetic scenes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PresencePattern {
    /// Never present.
    Empty,
    /// Explicit per-frame presence.
    Script(Vec<bool>),
    /// `off` absent frames, then `on` present frames, repeating.
    Cycle { off: u64, on: u64 },
}

impl PresencePattern {
    /// Whether a person is present in frame `sequence` (1-based).
    pub fn present_at(&self, sequence: u64) -> bool {
        let index = sequence.saturating_sub(1);
        match self {
            Self::Empty => false,
            Self::Script(flags) => flags.get(index as usize).copied().unwrap_or(false),
            Self::Cycle { off, on } => {
                let period = off + on;
                period > 0 && index % period >= *off
            }
        }
    }
}

/// Configuration for a synthetic source.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub frame_limit: Option<u64>,
    pub presence: PresencePattern,
}

impl SyntheticConfig {
    /// Parse a `stub://name?key=value&...` URL.
    pub fn from_url(url: &str, fps: u32, width: u32, height: u32) -> Result<Self> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic source url must start with stub://"))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut frame_limit = None;
        let mut script = None;
        let mut off = None;
        let mut on = None;
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub query parameter '{}'", pair))?;
            match key {
                "frames" => frame_limit = Some(parse_count(key, value)?),
                "off" => off = Some(parse_count(key, value)?),
                "on" => on = Some(parse_count(key, value)?),
                "script" => script = Some(parse_script(value)?),
                other => return Err(anyhow!("unknown stub query parameter '{}'", other)),
            }
        }

        let presence = match (script, off, on) {
            (Some(flags), None, None) => PresencePattern::Script(flags),
            (Some(_), _, _) => {
                return Err(anyhow!("stub script cannot be combined with on/off"));
            }
            (None, None, None) => {
                let fps = fps.max(1) as u64;
                PresencePattern::Cycle {
                    off: fps * 8,
                    on: fps * 2,
                }
            }
            (None, off, on) => PresencePattern::Cycle {
                off: off.unwrap_or(0),
                on: on.unwrap_or(0),
            },
        };

        Ok(Self {
            name: name.to_string(),
            fps,
            width,
            height,
            frame_limit,
            presence,
        })
    }
}

fn parse_count(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| anyhow!("stub parameter {} must be a non-negative integer", key))
}

fn parse_script(value: &str) -> Result<Vec<bool>> {
    value
        .chars()
        .map(|c| match c {
            '1' | 'T' | 't' => Ok(true),
            '0' | 'F' | 'f' => Ok(false),
            other => Err(anyhow!("invalid stub script character '{}'", other)),
        })
        .collect()
}

/// Synthetic frame source.
pub struct SyntheticSource {
    config: SyntheticConfig,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            connected: false,
        }
    }

    fn generate_pixels(&self, present: bool) -> Vec<u8> {
        let width = self.config.width as usize;
        let height = self.config.height as usize;
        let mut pixels = vec![0u8; width * height * 3];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            // Drifting gray gradient that never hits the marker colour.
            let shade = ((i / 3) as u64 + self.frame_count) % 160;
            *pixel = (48 + shade) as u8;
        }
        if present {
            let (x0, x1) = (width * 3 / 8, width * 5 / 8);
            let (y0, y1) = (height / 4, height * 7 / 8);
            for y in y0..y1 {
                for x in x0..x1 {
                    let idx = (y * width + x) * 3;
                    pixels[idx..idx + 3].copy_from_slice(&[0, 255, 0]);
                }
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("SyntheticSource: connected to stub://{}", self.config.name);
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("synthetic source read before connect"));
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        self.frame_count += 1;
        let present = self.config.presence.present_at(self.frame_count);
        let pixels = self.generate_pixels(present);
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
        .map(Some)
    }

    fn native_fps(&self) -> f64 {
        self.config.fps as f64
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            location: format!("stub://{}", self.config.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{DetectorBackend, PersonFilter, StubBackend};

    fn source(url: &str) -> SyntheticSource {
        SyntheticSource::new(SyntheticConfig::from_url(url, 10, 64, 48).unwrap())
    }

    #[test]
    fn synthetic_source_respects_frame_limit() -> Result<()> {
        let mut source = source("stub://cam?frames=3");
        source.connect()?;
        for expected in 1..=3 {
            let frame = source.read()?.expect("frame");
            assert_eq!(frame.sequence, expected);
            assert_eq!(frame.dimensions(), (64, 48));
        }
        assert!(source.read()?.is_none());
        assert_eq!(source.stats().frames_captured, 3);
        Ok(())
    }

    #[test]
    fn read_before_connect_fails() {
        let mut source = source("stub://cam");
        assert!(source.read().is_err());
    }

    #[test]
    fn scripted_presence_is_visible_to_stub_backend() -> Result<()> {
        let mut source = source("stub://cam?script=0110&frames=4");
        source.connect()?;
        let mut backend = StubBackend::new();
        let filter = PersonFilter::default();
        let mut seen = Vec::new();
        while let Some(frame) = source.read()? {
            seen.push(filter.person_detected(&backend.infer(&frame)?));
        }
        assert_eq!(seen, vec![false, true, true, false]);
        Ok(())
    }

    #[test]
    fn cycle_pattern_starts_absent() {
        let pattern = PresencePattern::Cycle { off: 2, on: 1 };
        let flags: Vec<bool> = (1..=6).map(|n| pattern.present_at(n)).collect();
        assert_eq!(flags, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn malformed_urls_are_rejected() {
        assert!(SyntheticConfig::from_url("stub://cam?frames=x", 10, 8, 8).is_err());
        assert!(SyntheticConfig::from_url("stub://cam?script=01x", 10, 8, 8).is_err());
        assert!(SyntheticConfig::from_url("stub://cam?script=01&on=2", 10, 8, 8).is_err());
        assert!(SyntheticConfig::from_url("stub://cam?color=red", 10, 8, 8).is_err());
        assert!(SyntheticConfig::from_url("rtsp://cam", 10, 8, 8).is_err());
    }
}
