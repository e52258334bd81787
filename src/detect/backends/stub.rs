use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection, PERSON_CLASS_ID};
use crate::frame::Frame;

/// Sampling stride (in pixels, both axes) used when scanning for the marker.
const SCAN_STRIDE: u32 = 4;

/// Minimum share of sampled pixels that must carry the marker colour.
const MIN_MARKER_SHARE: f32 = 0.01;

/// Stub backend for `stub://` sources.
///
/// Synthetic sources paint a pure green block where a "person" stands. This
/// backend reports a person detection covering that block when enough sampled
/// pixels carry the marker colour.
#[derive(Default)]
pub struct StubBackend;

impl StubBackend {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn is_marker(rgb: [u8; 3]) -> bool {
    rgb[0] < 32 && rgb[1] > 224 && rgb[2] < 32
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let mut sampled = 0u32;
        let mut hits = 0u32;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        for y in (0..frame.height).step_by(SCAN_STRIDE as usize) {
            for x in (0..frame.width).step_by(SCAN_STRIDE as usize) {
                sampled += 1;
                let Some(rgb) = frame.pixel(x, y) else {
                    continue;
                };
                if is_marker(rgb) {
                    hits += 1;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if sampled == 0 || (hits as f32 / sampled as f32) < MIN_MARKER_SHARE {
            return Ok(Vec::new());
        }

        let w = frame.width as f32;
        let h = frame.height as f32;
        Ok(vec![Detection {
            class_id: PERSON_CLASS_ID,
            confidence: 0.9,
            bbox: BoundingBox::new(
                min_x as f32 / w,
                min_y as f32 / h,
                (max_x + 1) as f32 / w,
                (max_y + 1) as f32 / h,
            ),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_ignores_plain_frames() {
        let frame = Frame::solid(64, 48, [90, 90, 90], 1).unwrap();
        assert!(StubBackend::new().infer(&frame).unwrap().is_empty());
    }

    #[test]
    fn stub_backend_finds_marker_block() {
        let (width, height) = (64u32, 48u32);
        let mut data = vec![80u8; (width * height * 3) as usize];
        for y in 8..40 {
            for x in 16..32 {
                let idx = ((y * width + x) * 3) as usize;
                data[idx..idx + 3].copy_from_slice(&[0, 255, 0]);
            }
        }
        let frame = Frame::new(data, width, height, 1).unwrap();

        let detections = StubBackend::new().infer(&frame).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, PERSON_CLASS_ID);
        assert_eq!(detections[0].bbox.x1, 16.0 / 64.0);
        assert_eq!(detections[0].bbox.y1, 8.0 / 48.0);
    }
}
