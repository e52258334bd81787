//! Captured frames.
//!
//! - `Frame`: owned RGB24 pixel buffer with its dimensions and capture order.
//!
//! Frames are produced by the ingestion layer, inspected by detector backends,
//! and handed to the active video sink. Pixel bytes are exposed read-only.

use anyhow::{anyhow, Result};

/// Bytes per pixel for the RGB24 layout every source produces.
pub const RGB_BYTES_PER_PIXEL: usize = 3;

/// A single captured RGB24 frame.
///
/// Not `Clone`: a frame flows source -> detector -> sink
/// once per tick and is dropped afterwards.
pub struct Frame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Position of this frame in its source's capture order (1-based).
    pub sequence: u64,
}

impl Frame {
    /// Wrap a tightly packed RGB24 buffer.
    ///
    /// Fails when the buffer length does not match `width * height * 3`.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame {}x{} expects {} RGB bytes, received {}",
                width,
                height,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// A frame filled with a single RGB colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], sequence: u64) -> Result<Self> {
        let len = expected_len(width, height)?;
        let mut data = Vec::with_capacity(len);
        for _ in 0..len / RGB_BYTES_PER_PIXEL {
            data.extend_from_slice(&rgb);
        }
        Self::new(data, width, height, sequence)
    }

    /// Read-only pixel access, row-major RGB24 without padding.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// RGB triple at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * RGB_BYTES_PER_PIXEL;
        let px = self.data.get(idx..idx + RGB_BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2]])
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Outline the rectangle with corners `(x1, y1)` and `(x2, y2)` (inclusive).
    ///
    /// The stroke lies inside the rectangle. Coordinates outside the frame are
    /// clamped; a rectangle entirely outside the frame draws nothing.
    pub fn draw_rect(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, rgb: [u8; 3], thickness: u32) {
        let max_x = self.width as i32 - 1;
        let max_y = self.height as i32 - 1;
        let (x1, x2) = (x1.min(x2), x1.max(x2));
        let (y1, y2) = (y1.min(y2), y1.max(y2));
        if x2 < 0 || y2 < 0 || x1 > max_x || y1 > max_y {
            return;
        }
        let (x1, x2) = (x1.max(0), x2.min(max_x));
        let (y1, y2) = (y1.max(0), y2.min(max_y));
        let t = thickness.max(1) as i32;

        for y in y1..=y2 {
            if y - y1 < t || y2 - y < t {
                self.fill_row(y, x1, x2, rgb);
            } else {
                self.fill_row(y, x1, (x1 + t - 1).min(x2), rgb);
                self.fill_row(y, (x2 - t + 1).max(x1), x2, rgb);
            }
        }
    }

    /// Paint pixels `x1..=x2` of row `y`; callers pass in-bounds coordinates.
    fn fill_row(&mut self, y: i32, x1: i32, x2: i32, rgb: [u8; 3]) {
        let row = y as usize * self.width as usize;
        let start = (row + x1 as usize) * RGB_BYTES_PER_PIXEL;
        let end = (row + x2 as usize + 1) * RGB_BYTES_PER_PIXEL;
        if let Some(span) = self.data.get_mut(start..end) {
            for px in span.chunks_exact_mut(RGB_BYTES_PER_PIXEL) {
                px.copy_from_slice(&rgb);
            }
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

fn expected_len(width: u32, height: u32) -> Result<usize> {
    if width == 0 || height == 0 {
        return Err(anyhow!("frame dimensions must be non-zero"));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(RGB_BYTES_PER_PIXEL))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
