#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Model input edge length for SSD-style detectors.
pub const SSD_INPUT_SIZE: u32 = 300;

/// Pixel scale applied after mean subtraction (1 / 127.5).
pub const SSD_SCALE: f32 = 0.007843;

/// Per-channel mean subtracted before scaling.
pub const SSD_MEAN: f32 = 127.5;

/// Tract-based backend for SSD-style ONNX detectors (e.g. MobileNet-SSD).
///
/// The model takes a `1x3xSxS` BGR tensor and produces detection rows of the
/// form `[image_id, class_id, confidence, x1, y1, x2, y2]` with normalized box
/// coordinates. Frames of any size are resampled to the model input.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>,
    input_size: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        Self::with_input_size(model_path, SSD_INPUT_SIZE)
    }

    pub fn with_input_size<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, input_size })
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let size = self.input_size as usize;
        let src_w = frame.width as usize;
        let src_h = frame.height as usize;
        let pixels = frame.pixels();
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size, size),
            |(_, channel, y, x)| {
                // Nearest-neighbour resample; channels fed in BGR order.
                let sx = (x * src_w / size).min(src_w - 1);
                let sy = (y * src_h / size).min(src_h - 1);
                let idx = (sy * src_w + sx) * 3 + (2 - channel);
                (pixels[idx] as f32 - SSD_MEAN) * SSD_SCALE
            },
        );
        input.into_tensor()
    }
}

pub(crate) fn parse_ssd_rows(rows: &[f32]) -> Vec<Detection> {
    rows.chunks_exact(7)
        .filter(|row| row[2].is_finite() && row[2] > 0.0)
        .map(|row| Detection {
            class_id: row[1].max(0.0) as u32,
            confidence: row[2],
            bbox: BoundingBox::new(row[3], row[4], row[5], row[6]),
        })
        .collect()
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let rows: Vec<f32> = view.iter().copied().collect();
        if rows.len() % 7 != 0 {
            return Err(anyhow!(
                "unexpected detection output length {} (expected rows of 7)",
                rows.len()
            ));
        }
        Ok(parse_ssd_rows(&rows))
    }
}
